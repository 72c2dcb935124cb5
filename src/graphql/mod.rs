//! GraphQL layer
//!
//! Thin wiring from schema fields to the handlers layer. Resolvers do not
//! compose REST calls themselves; they translate arguments, delegate, and
//! decode the result into the typed objects in [`types`].
//!
//! # Module Structure
//!
//! - [`types`] - Object, input, and enum types
//! - [`query`] - Query root
//! - [`mutation`] - Mutation root
//! - [`schema`] - Schema construction
//! - [`binding`] - Startup validation of the resolver registry against the
//!   generated SDL
//!
//! Errors surface per-field: a failed resolver produces an `errors` entry
//! (with the domain code attached for classified failures) while sibling
//! fields still resolve.

pub mod binding;
pub mod mutation;
pub mod query;
pub mod schema;
pub mod types;

pub use mutation::Mutation;
pub use query::Query;
pub use schema::{build_schema, CloudApiSchema};

use crate::cloudapi::CloudError;
use async_graphql::ErrorExtensions;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Map a client failure onto a GraphQL error, attaching the domain code as
/// an extension when the failure was classified.
pub(crate) fn to_graphql_error(err: CloudError) -> async_graphql::Error {
    match err.code() {
        Some(code) => (&err).extend_with(|_, extensions| extensions.set("code", code.as_str())),
        None => async_graphql::Error::new(err.to_string()),
    }
}

/// Shorthand for resolvers delegating to the client or handlers.
pub(crate) trait GqlResult<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> GqlResult<T> for Result<T, CloudError> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(to_graphql_error)
    }
}

/// Decode a control-plane payload into a typed object.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> async_graphql::Result<T> {
    serde_json::from_value(value)
        .map_err(|err| async_graphql::Error::new(format!("unexpected control-plane payload: {err}")))
}

pub(crate) fn decode_list<T: DeserializeOwned>(values: Vec<Value>) -> async_graphql::Result<Vec<T>> {
    values.into_iter().map(decode).collect()
}

/// Decode into a nullable field value. I/O-backed fields are nullable so a
/// failed resolver nulls only itself (see the module docs on error
/// surface).
pub(crate) fn decode_some<T: DeserializeOwned>(value: Value) -> async_graphql::Result<Option<T>> {
    Ok(Some(decode(value)?))
}
