//! Schema construction
//!
//! The schema is built once at startup. The per-request client (carrying
//! the delegated session token) is attached as request data by the host,
//! so resolvers read it from context instead of module globals.

use super::binding::{self, BindingError};
use super::{Mutation, Query};
use async_graphql::{EmptySubscription, Schema};

pub type CloudApiSchema = Schema<Query, Mutation, EmptySubscription>;

/// Build the schema and validate the resolver registry against its SDL.
/// Registry mismatches fail here, at startup, never at request time.
pub fn build_schema() -> Result<CloudApiSchema, BindingError> {
    let schema = Schema::build(Query, Mutation, EmptySubscription).finish();
    binding::validate(&schema.sdl())?;

    Ok(schema)
}
