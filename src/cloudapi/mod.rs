//! Control-plane API client
//!
//! This module provides the authenticated REST client every resolver talks
//! through: request signing, dispatch, response caching, and error
//! classification.
//!
//! # Module Structure
//!
//! - [`auth`] - RSA request signing over the HTTP `Date` header
//! - [`client`] - The client itself: fetch, cache, pagination probe
//! - [`error`] - Closed taxonomy of control-plane error codes
//!
//! # Example
//!
//! ```ignore
//! use cloudapi_gql::cloudapi::{CloudApi, FetchOptions};
//!
//! async fn example(client: &CloudApi) -> Result<(), cloudapi_gql::cloudapi::CloudError> {
//!     let machines = client.fetch("/machines", &FetchOptions::get()).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;

pub use client::{CloudApi, FetchOptions, RawPage};
pub use error::{CloudError, ErrorCode};
