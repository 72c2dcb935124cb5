//! GraphQL facade over the Triton CloudAPI control plane
//!
//! The crate exposes compute, network, and identity resources (machines,
//! images, packages, networks, firewall rules, users, roles, policies) as
//! a GraphQL schema resolved against the remote control plane. Nothing is
//! persisted locally: every resolver is a best-effort composition of
//! independent, signed REST calls.
//!
//! # Module Structure
//!
//! - [`config`] - Process configuration (endpoint, signing identity)
//! - [`cloudapi`] - Authenticated REST client: signing, caching, error
//!   classification, pagination probe
//! - [`codec`] - Map/list transform with content-derived ids
//! - [`fwrule`] - Firewall rule grammar parser and tag matcher
//! - [`fanout`] - Bounded-concurrency ordered parallel map
//! - [`handlers`] - REST composition per resource family
//! - [`graphql`] - Schema, resolvers, and the startup binding check

pub mod cloudapi;
pub mod codec;
pub mod config;
pub mod fanout;
pub mod fwrule;
pub mod graphql;
pub mod handlers;
