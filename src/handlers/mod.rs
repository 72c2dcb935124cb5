//! REST composition layer
//!
//! One module per resource family, mirroring the control plane's path
//! structure. Handlers compose [`CloudApi`](crate::cloudapi::CloudApi)
//! calls into the shapes the GraphQL layer exposes: singular/plural
//! dispatch, two-phase mutations (mutate, then re-fetch the entity so the
//! caller observes post-mutation state), and fetch-then-delete for
//! delete-type operations (nothing remains to re-fetch afterward).
//!
//! GraphQL field resolvers delegate here, so a nested field on a parent
//! entity reuses the same path construction as the top-level query.

pub mod account;
pub mod firewall;
pub mod images;
pub mod machines;
pub mod misc;
pub mod networks;
pub mod packages;
