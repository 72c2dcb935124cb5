//! Package (instance size) operations

use super::machines::as_list;
use crate::cloudapi::{CloudApi, CloudError, FetchOptions};
use serde_json::{json, Value};

/// Arguments accepted by the package listing.
#[derive(Debug, Clone, Default)]
pub struct ListPackages {
    pub name: Option<String>,
    pub version: Option<String>,
    pub memory: Option<u64>,
}

/// Fetch one package by id or name. Machine child lookups opt into an
/// empty-object fallback: a machine may reference a package that has since
/// been retired.
pub async fn package(
    client: &CloudApi,
    reference: &str,
    best_effort: bool,
) -> Result<Value, CloudError> {
    let mut options = FetchOptions::get();
    if best_effort {
        options = options.with_fallback(json!({}));
    }

    client
        .fetch(&format!("/packages/{reference}"), &options)
        .await
}

pub async fn packages(client: &CloudApi, args: ListPackages) -> Result<Vec<Value>, CloudError> {
    let mut options = FetchOptions::get();

    if let Some(name) = &args.name {
        options = options.with_query("name", name.clone());
    }
    if let Some(version) = &args.version {
        options = options.with_query("version", version.clone());
    }
    if let Some(memory) = args.memory {
        options = options.with_query("memory", memory.to_string());
    }

    let packages = client.fetch("/packages", &options).await?;
    Ok(as_list(packages))
}
