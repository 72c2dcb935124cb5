//! Image operations

use super::machines::as_list;
use crate::cloudapi::{CloudApi, CloudError, FetchOptions};
use serde_json::Value;

/// Arguments accepted by the image listing.
#[derive(Debug, Clone, Default)]
pub struct ListImages {
    pub name: Option<String>,
    pub os: Option<String>,
    pub state: Option<String>,
    pub type_: Option<String>,
}

/// Fetch one image. For lx-brand machines the image may no longer be
/// resolvable; those callers pass `lx_fallback` and get `None` instead of
/// an error.
pub async fn image(
    client: &CloudApi,
    id: &str,
    lx_fallback: bool,
) -> Result<Option<Value>, CloudError> {
    let mut options = FetchOptions::get();
    if lx_fallback {
        options = options.with_fallback(Value::Null);
    }

    let image = client.fetch(&format!("/images/{id}"), &options).await?;

    Ok(match image {
        Value::Null => None,
        image => Some(image),
    })
}

pub async fn images(client: &CloudApi, args: ListImages) -> Result<Vec<Value>, CloudError> {
    let mut options = FetchOptions::get();

    if let Some(name) = &args.name {
        options = options.with_query("name", name.clone());
    }
    if let Some(os) = &args.os {
        options = options.with_query("os", os.to_lowercase());
    }
    if let Some(type_) = &args.type_ {
        options = options.with_query("type", type_.to_lowercase());
    }
    // the control plane hides inactive images unless asked
    let state = args.state.as_deref().unwrap_or("active");
    options = options.with_query("state", state.to_lowercase());

    let images = client.fetch("/images", &options).await?;
    Ok(as_list(images))
}

pub async fn create_image_from_machine(
    client: &CloudApi,
    payload: Value,
) -> Result<Value, CloudError> {
    let created = client.fetch("/images", &FetchOptions::post(payload)).await?;

    let id = created
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);

    match id {
        Some(id) => Ok(image(client, &id, false).await?.unwrap_or(created)),
        None => Ok(created),
    }
}

pub async fn update_image(
    client: &CloudApi,
    id: &str,
    payload: Value,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/images/{id}"),
            &FetchOptions::post(payload).with_query("action", "update"),
        )
        .await?;

    Ok(image(client, id, false).await?.unwrap_or(Value::Null))
}

pub async fn delete_image(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    let snapshot = image(client, id, false).await?.unwrap_or(Value::Null);
    client
        .fetch(&format!("/images/{id}"), &FetchOptions::delete())
        .await?;

    Ok(snapshot)
}

pub async fn export_image(
    client: &CloudApi,
    id: &str,
    manta_path: &str,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/images/{id}"),
            &FetchOptions::post_empty()
                .with_query("action", "export")
                .with_query("manta_path", manta_path),
        )
        .await
}
