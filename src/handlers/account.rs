//! Account, user, key, role, and policy operations

use super::machines::as_list;
use crate::cloudapi::{CloudApi, CloudError, FetchOptions};
use serde_json::{json, Value};

pub async fn account(client: &CloudApi) -> Result<Value, CloudError> {
    client.fetch("", &FetchOptions::get()).await
}

pub async fn update_account(client: &CloudApi, payload: Value) -> Result<Value, CloudError> {
    client.fetch("", &FetchOptions::post(payload)).await?;
    account(client).await
}

// =========================================================================
// SSH keys
// =========================================================================

pub async fn key(client: &CloudApi, user: Option<&str>, name: &str) -> Result<Value, CloudError> {
    client
        .fetch(&key_path(user, Some(name)), &FetchOptions::get())
        .await
}

pub async fn keys(
    client: &CloudApi,
    user: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<Value>, CloudError> {
    if let Some(name) = name {
        let key = key(client, user, name).await?;
        return Ok(vec![key]);
    }

    let list = client
        .fetch(&key_path(user, None), &FetchOptions::get())
        .await?;

    Ok(as_list(list))
}

pub async fn create_key(
    client: &CloudApi,
    user: Option<&str>,
    name: &str,
    key_material: &str,
) -> Result<Value, CloudError> {
    let payload = json!({ "name": name, "key": key_material });

    client
        .fetch(&key_path(user, None), &FetchOptions::post(payload))
        .await?;

    key(client, user, name).await
}

pub async fn delete_key(
    client: &CloudApi,
    user: Option<&str>,
    name: &str,
) -> Result<Value, CloudError> {
    let snapshot = key(client, user, name).await?;
    client
        .fetch(&key_path(user, Some(name)), &FetchOptions::delete())
        .await?;

    Ok(snapshot)
}

/// Keys live under the account or under a sub-user.
fn key_path(user: Option<&str>, name: Option<&str>) -> String {
    let base = match user {
        Some(user) => format!("/users/{user}/keys"),
        None => "/keys".to_string(),
    };

    match name {
        Some(name) => format!("{base}/{}", urlencoding::encode(name)),
        None => base,
    }
}

// =========================================================================
// Sub-users, roles, policies
// =========================================================================

pub async fn user(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/users/{id}"), &FetchOptions::get())
        .await
}

pub async fn users(client: &CloudApi, id: Option<&str>) -> Result<Vec<Value>, CloudError> {
    if let Some(id) = id {
        let user = user(client, id).await?;
        return Ok(vec![user]);
    }

    let list = client.fetch("/users", &FetchOptions::get()).await?;
    Ok(as_list(list))
}

pub async fn role(
    client: &CloudApi,
    id: Option<&str>,
    name: Option<&str>,
) -> Result<Value, CloudError> {
    let reference = id.or(name).unwrap_or_default();

    client
        .fetch(&format!("/roles/{reference}"), &FetchOptions::get())
        .await
}

pub async fn roles(
    client: &CloudApi,
    id: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<Value>, CloudError> {
    if id.is_some() || name.is_some() {
        let role = role(client, id, name).await?;
        return Ok(vec![role]);
    }

    let list = client.fetch("/roles", &FetchOptions::get()).await?;
    Ok(as_list(list))
}

pub async fn policy(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/policies/{id}"), &FetchOptions::get())
        .await
}

pub async fn policies(client: &CloudApi, id: Option<&str>) -> Result<Vec<Value>, CloudError> {
    if let Some(id) = id {
        let policy = policy(client, id).await?;
        return Ok(vec![policy]);
    }

    let list = client.fetch("/policies", &FetchOptions::get()).await?;
    Ok(as_list(list))
}
