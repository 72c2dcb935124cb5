//! Machine operations: listing with over-fetch avoidance, state actions,
//! snapshots, metadata, tags, nics, and the audit trail.

use crate::cloudapi::{CloudApi, CloudError, FetchOptions, RawPage};
use crate::codec::{self, NameValuePair};
use crate::fanout;
use serde_json::{json, Map, Value};

/// Arguments for the machine listing.
#[derive(Debug, Clone, Default)]
pub struct ListMachines {
    pub brand: Option<String>,
    pub state: Option<String>,
    pub name: Option<String>,
    /// Tag filters, folded into `tag.<name>` query parameters.
    pub tags: Vec<(String, Value)>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Issue a per-machine re-fetch for fields the cheap list
    /// representation lacks (dns_names). Driven by query lookahead.
    pub fetch_dns: bool,
}

pub async fn machine(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/machines/{id}"), &FetchOptions::get())
        .await
}

/// List machines as a page. The total comes from the listing endpoint's
/// HEAD probe; when `fetch_dns` is set every listed machine is re-fetched
/// individually, preserving list order.
pub async fn machines(client: &CloudApi, args: ListMachines) -> Result<RawPage, CloudError> {
    let mut options = FetchOptions::get();

    if let Some(brand) = &args.brand {
        options = options.with_query("brand", brand.to_lowercase());
    }
    if let Some(state) = &args.state {
        options = options.with_query("state", state.to_lowercase());
    }
    if let Some(name) = &args.name {
        options = options.with_query("name", name.clone());
    }

    let tag_filters = codec::from_name_values(args.tags.clone(), "tag.");
    options = options.with_query_pairs(
        tag_filters
            .into_iter()
            .map(|(name, value)| (name, query_value(&value))),
    );

    let mut page = client
        .fetch_page("/machines", &options, args.offset, args.limit)
        .await?;

    if args.fetch_dns {
        let ids: Vec<String> = page
            .results
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let machines = fanout::try_map_ordered(ids, client.concurrency(), |id| {
            let client = client.clone();
            async move { machine(&client, &id).await }
        })
        .await?;

        page.results = Value::Array(machines);
    }

    Ok(page)
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// POST a machine action (`?action=stop` and friends), then re-fetch so
/// the caller observes the transitional state.
async fn machine_action(
    client: &CloudApi,
    id: &str,
    action: &str,
    extra: &[(&str, &str)],
) -> Result<Value, CloudError> {
    let mut options = FetchOptions::post_empty().with_query("action", action);
    for (name, value) in extra {
        options = options.with_query(name, *value);
    }

    client.fetch(&format!("/machines/{id}"), &options).await?;
    machine(client, id).await
}

pub async fn stop_machine(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    machine_action(client, id, "stop", &[]).await
}

pub async fn start_machine(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    machine_action(client, id, "start", &[]).await
}

pub async fn reboot_machine(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    machine_action(client, id, "reboot", &[]).await
}

pub async fn resize_machine(
    client: &CloudApi,
    id: &str,
    package: &str,
) -> Result<Value, CloudError> {
    machine_action(client, id, "resize", &[("package", package)]).await
}

pub async fn enable_machine_firewall(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    machine_action(client, id, "enable_firewall", &[]).await
}

pub async fn disable_machine_firewall(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    machine_action(client, id, "disable_firewall", &[]).await
}

/// Create a machine and re-fetch it by the id the control plane assigned.
pub async fn create_machine(
    client: &CloudApi,
    payload: Value,
) -> Result<Value, CloudError> {
    let created = client
        .fetch("/machines", &FetchOptions::post(payload))
        .await?;

    match created.get("id").and_then(Value::as_str) {
        Some(id) => machine(client, id).await,
        // no usable representation came back; nothing further to re-fetch
        None => Ok(created),
    }
}

/// Fetch-then-delete: the pre-deletion snapshot is the only representation
/// left to return.
pub async fn delete_machine(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    let snapshot = machine(client, id).await?;
    client
        .fetch(&format!("/machines/{id}"), &FetchOptions::delete())
        .await?;

    Ok(snapshot)
}

// =========================================================================
// Snapshots
// =========================================================================

pub async fn snapshot(client: &CloudApi, machine: &str, name: &str) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/machines/{machine}/snapshots/{}", urlencoding::encode(name)),
            &FetchOptions::get(),
        )
        .await
}

pub async fn snapshots(
    client: &CloudApi,
    machine: &str,
    name: Option<&str>,
) -> Result<Vec<Value>, CloudError> {
    if let Some(name) = name {
        let snapshot = snapshot(client, machine, name).await?;
        return Ok(vec![snapshot]);
    }

    let list = client
        .fetch(&format!("/machines/{machine}/snapshots"), &FetchOptions::get())
        .await?;

    Ok(as_list(list))
}

pub async fn create_machine_snapshot(
    client: &CloudApi,
    machine: &str,
    name: &str,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/machines/{machine}/snapshots"),
            &FetchOptions::post(json!({ "name": name })),
        )
        .await?;

    snapshot(client, machine, name).await
}

pub async fn start_machine_from_snapshot(
    client: &CloudApi,
    id: &str,
    name: &str,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/machines/{id}/snapshots/{}", urlencoding::encode(name)),
            &FetchOptions::post_empty(),
        )
        .await?;

    machine(client, id).await
}

pub async fn delete_machine_snapshot(
    client: &CloudApi,
    id: &str,
    name: &str,
) -> Result<Value, CloudError> {
    let snapshot = snapshot(client, id, name).await?;
    client
        .fetch(
            &format!("/machines/{id}/snapshots/{}", urlencoding::encode(name)),
            &FetchOptions::delete(),
        )
        .await?;

    Ok(snapshot)
}

// =========================================================================
// Metadata
// =========================================================================

pub async fn metadata_value(
    client: &CloudApi,
    machine: &str,
    name: &str,
) -> Result<NameValuePair, CloudError> {
    // best-effort lookup: a missing key folds to an empty value
    let value = client
        .fetch(
            &format!("/machines/{machine}/metadata/{}", urlencoding::encode(name)),
            &FetchOptions::get().with_fallback(json!([])),
        )
        .await?;

    Ok(codec::to_name_value(name, value))
}

pub async fn metadata(
    client: &CloudApi,
    machine: &str,
    name: Option<&str>,
) -> Result<Vec<NameValuePair>, CloudError> {
    if let Some(name) = name {
        let pair = metadata_value(client, machine, name).await?;
        return Ok(vec![pair]);
    }

    let metadata = client
        .fetch(&format!("/machines/{machine}/metadata"), &FetchOptions::get())
        .await?;

    Ok(codec::to_name_values(metadata.as_object()))
}

pub async fn update_machine_metadata(
    client: &CloudApi,
    id: &str,
    metadata: Vec<(String, Value)>,
) -> Result<Value, CloudError> {
    let payload = Value::Object(codec::from_name_values(metadata, ""));

    client
        .fetch(&format!("/machines/{id}/metadata"), &FetchOptions::post(payload))
        .await?;

    machine(client, id).await
}

pub async fn delete_machine_metadata(
    client: &CloudApi,
    id: &str,
    name: &str,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/machines/{id}/metadata/{}", urlencoding::encode(name)),
            &FetchOptions::delete(),
        )
        .await?;

    machine(client, id).await
}

// =========================================================================
// Tags
// =========================================================================

pub async fn tag(client: &CloudApi, machine: &str, name: &str) -> Result<NameValuePair, CloudError> {
    let value = client
        .fetch(
            &format!("/machines/{machine}/tags/{}", urlencoding::encode(name)),
            &FetchOptions::get(),
        )
        .await?;

    Ok(codec::to_name_value(name, value))
}

pub async fn tags(
    client: &CloudApi,
    machine: &str,
    name: Option<&str>,
) -> Result<Vec<NameValuePair>, CloudError> {
    if let Some(name) = name {
        let pair = tag(client, machine, name).await?;
        return Ok(vec![pair]);
    }

    let tags = client
        .fetch(&format!("/machines/{machine}/tags"), &FetchOptions::get())
        .await?;

    Ok(codec::to_name_values(tags.as_object()))
}

pub async fn add_machine_tags(
    client: &CloudApi,
    id: &str,
    tags: Vec<(String, Value)>,
) -> Result<Value, CloudError> {
    let payload = Value::Object(codec::from_name_values(tags, ""));

    client
        .fetch(&format!("/machines/{id}/tags"), &FetchOptions::post(payload))
        .await?;

    machine(client, id).await
}

pub async fn replace_machine_tags(
    client: &CloudApi,
    id: &str,
    tags: Vec<(String, Value)>,
) -> Result<Value, CloudError> {
    let payload = Value::Object(codec::from_name_values(tags, ""));

    client
        .fetch(&format!("/machines/{id}/tags"), &FetchOptions::put(payload))
        .await?;

    machine(client, id).await
}

pub async fn delete_machine_tag(
    client: &CloudApi,
    id: &str,
    name: &str,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/machines/{id}/tags/{}", urlencoding::encode(name)),
            &FetchOptions::delete(),
        )
        .await?;

    machine(client, id).await
}

pub async fn delete_machine_tags(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/machines/{id}/tags"), &FetchOptions::delete())
        .await?;

    machine(client, id).await
}

// =========================================================================
// Audit trail and nics
// =========================================================================

pub async fn actions(client: &CloudApi, machine: &str) -> Result<Vec<Value>, CloudError> {
    let audit = client
        .fetch(&format!("/machines/{machine}/audit"), &FetchOptions::get())
        .await?;

    Ok(as_list(audit))
}

pub async fn nic(client: &CloudApi, machine: &str, mac: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/machines/{machine}/nics/{mac}"), &FetchOptions::get())
        .await
}

pub async fn nics(
    client: &CloudApi,
    machine: &str,
    mac: Option<&str>,
) -> Result<Vec<Value>, CloudError> {
    if let Some(mac) = mac {
        let nic = nic(client, machine, mac).await?;
        return Ok(vec![nic]);
    }

    let list = client
        .fetch(&format!("/machines/{machine}/nics"), &FetchOptions::get())
        .await?;

    Ok(as_list(list))
}

pub async fn add_nic(client: &CloudApi, machine: &str, network: &str) -> Result<Value, CloudError> {
    let added = client
        .fetch(
            &format!("/machines/{machine}/nics"),
            &FetchOptions::post(json!({ "network": network })),
        )
        .await?;

    match added.get("mac").and_then(Value::as_str) {
        Some(mac) => nic(client, machine, mac).await,
        None => Ok(added),
    }
}

pub async fn remove_nic(client: &CloudApi, machine: &str, mac: &str) -> Result<Value, CloudError> {
    let snapshot = nic(client, machine, mac).await?;
    client
        .fetch(&format!("/machines/{machine}/nics/{mac}"), &FetchOptions::delete())
        .await?;

    Ok(snapshot)
}

/// Flatten a listing response to a vec, treating anything unexpected as
/// empty.
pub(crate) fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(list) => list,
        _ => Vec::new(),
    }
}

/// Fold a machine's tag inputs into the map shape the matcher and the
/// create payload expect.
pub fn tag_map(tags: Vec<(String, Value)>) -> Map<String, Value> {
    codec::from_name_values(tags, "")
}
