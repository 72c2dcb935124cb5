//! Network, VLAN, and fabric operations

use super::machines::as_list;
use crate::cloudapi::{CloudApi, CloudError, FetchOptions};
use serde_json::{json, Value};

pub async fn network(
    client: &CloudApi,
    id: &str,
    vlan: Option<i64>,
) -> Result<Value, CloudError> {
    let path = match vlan {
        Some(vlan) => format!("/fabrics/default/vlans/{vlan}/networks/{id}"),
        None => format!("/networks/{id}"),
    };

    client.fetch(&path, &FetchOptions::get()).await
}

pub async fn networks(
    client: &CloudApi,
    id: Option<&str>,
    vlan: Option<i64>,
) -> Result<Vec<Value>, CloudError> {
    if let Some(id) = id {
        let network = network(client, id, vlan).await?;
        return Ok(vec![network]);
    }

    let path = match vlan {
        Some(vlan) => format!("/fabrics/default/vlans/{vlan}/networks"),
        None => "/networks".to_string(),
    };

    let list = client.fetch(&path, &FetchOptions::get()).await?;
    Ok(as_list(list))
}

pub async fn create_network(
    client: &CloudApi,
    vlan: i64,
    payload: Value,
) -> Result<Value, CloudError> {
    client
        .fetch(
            &format!("/fabrics/default/vlans/{vlan}/networks"),
            &FetchOptions::post(payload),
        )
        .await
}

pub async fn delete_network(
    client: &CloudApi,
    vlan: i64,
    id: &str,
) -> Result<Value, CloudError> {
    let snapshot = network(client, id, Some(vlan)).await?;
    client
        .fetch(
            &format!("/fabrics/default/vlans/{vlan}/networks/{id}"),
            &FetchOptions::delete(),
        )
        .await?;

    Ok(snapshot)
}

// =========================================================================
// Fabric VLANs
// =========================================================================

pub async fn vlan(client: &CloudApi, id: i64) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/fabrics/default/vlans/{id}"), &FetchOptions::get())
        .await
}

pub async fn vlans(client: &CloudApi, id: Option<i64>) -> Result<Vec<Value>, CloudError> {
    if let Some(id) = id {
        let vlan = vlan(client, id).await?;
        return Ok(vec![vlan]);
    }

    let list = client
        .fetch("/fabrics/default/vlans", &FetchOptions::get())
        .await?;

    Ok(as_list(list))
}

pub async fn create_vlan(
    client: &CloudApi,
    id: i64,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<Value, CloudError> {
    let payload = json!({
        "vlan_id": id,
        "name": name,
        "description": description,
    });

    client
        .fetch("/fabrics/default/vlans", &FetchOptions::post(payload))
        .await
}

pub async fn update_vlan(
    client: &CloudApi,
    id: i64,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<Value, CloudError> {
    let payload = json!({
        "name": name,
        "description": description,
    });

    client
        .fetch(
            &format!("/fabrics/default/vlans/{id}"),
            &FetchOptions::put(payload),
        )
        .await
}

pub async fn delete_vlan(client: &CloudApi, id: i64) -> Result<Value, CloudError> {
    let snapshot = vlan(client, id).await?;
    client
        .fetch(&format!("/fabrics/default/vlans/{id}"), &FetchOptions::delete())
        .await?;

    Ok(snapshot)
}

/// Machines attached to a fabric network, derived by filtering the machine
/// listing on network membership.
pub async fn network_machines(client: &CloudApi, id: &str) -> Result<Vec<Value>, CloudError> {
    let machines = client.fetch("/machines", &FetchOptions::get()).await?;

    Ok(as_list(machines)
        .into_iter()
        .filter(|machine| {
            machine
                .get("networks")
                .and_then(Value::as_array)
                .map(|networks| networks.iter().any(|n| n.as_str() == Some(id)))
                .unwrap_or(false)
        })
        .collect())
}
