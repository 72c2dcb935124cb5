//! Firewall rule operations, including the machine-creation preview that
//! evaluates the rule grammar locally.

use super::machines::as_list;
use crate::cloudapi::{CloudApi, CloudError, FetchOptions};
use crate::fwrule;
use serde_json::{json, Map, Value};

pub async fn firewall_rule(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/fwrules/{id}"), &FetchOptions::get())
        .await
}

pub async fn firewall_rules(
    client: &CloudApi,
    machine: Option<&str>,
    id: Option<&str>,
) -> Result<Vec<Value>, CloudError> {
    if let Some(id) = id {
        let rule = firewall_rule(client, id).await?;
        return Ok(vec![rule]);
    }

    let path = match machine {
        Some(machine) => format!("/machines/{machine}/fwrules"),
        None => "/fwrules".to_string(),
    };

    let rules = client.fetch(&path, &FetchOptions::get()).await?;
    Ok(as_list(rules))
}

/// Preview which existing rules would apply to a not-yet-created machine
/// carrying `tags`, without waiting on the control plane to attach and
/// evaluate rules post-creation. Wildcard rules always apply; otherwise a
/// tag predicate of the rule must be satisfied by the candidate set.
pub async fn rules_for_create_machine(
    client: &CloudApi,
    tags: &Map<String, Value>,
) -> Result<Vec<Value>, CloudError> {
    let rules = firewall_rules(client, None, None).await?;

    Ok(rules
        .into_iter()
        .filter(|raw| {
            let Some(rule) = raw.get("rule").and_then(Value::as_str) else {
                return false;
            };

            match fwrule::parse(rule) {
                Ok(parsed) => parsed.matches_tags(tags),
                Err(err) => {
                    tracing::warn!("skipping unparseable firewall rule: {}", err);
                    false
                }
            }
        })
        .collect())
}

pub async fn machines(client: &CloudApi, id: &str) -> Result<Vec<Value>, CloudError> {
    let machines = client
        .fetch(&format!("/fwrules/{id}/machines"), &FetchOptions::get())
        .await?;

    Ok(as_list(machines))
}

pub async fn create_firewall_rule(
    client: &CloudApi,
    enabled: Option<bool>,
    rule: &str,
    description: Option<&str>,
) -> Result<Value, CloudError> {
    let payload = json!({
        "enabled": enabled,
        "rule": rule,
        "description": description,
    });

    let created = client.fetch("/fwrules", &FetchOptions::post(payload)).await?;

    match created.get("id").and_then(Value::as_str) {
        Some(id) => firewall_rule(client, id).await,
        None => Ok(created),
    }
}

pub async fn update_firewall_rule(
    client: &CloudApi,
    id: &str,
    enabled: Option<bool>,
    rule: Option<&str>,
    description: Option<&str>,
) -> Result<Value, CloudError> {
    let payload = json!({
        "enabled": enabled,
        "rule": rule,
        "description": description,
    });

    client
        .fetch(&format!("/fwrules/{id}"), &FetchOptions::post(payload))
        .await?;

    firewall_rule(client, id).await
}

pub async fn enable_firewall_rule(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/fwrules/{id}/enable"), &FetchOptions::post_empty())
        .await?;

    firewall_rule(client, id).await
}

pub async fn disable_firewall_rule(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    client
        .fetch(&format!("/fwrules/{id}/disable"), &FetchOptions::post_empty())
        .await?;

    firewall_rule(client, id).await
}

pub async fn delete_firewall_rule(client: &CloudApi, id: &str) -> Result<Value, CloudError> {
    let snapshot = firewall_rule(client, id).await?;
    client
        .fetch(&format!("/fwrules/{id}"), &FetchOptions::delete())
        .await?;

    Ok(snapshot)
}
