//! Schema-level integration tests
//!
//! Each test executes a real GraphQL operation against the built schema
//! with the client pointed at a mocked control plane, verifying the
//! resolver graph end to end: codec output, lookahead-driven over-fetch,
//! pagination bridging, two-phase mutations, and the firewall preview.

use async_graphql::Request;
use cloudapi_gql::cloudapi::auth::RequestSigner;
use cloudapi_gql::cloudapi::CloudApi;
use cloudapi_gql::config::Config;
use cloudapi_gql::graphql::{build_schema, CloudApiSchema};
use serde_json::{json, Value};
use std::path::PathBuf;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test_key.pem");

fn setup(server: &MockServer) -> (CloudApiSchema, CloudApi) {
    let config = Config {
        api_base_url: server.uri(),
        account: "acme".to_string(),
        key_id: "dev".to_string(),
        key_path: PathBuf::new(),
        concurrency: 4,
        cache_ttl_ms: 9_000,
    };
    let signer = RequestSigner::from_pem(TEST_KEY, "acme", "dev").unwrap();
    let client = CloudApi::with_signer(&config, signer).unwrap();
    let schema = build_schema().unwrap();

    (schema, client)
}

async fn execute(schema: &CloudApiSchema, client: &CloudApi, query: &str) -> (Value, Vec<String>) {
    let response = schema
        .execute(Request::new(query).data(client.clone()))
        .await;

    let errors = response
        .errors
        .iter()
        .map(|err| err.message.clone())
        .collect();

    (response.data.into_json().unwrap_or(Value::Null), errors)
}

fn machine_fixture(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "brand": "joyent",
        "state": "running",
        "image": "2b683a82-a066-11e3-97ab-2faa44701c5a",
        "memory": 128,
        "disk": 12288,
        "metadata": { "root_authorized_keys": "..." },
        "tags": {},
        "created": "2016-01-04T12:55:50.539Z",
        "updated": "2016-01-21T08:56:59.000Z",
        "networks": [
            "a9c130da-e3ba-40e9-8b18-112aba2d3ba7",
            "45607081-4cd2-45c8-baf7-79da760fffaa"
        ],
        "primaryIp": "10.88.88.26",
        "firewall_enabled": false,
        "package": "sdc_128"
    })
}

/// The config map surfaces as name-value pairs
#[tokio::test]
async fn config_returns_name_values() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "default_network": "45607081-4cd2-45c8-baf7-79da760fffaa"
        })))
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(&schema, &client, "query { config { name value } }").await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        data["config"],
        json!([{
            "name": "default_network",
            "value": "45607081-4cd2-45c8-baf7-79da760fffaa"
        }])
    );
}

/// A selection without dns_names issues exactly one list call and no
/// per-machine re-fetches
#[tokio::test]
async fn machine_list_without_dns_names_is_one_call() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/my/machines"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-resource-count", "1"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/machines"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([machine_fixture("m1", "web-1")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    // no mock for GET /my/machines/m1: a re-fetch would surface as an error

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        "query { machines { total results { id name } } }",
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(data["machines"]["total"], 1);
    assert_eq!(data["machines"]["results"][0]["id"], "m1");
    assert_eq!(data["machines"]["results"][0]["name"], "web-1");
}

/// Selecting dns_names triggers one re-fetch per listed machine
#[tokio::test]
async fn machine_list_with_dns_names_refetches_each_machine() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/my/machines"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-resource-count", "2"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            machine_fixture("m1", "web-1"),
            machine_fixture("m2", "web-2")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    for id in ["m1", "m2"] {
        let mut full = machine_fixture(id, "web");
        full["dns_names"] = json!([format!("{id}.example.com")]);

        Mock::given(method("GET"))
            .and(path(format!("/my/machines/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(full))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        "query { machines { results { id dns_names } } }",
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let results = data["machines"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // re-fetch preserves listing order
    assert_eq!(results[0]["id"], "m1");
    assert_eq!(results[1]["id"], "m2");
    assert_eq!(results[0]["dns_names"], json!(["m1.example.com"]));
}

/// Page echoes offset/limit and takes total from the probe
#[tokio::test]
async fn machine_list_pagination_bridges_the_probe_count() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/my/machines"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-resource-count", "26"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/machines"))
        .and(query_param("offset", "1"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            machine_fixture("m2", "web-2"),
            machine_fixture("m3", "web-3")
        ])))
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        "query { machines(offset: 1, limit: 2) { offset limit total results { id } } }",
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(data["machines"]["offset"], 1);
    assert_eq!(data["machines"]["limit"], 2);
    assert_eq!(data["machines"]["total"], 26);
    assert_eq!(data["machines"]["results"].as_array().unwrap().len(), 2);
}

/// An identifying argument turns the plural field into a single fetch
/// wrapped in a one-element page
#[tokio::test]
async fn machine_list_with_id_is_a_single_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my/machines/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_fixture("m1", "web-1")))
        .expect(1)
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        r#"query { machines(id: "m1") { total results { id } } }"#,
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(data["machines"]["total"], 1);
    assert_eq!(data["machines"]["results"][0]["id"], "m1");
}

/// The stop mutation re-fetches and reports the transitional state
#[tokio::test]
async fn stop_machine_reports_post_mutation_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/my/machines/m1"))
        .and(query_param("action", "stop"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mut stopping = machine_fixture("m1", "web-1");
    stopping["state"] = json!("stopping");

    Mock::given(method("GET"))
        .and(path("/my/machines/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stopping))
        .expect(1)
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        r#"mutation { stopMachine(id: "m1") { id state } }"#,
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(data["stopMachine"]["state"], "STOPPING");
}

/// Delete returns the pre-deletion snapshot
#[tokio::test]
async fn delete_machine_returns_the_snapshot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my/machines/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_fixture("m1", "web-1")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/my/machines/m1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        r#"mutation { deleteMachine(id: "m1") { id name } }"#,
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(data["deleteMachine"]["name"], "web-1");
}

/// The creation-time preview includes rules whose tag predicates the
/// candidate set satisfies
#[tokio::test]
async fn firewall_preview_matches_candidate_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my/fwrules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "rule-1",
                "enabled": true,
                "rule": "FROM tag bacon TO tag flavor=smokey ALLOW udp PORT 8675"
            },
            {
                "id": "rule-2",
                "enabled": true,
                "rule": "FROM tag unrelated TO any ALLOW tcp PORT 22"
            },
            {
                "id": "rule-3",
                "enabled": true,
                "rule": "FROM any TO all vms ALLOW icmp PORT all"
            }
        ])))
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        r#"query {
            firewall_rules_create_machine(tags: [{ name: "bacon" }]) {
                id
                rule_str
                rule_obj { is_wildcard tags { name value } }
            }
        }"#,
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    let rules = data["firewall_rules_create_machine"].as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0]["id"], "rule-1");
    assert_eq!(rules[0]["rule_obj"]["is_wildcard"], false);
    assert_eq!(rules[1]["id"], "rule-3");
    assert_eq!(rules[1]["rule_obj"]["is_wildcard"], true);
}

/// Nested machine networks resolve per id, preserving order
#[tokio::test]
async fn machine_networks_resolve_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my/machines/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(machine_fixture("m1", "web-1")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/networks/a9c130da-e3ba-40e9-8b18-112aba2d3ba7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "a9c130da-e3ba-40e9-8b18-112aba2d3ba7",
            "name": "external"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/networks/45607081-4cd2-45c8-baf7-79da760fffaa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "45607081-4cd2-45c8-baf7-79da760fffaa",
            "name": "internal"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        r#"query { machine(id: "m1") { networks { name } } }"#,
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(
        data["machine"]["networks"],
        json!([{ "name": "external" }, { "name": "internal" }])
    );
}

/// A classified failure surfaces per-field with its domain code, leaving
/// sibling fields intact
#[tokio::test]
async fn domain_errors_surface_with_code_and_partial_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my/machines/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "ResourceNotFound",
            "message": "VM not found"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "a": "b" })))
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let response = schema
        .execute(
            Request::new(r#"query { machine(id: "missing") { id } config { name } }"#)
                .data(client.clone()),
        )
        .await;

    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("VM not found"));

    let error = serde_json::to_value(&response.errors[0]).unwrap();
    assert_eq!(error["extensions"]["code"], "ResourceNotFound");

    // the sibling field still resolved
    let data = response.data.into_json().unwrap();
    assert_eq!(data["config"], json!([{ "name": "a" }]));
}

/// Machine tags travel as tag.<name> query parameters
#[tokio::test]
async fn machine_tag_filters_become_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/my/machines"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-resource-count", "1"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my/machines"))
        .and(query_param("tag.env", "prod"))
        .and(query_param("brand", "joyent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([machine_fixture("m1", "web-1")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (schema, client) = setup(&server);
    let (data, errors) = execute(
        &schema,
        &client,
        r#"query {
            machines(brand: "JOYENT", tags: [{ name: "env", value: "prod" }]) {
                results { id }
            }
        }"#,
    )
    .await;

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(data["machines"]["results"][0]["id"], "m1");
}
