//! Integration tests for the control-plane client using wiremock
//!
//! These tests verify signing headers, dual authentication, response
//! caching, error classification, the fallback policy, and the pagination
//! probe against mocked endpoints.

use cloudapi_gql::cloudapi::auth::RequestSigner;
use cloudapi_gql::cloudapi::{CloudApi, ErrorCode, FetchOptions};
use cloudapi_gql::config::Config;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test_key.pem");

fn test_config(base_url: &str, cache_ttl_ms: u64) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        account: "acme".to_string(),
        key_id: "dev".to_string(),
        key_path: PathBuf::new(),
        concurrency: 4,
        cache_ttl_ms,
    }
}

fn test_client(server: &MockServer) -> CloudApi {
    test_client_with_ttl(server, 9_000)
}

fn test_client_with_ttl(server: &MockServer, cache_ttl_ms: u64) -> CloudApi {
    let signer = RequestSigner::from_pem(TEST_KEY, "acme", "dev").unwrap();
    CloudApi::with_signer(&test_config(&server.uri(), cache_ttl_ms), signer).unwrap()
}

mod auth_tests {
    use super::*;

    /// Every call carries Content-Type, Date, and the RSA signature over
    /// the date
    #[tokio::test]
    async fn requests_are_signed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/config"))
            .and(header("content-type", "application/json"))
            .and(header_exists("date"))
            .and(header_regex(
                "authorization",
                "^Signature keyId=\"/acme/keys/dev\",algorithm=\"rsa-sha256\" .+",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client.fetch("/config", &FetchOptions::get()).await.unwrap();
    }

    /// A delegated session token rides as X-Auth-Token next to the
    /// service signature
    #[tokio::test]
    async fn token_is_attached_when_present() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/config"))
            .and(header("x-auth-token", "delegated-token"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).with_token(Some("delegated-token".to_string()));
        client.fetch("/config", &FetchOptions::get()).await.unwrap();
    }
}

mod cache_tests {
    use super::*;

    /// Two identical GETs within the TTL produce exactly one upstream call
    #[tokio::test]
    async fn get_responses_are_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "foo": "bar" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let first = client.fetch("/config", &FetchOptions::get()).await.unwrap();
        let second = client.fetch("/config", &FetchOptions::get()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first["foo"], "bar");
    }

    /// After TTL expiry the entry is evicted and a new upstream call runs
    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "foo": "bar" })))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client_with_ttl(&server, 50);
        client.fetch("/config", &FetchOptions::get()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        client.fetch("/config", &FetchOptions::get()).await.unwrap();
    }

    /// Distinct descriptors do not share cache entries
    #[tokio::test]
    async fn cache_is_keyed_by_descriptor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/machines"))
            .and(query_param("state", "running"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a" }])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/my/machines"))
            .and(query_param("state", "stopped"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let running = client
            .fetch(
                "/machines",
                &FetchOptions::get().with_query("state", "running"),
            )
            .await
            .unwrap();
        let stopped = client
            .fetch(
                "/machines",
                &FetchOptions::get().with_query("state", "stopped"),
            )
            .await
            .unwrap();

        assert_ne!(running, stopped);
    }

    /// Mutating verbs always hit the network
    #[tokio::test]
    async fn mutating_calls_are_never_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/my/machines/m1"))
            .respond_with(ResponseTemplate::new(202))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let options = FetchOptions::post_empty().with_query("action", "stop");
        client.fetch("/machines/m1", &options).await.unwrap();
        client.fetch("/machines/m1", &options).await.unwrap();
    }
}

mod error_tests {
    use super::*;

    /// A recognized control-plane code becomes a typed domain error
    #[tokio::test]
    async fn recognized_codes_become_domain_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/machines/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "ResourceNotFound",
                "message": "VM not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .fetch("/machines/missing", &FetchOptions::get())
            .await
            .unwrap_err();

        assert!(err.is_domain());
        assert_eq!(err.code(), Some(ErrorCode::ResourceNotFound));
        assert!(err.to_string().contains("VM not found"));
    }

    /// An unrecognized failure stays a transport error
    #[tokio::test]
    async fn unrecognized_failures_stay_transport() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/machines"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .fetch("/machines", &FetchOptions::get())
            .await
            .unwrap_err();

        assert!(!err.is_domain());
        assert_eq!(err.code(), None);
    }

    /// A declared fallback value stands in for domain errors only
    #[tokio::test]
    async fn fallback_absorbs_domain_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/packages/retired"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "ResourceNotFound",
                "message": "no such package"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let value = client
            .fetch(
                "/packages/retired",
                &FetchOptions::get().with_fallback(json!({})),
            )
            .await
            .unwrap();

        assert_eq!(value, json!({}));
    }

    /// Transport-class failures propagate even with a declared fallback
    #[tokio::test]
    async fn fallback_does_not_absorb_transport_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/my/packages/retired"))
            .respond_with(ResponseTemplate::new(503).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client
            .fetch(
                "/packages/retired",
                &FetchOptions::get().with_fallback(json!({})),
            )
            .await;

        assert!(result.is_err());
    }

    /// An empty success body resolves to null
    #[tokio::test]
    async fn empty_bodies_resolve_to_null() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/my/machines/m1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let value = client
            .fetch("/machines/m1", &FetchOptions::post_empty())
            .await
            .unwrap();

        assert!(value.is_null());
    }
}

mod page_tests {
    use super::*;

    /// The probe's count header becomes the page total; offset and limit
    /// echo back and bound the results
    #[tokio::test]
    async fn page_merges_probe_count_with_results() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/my/machines"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-resource-count", "26"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/my/machines"))
            .and(query_param("offset", "2"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "m3" },
                { "id": "m4" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let page = client
            .fetch_page("/machines", &FetchOptions::get(), Some(2), Some(2))
            .await
            .unwrap();

        assert_eq!(page.offset, 2);
        assert_eq!(page.limit, 2);
        assert_eq!(page.total, 26);
        assert_eq!(page.results.as_array().unwrap().len(), 2);
    }

    /// A probe without the count header yields a zero total
    #[tokio::test]
    async fn missing_count_header_defaults_to_zero() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/my/machines"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/my/machines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let page = client
            .fetch_page("/machines", &FetchOptions::get(), None, None)
            .await
            .unwrap();

        assert_eq!(page.total, 0);
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, 0);
    }
}
