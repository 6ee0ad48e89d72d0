// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketo client tests against a mock HTTP server.

use marketo_sync::config::MarketoConfig;
use marketo_sync::models::{LeadLookup, SyncInput, UpsertRequest};
use marketo_sync::services::{CrmClient, MarketoClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> MarketoClient {
    MarketoClient::new(&MarketoConfig {
        id: "client-id".to_string(),
        secret: "client-secret".to_string(),
        url: server.uri(),
        clinic_role: "clinic".to_string(),
        patient_role: "patient".to_string(),
        timeout_secs: 5,
    })
    .unwrap()
}

async fn mount_token(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/identity/oauth/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(query_param("client_id", "client-id"))
        .and(query_param("client_secret", "client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 3599,
            "scope": "api@example.com",
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn input() -> SyncInput {
    SyncInput {
        id: None,
        tidepool_id: "u1".to_string(),
        email: "jane@example.com".to_string(),
        user_type: "patient".to_string(),
        unsubscribed: false,
        deleted_account: false,
        is_member_of_multiple_clinics: false,
        is_prescriber: false,
    }
}

#[tokio::test]
async fn test_find_lead_sends_email_filter() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/leads.json"))
        .and(header("authorization", "Bearer tok-1"))
        .and(query_param("filterType", "email"))
        .and(query_param("filterValues", "jane@example.com"))
        .and(query_param("fields", "email,id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "r1",
            "success": true,
            "result": [{"id": 318581, "email": "jane@example.com"}],
        })))
        .mount(&server)
        .await;

    let lookup = client(&server).find_lead("jane@example.com").await.unwrap();
    assert_eq!(lookup.existing_id(), Some(318581));
}

#[tokio::test]
async fn test_find_lead_with_duplicates_is_ambiguous() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/leads.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [
                {"id": 1, "email": "dup@example.com"},
                {"id": 2, "email": "dup@example.com"},
            ],
        })))
        .mount(&server)
        .await;

    let lookup = client(&server).find_lead("dup@example.com").await.unwrap();
    assert_eq!(lookup, LeadLookup::Ambiguous(2));
}

#[tokio::test]
async fn test_access_token_is_reused() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/leads.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": []})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.find_lead("a@example.com").await.unwrap(), LeadLookup::Missing);
    assert_eq!(client.find_lead("b@example.com").await.unwrap(), LeadLookup::Missing);
}

#[tokio::test]
async fn test_upsert_posts_create_only_body() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/leads.json"))
        .and(body_json(json!({
            "action": "createOnly",
            "lookupField": "email",
            "input": [{
                "tidepoolID": "u1",
                "email": "jane@example.com",
                "userType": "patient",
                "unsubscribed": false,
                "deletedAccount": false,
                "clinicWorkspaceMemberofMultipleClinics": false,
                "clinicWorkspacePrescriber": false,
            }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": [{"id": 50, "status": "created"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client(&server)
        .upsert(&UpsertRequest::create_only(input()))
        .await
        .unwrap();
    assert_eq!(results[0].id, Some(50));
    assert_eq!(results[0].status, "created");
}

#[tokio::test]
async fn test_unsuccessful_response_is_error() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/leads.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{"code": "1003", "message": "Invalid action"}],
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .upsert(&UpsertRequest::update_only(50, input()))
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("1003: Invalid action"));
}

#[tokio::test]
async fn test_expired_token_forces_new_login() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 2).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/leads.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{"code": "602", "message": "Access token expired"}],
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.find_lead("a@example.com").await.is_err());
    assert!(client.find_lead("a@example.com").await.is_err());
}

#[tokio::test]
async fn test_http_error_is_upstream_error() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/leads.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let err = client(&server).find_lead("a@example.com").await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_is_available_logs_in() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    let client = client(&server);
    assert!(client.is_available().await);
    // Cached token, no second login.
    assert!(client.is_available().await);
}

#[tokio::test]
async fn test_is_available_false_when_login_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/identity/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "unauthorized",
            "error_description": "Bad client credentials",
        })))
        .mount(&server)
        .await;

    assert!(!client(&server).is_available().await);
}

#[tokio::test]
async fn test_out_of_range_token_lifetime_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/identity/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "bearer",
            "expires_in": i64::MAX,
            "scope": "api@example.com",
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.find_lead("a@example.com").await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("Token lifetime out of range"), "{err}");
    assert!(!client.is_available().await);
}
