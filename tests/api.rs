mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tenancy::auth::{FederatedProvider, SharedAuthProvider};
use tenancy::config::{AppConfig, OrganizationsConfig};
use tenancy::domain::Role;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    count_organizations, expect_json, send_request, setup_test_app, setup_test_app_with,
    setup_test_app_with_provider, TestApp,
};

async fn table_count(app: &TestApp, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&app.pool)
        .await
        .expect("count rows")
}

fn org_path(org: &Value) -> String {
    format!("/organization/{}", org["id"].as_str().expect("organization id"))
}

#[tokio::test]
async fn profile_lifecycle() {
    let app = setup_test_app().await;
    let token = app.token("subject-1", "test@example.com");
    assert_eq!(table_count(&app, "profiles").await, 0);

    for _ in 0..2 {
        let response = send_request(&app, Method::POST, "/profile", Some(&token), None).await;
        let profile = expect_json(response, StatusCode::OK).await;
        assert_eq!(profile["email"], "test@example.com");
        assert_eq!(profile["isSubscribedToNewsletter"], false);

        assert_eq!(table_count(&app, "profiles").await, 1);
        assert_eq!(table_count(&app, "organizations").await, 1);
        assert_eq!(table_count(&app, "memberships").await, 1);
    }

    let response = send_request(&app, Method::GET, "/profile", Some(&token), None).await;
    let profile = expect_json(response, StatusCode::OK).await;
    assert_eq!(profile["email"], "test@example.com");

    let response = send_request(
        &app,
        Method::PATCH,
        "/profile",
        Some(&token),
        Some(json!({ "isSubscribedToNewsletter": true })),
    )
    .await;
    let profile = expect_json(response, StatusCode::OK).await;
    assert_eq!(profile["isSubscribedToNewsletter"], true);

    let response = send_request(&app, Method::DELETE, "/profile", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(table_count(&app, "profiles").await, 0);

    let response = send_request(&app, Method::POST, "/profile", Some(&token), None).await;
    let profile = expect_json(response, StatusCode::OK).await;
    assert_eq!(profile["isSubscribedToNewsletter"], false);
    assert_eq!(table_count(&app, "profiles").await, 1);
}

#[tokio::test]
async fn organization_lifecycle() {
    let app = setup_test_app().await;
    let token = app.token("subject-1", "test@example.com");
    let token2 = app.token("subject-2", "test2@example.com");

    send_request(&app, Method::POST, "/profile", Some(&token), None).await;
    assert_eq!(table_count(&app, "organizations").await, 1);

    let response = send_request(
        &app,
        Method::POST,
        "/organization",
        Some(&token),
        Some(json!({ "name": "Test Organization" })),
    )
    .await;
    let org = expect_json(response, StatusCode::OK).await;
    assert_eq!(org["name"], "Test Organization");
    assert_eq!(table_count(&app, "organizations").await, 2);
    assert_eq!(count_organizations(&app, &token).await, 2);

    let response = send_request(
        &app,
        Method::PATCH,
        &org_path(&org),
        Some(&token),
        Some(json!({ "name": "New name" })),
    )
    .await;
    let renamed = expect_json(response, StatusCode::OK).await;
    assert_eq!(renamed["name"], "New name");
    assert_eq!(renamed["id"], org["id"]);

    let response = send_request(&app, Method::POST, "/profile", Some(&token2), None).await;
    let profile2 = expect_json(response, StatusCode::OK).await;
    assert_eq!(profile2["email"], "test2@example.com");
    assert_eq!(table_count(&app, "organizations").await, 3);

    let members_path = format!("{}/members", org_path(&org));
    for role in ["lurker", "editor"] {
        let response = send_request(
            &app,
            Method::PUT,
            &members_path,
            Some(&token),
            Some(json!({ "email": "test2@example.com", "role": role })),
        )
        .await;
        let member = expect_json(response, StatusCode::OK).await;
        assert_eq!(member["role"], role);
        assert_eq!(member["profileId"], profile2["id"]);
    }

    let response = send_request(&app, Method::GET, &members_path, Some(&token2), None).await;
    let members = expect_json(response, StatusCode::OK).await;
    assert_eq!(members.as_array().unwrap().len(), 2);

    let response = send_request(
        &app,
        Method::DELETE,
        &format!("{}/test2@example.com", members_path),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&token),
        Some(json!({ "email": "unregistered@example.com", "role": "admin" })),
    )
    .await;
    let member = expect_json(response, StatusCode::OK).await;
    assert_eq!(member["email"], "unregistered@example.com");
    assert_eq!(member["role"], "admin");
    assert_eq!(member["pending"], true);

    let response = send_request(
        &app,
        Method::DELETE,
        &format!("{}/unregistered@example.com", members_path),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(table_count(&app, "organizations").await, 3);

    let response = send_request(&app, Method::DELETE, &org_path(&org), Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(table_count(&app, "organizations").await, 2);
    assert_eq!(table_count(&app, "profiles").await, 2);

    for caller in [&token2, &token] {
        let response = send_request(&app, Method::DELETE, "/profile", Some(caller), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
    assert_eq!(table_count(&app, "profiles").await, 0);
}

#[tokio::test]
async fn invitation_is_bound_when_invitee_signs_up() {
    let app = setup_test_app().await;
    let alice = app.token("alice", "alice@example.com");
    let bob = app.token("bob", "bob@example.com");

    let response = send_request(
        &app,
        Method::POST,
        "/organization",
        Some(&alice),
        Some(json!({ "name": "Acme" })),
    )
    .await;
    let org = expect_json(response, StatusCode::OK).await;
    let members_path = format!("{}/members", org_path(&org));

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&alice),
        Some(json!({ "email": "Bob@Example.com", "role": "editor" })),
    )
    .await;
    let invite = expect_json(response, StatusCode::OK).await;
    assert_eq!(invite["pending"], true);

    // Bob's first request provisions his profile and claims the invitation
    assert_eq!(count_organizations(&app, &bob).await, 2);

    let response = send_request(&app, Method::GET, &members_path, Some(&bob), None).await;
    let members = expect_json(response, StatusCode::OK).await;
    let bob_member = members
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["email"] == "bob@example.com")
        .expect("bob is listed");
    assert_eq!(bob_member["pending"], false);
    assert_eq!(bob_member["role"], "editor");
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let app = setup_test_app().await;

    let response = send_request(&app, Method::GET, "/profile", None, None).await;
    let body = expect_json(response, StatusCode::UNAUTHORIZED).await;
    assert_eq!(body["error"], "unauthorized");

    let response = send_request(&app, Method::GET, "/profile", Some("not-a-jwt"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let other = tenancy::auth::LocalSignedProvider::new(
        b"some-other-secret-that-is-long-enough!!",
        Duration::from_secs(60),
    );
    let forged = other.issue_token("subject-1", Some("test@example.com"), None).unwrap();
    let response = send_request(&app, Method::GET, "/organization", Some(&forged), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(table_count(&app, "profiles").await, 0);
}

#[tokio::test]
async fn health_is_public() {
    let app = setup_test_app().await;
    let response = send_request(&app, Method::GET, "/health", None, None).await;
    let body = expect_json(response, StatusCode::OK).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["reachable"], true);
}

#[tokio::test]
async fn role_thresholds_are_enforced() {
    let app = setup_test_app().await;
    let owner = app.token("owner", "owner@example.com");
    let editor = app.token("editor", "editor@example.com");
    let outsider = app.token("outsider", "outsider@example.com");

    let response = send_request(
        &app,
        Method::POST,
        "/organization",
        Some(&owner),
        Some(json!({ "name": "Acme" })),
    )
    .await;
    let org = expect_json(response, StatusCode::OK).await;
    let members_path = format!("{}/members", org_path(&org));

    send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&owner),
        Some(json!({ "email": "editor@example.com", "role": "editor" })),
    )
    .await;

    let response = send_request(
        &app,
        Method::PATCH,
        &org_path(&org),
        Some(&editor),
        Some(json!({ "name": "Hijacked" })),
    )
    .await;
    let body = expect_json(response, StatusCode::FORBIDDEN).await;
    assert_eq!(body["error"], "forbidden");

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&editor),
        Some(json!({ "email": "friend@example.com", "role": "lurker" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send_request(&app, Method::GET, &members_path, Some(&outsider), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send_request(&app, Method::DELETE, &org_path(&org), Some(&editor), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn last_owner_cannot_leave() {
    let app = setup_test_app().await;
    let owner = app.token("owner", "owner@example.com");

    let response = send_request(&app, Method::GET, "/organization", Some(&owner), None).await;
    let orgs = expect_json(response, StatusCode::OK).await;
    let default_org = &orgs.as_array().unwrap()[0];
    let members_path = format!("{}/members", org_path(default_org));

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&owner),
        Some(json!({ "email": "owner@example.com", "role": "admin" })),
    )
    .await;
    let body = expect_json(response, StatusCode::CONFLICT).await;
    assert_eq!(body["error"], "conflict");

    let response = send_request(
        &app,
        Method::DELETE,
        &format!("{}/owner@example.com", members_path),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let app = setup_test_app().await;
    let token = app.token("subject-1", "test@example.com");

    let response =
        send_request(&app, Method::PATCH, "/organization/not-a-uuid", Some(&token), Some(json!({ "name": "x" })))
            .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send_request(
        &app,
        Method::POST,
        "/organization",
        Some(&token),
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let orgs = expect_json(
        send_request(&app, Method::GET, "/organization", Some(&token), None).await,
        StatusCode::OK,
    )
    .await;
    let members_path = format!("{}/members", org_path(&orgs[0]));

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&token),
        Some(json!({ "email": "not-an-email", "role": "editor" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send_request(
        &app,
        Method::DELETE,
        &format!("{}/nobody", members_path),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn custom_policy_lets_editors_manage_members() {
    let config = AppConfig {
        organizations: OrganizationsConfig {
            manage_members_role: Role::Editor,
            ..OrganizationsConfig::default()
        },
        ..AppConfig::default()
    };
    let app = setup_test_app_with(config).await;
    let owner = app.token("owner", "owner@example.com");
    let editor = app.token("editor", "editor@example.com");

    let org = expect_json(
        send_request(
            &app,
            Method::POST,
            "/organization",
            Some(&owner),
            Some(json!({ "name": "Acme" })),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    let members_path = format!("{}/members", org_path(&org));

    send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&owner),
        Some(json!({ "email": "editor@example.com", "role": "editor" })),
    )
    .await;

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&editor),
        Some(json!({ "email": "friend@example.com", "role": "lurker" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Grants are capped at the granter's own role
    for (email, role) in [("editor@example.com", "owner"), ("friend@example.com", "admin")] {
        let response = send_request(
            &app,
            Method::PUT,
            &members_path,
            Some(&editor),
            Some(json!({ "email": email, "role": role })),
        )
        .await;
        let body = expect_json(response, StatusCode::FORBIDDEN).await;
        assert_eq!(body["error"], "forbidden");
    }
    let members = expect_json(
        send_request(&app, Method::GET, &members_path, Some(&owner), None).await,
        StatusCode::OK,
    )
    .await;
    let editor_row = members
        .as_array()
        .expect("member list")
        .iter()
        .find(|m| m["email"] == "editor@example.com")
        .expect("editor membership");
    assert_eq!(editor_row["role"], "editor");
}

#[tokio::test]
async fn undecodable_bodies_return_json_errors() {
    let app = setup_test_app().await;
    let token = app.token("subject-1", "test@example.com");

    let orgs = expect_json(
        send_request(&app, Method::GET, "/organization", Some(&token), None).await,
        StatusCode::OK,
    )
    .await;
    let members_path = format!("{}/members", org_path(&orgs[0]));

    let response = send_request(
        &app,
        Method::PUT,
        &members_path,
        Some(&token),
        Some(json!({ "email": "friend@example.com", "role": "superuser" })),
    )
    .await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let response = send_request(
        &app,
        Method::PATCH,
        "/profile",
        Some(&token),
        Some(json!({ "isSubscribedToNewsletter": "yes" })),
    )
    .await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "bad_request");

    let response =
        send_request(&app, Method::POST, "/organization", Some(&token), Some(json!({}))).await;
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"], "bad_request");
    assert_eq!(count_organizations(&app, &token).await, 1);
}

#[tokio::test]
async fn unreachable_key_set_is_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = FederatedProvider::new(
        &format!("{}/jwks", server.uri()),
        None,
        None,
        Duration::from_secs(60),
        Duration::from_secs(1),
    )
    .unwrap();
    let auth: SharedAuthProvider = Arc::new(provider);
    let app = setup_test_app_with_provider(auth).await;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("k1".to_string());
    let claims = json!({ "sub": "subject-1", "email": "test@example.com", "exp": 4102444800i64 });
    let key = EncodingKey::from_rsa_pem(include_bytes!("fixtures/jwks_test_key.pem")).unwrap();
    let token = encode(&header, &claims, &key).unwrap();

    let response = send_request(&app, Method::GET, "/profile", Some(&token), None).await;
    let body = expect_json(response, StatusCode::SERVICE_UNAVAILABLE).await;
    assert_eq!(body["error"], "service_unavailable");
}
