use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use orderdesk_api::config::ApiConfig;
use orderdesk_auth::{Claim, JwtClaims, Role};
use orderdesk_core::{OrderId, UserId};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = orderdesk_api::app::build_app(ApiConfig::in_memory(JWT_SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_order(&self, token: &str, title: &str, amount: &str) -> Value {
        let res = self
            .client
            .post(self.url("/orders"))
            .bearer_auth(token)
            .json(&json!({ "title": title, "amount": amount }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }

    async fn post(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn audit(&self, token: &str, query: &str) -> Vec<Value> {
        let res = self
            .client
            .get(self.url(&format!("/audit{query}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(name: &str, roles: Vec<Role>, claims: Vec<Claim>) -> String {
    mint_jwt_with_secret(JWT_SECRET, name, roles, claims)
}

fn mint_jwt_with_secret(secret: &str, name: &str, roles: Vec<Role>, claims: Vec<Claim>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        name: name.to_string(),
        roles,
        claims,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Seeded accounts: roles and claims come from the identity directory.
fn admin() -> String {
    mint_jwt("admin@demo.local", vec![], vec![])
}

fn manager() -> String {
    mint_jwt("manager@demo.local", vec![], vec![])
}

fn user() -> String {
    mint_jwt("user@demo.local", vec![], vec![])
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let forged = mint_jwt_with_secret("other-secret", "admin@demo.local", vec![], vec![]);
    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_resolves_seeded_accounts_from_the_directory() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(admin())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["source"], "directory");
    assert_eq!(body["user_name"], "admin@demo.local");
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "Admin"));
    assert!(body["claims"].as_array().unwrap().iter().any(|c| c == "perm=export"));

    let policies = body["policies"].as_array().unwrap();
    assert!(policies.iter().all(|p| p["granted"] == true));
}

#[tokio::test]
async fn unknown_subjects_keep_token_roles_and_claims() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt("auditor@example.com", vec![Role::MANAGER], vec![]);

    let body: Value = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["source"], "token");
    assert_eq!(body["roles"], json!(["Manager"]));

    let granted: Vec<&str> = body["policies"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["granted"] == true)
        .map(|p| p["policy"].as_str().unwrap())
        .collect();
    assert_eq!(granted, vec!["CanViewAudit"]);
}

#[tokio::test]
async fn order_lifecycle_create_submit_approve() {
    let srv = TestServer::spawn().await;
    let user = user();

    let order = srv.create_order(&user, "Laptop", "1200.00").await;
    assert_eq!(order["status"], "Draft");
    assert_eq!(order["amount"], "1200.00");
    assert_eq!(order["version"], 1);
    let id = order["id"].as_str().unwrap().to_string();

    let res = srv.post(&user, &format!("/orders/{id}/submit")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["etag"], "\"2\"");
    let submitted: Value = res.json().await.unwrap();
    assert_eq!(submitted["status"], "Submitted");

    let res = srv
        .client
        .post(srv.url(&format!("/orders/{id}/approve")))
        .bearer_auth(manager())
        .header("If-Match", "\"2\"")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let approved: Value = res.json().await.unwrap();
    assert_eq!(approved["status"], "Approved");
    assert!(approved["approved_at_utc"].is_string());
    assert_eq!(approved["version"], 3);

    let trail = srv.audit(&admin(), &format!("?order_id={id}")).await;
    let actions: Vec<&str> = trail.iter().map(|l| l["action"].as_str().unwrap()).collect();
    assert_eq!(actions, vec!["Approved", "Submitted", "Created"]);
    assert_eq!(trail[0]["performed_by_user_name"], "manager@demo.local");
}

#[tokio::test]
async fn error_statuses_follow_the_error_kind() {
    let srv = TestServer::spawn().await;
    let user = user();

    // Validation
    let res = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&user)
        .json(&json!({ "title": "Laptop", "amount": "-5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    // Malformed id
    let res = srv.post(&user, "/orders/not-a-uuid/submit").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Not found
    let res = srv
        .client
        .get(srv.url(&format!("/orders/{}", OrderId::new())))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let order = srv.create_order(&user, "Chair", "80").await;
    let id = order["id"].as_str().unwrap().to_string();

    // Forbidden: no perm=approve
    let res = srv.post(&user, &format!("/orders/{id}/approve")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Invalid transition: approving a Draft
    let res = srv.post(&manager(), &format!("/orders/{id}/approve")).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Conflict: stale token
    let res = srv
        .client
        .post(srv.url(&format!("/orders/{id}/submit")))
        .bearer_auth(&user)
        .json(&json!({ "expected_version": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn malformed_transition_bodies_are_rejected_without_side_effects() {
    let srv = TestServer::spawn().await;
    let user = user();
    let order = srv.create_order(&user, "Chair", "80").await;
    let id = order["id"].as_str().unwrap().to_string();

    for body in [r#"{"expected_version":"7"}"#, r#"{"expected_version":"#] {
        let res = srv
            .client
            .post(srv.url(&format!("/orders/{id}/submit")))
            .bearer_auth(&user)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body {body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
    }

    let res = srv
        .client
        .get(srv.url(&format!("/orders/{id}")))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    let unchanged: Value = res.json().await.unwrap();
    assert_eq!(unchanged["status"], "Draft");
    assert_eq!(unchanged["version"], 1);

    // A bodiless transition still works.
    let res = srv.post(&user, &format!("/orders/{id}/submit")).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn draft_edits_are_creator_only() {
    let srv = TestServer::spawn().await;
    let user = user();
    let order = srv.create_order(&user, "Desk", "300").await;
    let id = order["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .put(srv.url(&format!("/orders/{id}")))
        .bearer_auth(admin())
        .json(&json!({ "title": "Desk", "amount": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .put(srv.url(&format!("/orders/{id}")))
        .bearer_auth(&user)
        .header("If-Match", "1")
        .json(&json!({ "title": "Standing desk", "amount": "450.5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["title"], "Standing desk");
    assert_eq!(updated["amount"], "450.50");
    assert_eq!(updated["version"], 2);
}

#[tokio::test]
async fn reject_records_the_reason() {
    let srv = TestServer::spawn().await;
    let user = user();
    let order = srv.create_order(&user, "Monitor", "250").await;
    let id = order["id"].as_str().unwrap().to_string();
    srv.post(&user, &format!("/orders/{id}/submit")).await;

    let res = srv
        .client
        .post(srv.url(&format!("/orders/{id}/reject")))
        .bearer_auth(admin())
        .json(&json!({ "reason": "over budget" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rejected: Value = res.json().await.unwrap();
    assert_eq!(rejected["status"], "Rejected");
    assert!(rejected["approved_at_utc"].is_null());

    let trail = srv.audit(&admin(), "?action=rejected").await;
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0]["details"], "reason: over budget");
}

#[tokio::test]
async fn export_requires_admin_or_export_claim() {
    let srv = TestServer::spawn().await;
    srv.create_order(&user(), "Foo\"Bar", "10").await;

    let res = srv
        .client
        .get(srv.url("/orders/export.csv"))
        .bearer_auth(manager())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(srv.audit(&admin(), "?action=Exported").await.is_empty());

    let res = srv
        .client
        .get(srv.url("/orders/export.csv"))
        .bearer_auth(admin())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/csv; charset=utf-8");
    assert_eq!(
        res.headers()["content-disposition"],
        "attachment; filename=\"Orders.csv\""
    );
    let csv = res.text().await.unwrap();
    assert!(csv.starts_with("Id,Title,Amount,Status,CreatedBy,CreatedAtUtc,ApprovedAtUtc\n"));
    assert!(csv.contains("\"Foo\"\"Bar\""));

    let exports = srv.audit(&admin(), "?action=Exported").await;
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0]["details"], "1 orders exported");
    assert!(exports[0]["order_id"].is_null());
}

#[tokio::test]
async fn audit_trail_is_hidden_from_plain_users() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/audit"))
        .bearer_auth(user())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .get(srv.url("/audit?action=archived"))
        .bearer_auth(admin())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
