mod common;

use anyhow::Result;
use lms_api_rust::auth::{generate_jwt_with_secret, Claims};
use reqwest::StatusCode;

fn claims(exp_offset_secs: i64) -> Claims {
    let now = chrono::Utc::now().timestamp();
    Claims {
        sub: "64b7f0c2a1b2c3d4e5f60718".into(),
        email: "student@example.org".into(),
        role: "student".into(),
        franchise_code: None,
        branch_code: None,
        exp: now + exp_offset_secs,
        iat: now,
    }
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/api/auth/me", "/api/courses", "/api/enrollments", "/api/notifications"] {
        let res = client.get(server.url(path)).send().await?;
        let body = common::expect_error(res, StatusCode::UNAUTHORIZED).await?;
        assert_eq!(body["error"], "UNAUTHORIZED", "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn admin_routes_check_the_token_first() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/admin/franchises")).send().await?;
    common::expect_error(res, StatusCode::UNAUTHORIZED).await?;

    let res = client
        .post(server.url("/api/admin/franchises/NORTH/status"))
        .json(&serde_json::json!({ "status": "suspended" }))
        .send()
        .await?;
    common::expect_error(res, StatusCode::UNAUTHORIZED).await?;
    Ok(())
}

#[tokio::test]
async fn malformed_authorization_headers_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for header in ["Token abc", "Bearer ", "Bearer not.a.jwt"] {
        let res = client
            .get(server.url("/api/courses"))
            .header("Authorization", header)
            .send()
            .await?;
        common::expect_error(res, StatusCode::UNAUTHORIZED).await?;
    }
    Ok(())
}

#[tokio::test]
async fn tokens_signed_elsewhere_or_expired_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let foreign = generate_jwt_with_secret(&claims(3600), "some-other-secret-entirely-0000")?;
    let res = client.get(server.url("/api/auth/me")).bearer_auth(foreign).send().await?;
    common::expect_error(res, StatusCode::UNAUTHORIZED).await?;

    let expired = generate_jwt_with_secret(&claims(-7200), common::JWT_SECRET)?;
    let res = client.get(server.url("/api/auth/me")).bearer_auth(expired).send().await?;
    common::expect_error(res, StatusCode::UNAUTHORIZED).await?;
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_garbage_tokens() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/refresh"))
        .json(&serde_json::json!({ "token": "garbage" }))
        .send()
        .await?;
    common::expect_error(res, StatusCode::UNAUTHORIZED).await?;
    Ok(())
}
