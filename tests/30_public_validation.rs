mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn register_reports_every_invalid_field() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({
            "name": "A",
            "email": "not-an-email",
            "password": "short",
        }))
        .send()
        .await?;

    let body = common::expect_error(res, StatusCode::BAD_REQUEST).await?;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    for field in ["name", "email", "password"] {
        assert!(body["field_errors"][field].is_string(), "missing field error for {field}: {body}");
    }
    Ok(())
}

#[tokio::test]
async fn login_validates_before_lookup() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "nobody", "password": "" }))
        .send()
        .await?;

    let body = common::expect_error(res, StatusCode::BAD_REQUEST).await?;
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["password"].is_string());
    Ok(())
}

#[tokio::test]
async fn connect_form_requires_contact_details() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/connect"))
        .json(&json!({ "name": "", "email": "x", "message": "hi" }))
        .send()
        .await?;

    let body = common::expect_error(res, StatusCode::BAD_REQUEST).await?;
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/login"))
        .header("Content-Type", "application/json")
        .body("{\"email\": ")
        .send()
        .await?;
    common::expect_error(res, StatusCode::BAD_REQUEST).await?;

    let res = client
        .post(server.url("/connect"))
        .body("name=Ada")
        .send()
        .await?;
    common::expect_error(res, StatusCode::BAD_REQUEST).await?;
    Ok(())
}

#[tokio::test]
async fn refresh_requires_a_token_field() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "token": "   " }))
        .send()
        .await?;
    let body = common::expect_error(res, StatusCode::BAD_REQUEST).await?;
    assert!(body["field_errors"]["token"].is_string());
    Ok(())
}
