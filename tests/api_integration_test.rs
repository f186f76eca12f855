mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use supply_hub_api::auth::Role;

#[tokio::test]
async fn item_endpoints_enforce_roles() {
    let app = TestApp::new().await;
    let admin = app
        .seed_user("Admin", "admin@example.com", Role::Admin)
        .await;
    let plain = app.seed_user("User", "user@example.com", Role::User).await;
    let admin_token = app.token_for(&admin).await;
    let user_token = app.token_for(&plain).await;

    // Unauthenticated requests are rejected outright.
    let (status, _) = app
        .request_json(Method::GET, "/api/v1/items", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A plain user may read but not create.
    let payload = json!({
        "name": "Bond paper",
        "quantity": 10,
        "unit": "ream",
        "reorder_point": 3
    });
    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/v1/items",
            Some(&user_token),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/items",
            Some(&admin_token),
            Some(payload),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("Available"));

    let (status, body) = app
        .request_json(
            Method::GET,
            "/api/v1/items?search=bond",
            Some(&user_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));
}

#[tokio::test]
async fn request_lifecycle_over_http() {
    let app = TestApp::new().await;
    let admin = app
        .seed_user("Admin", "admin@example.com", Role::Admin)
        .await;
    let approver = app
        .seed_user("A. Reyes", "areyes@example.com", Role::Approver)
        .await;
    let requester = app
        .seed_user("J. Cruz", "jcruz@example.com", Role::User)
        .await;

    let admin_token = app.token_for(&admin).await;
    let approver_token = app.token_for(&approver).await;
    let requester_token = app.token_for(&requester).await;

    // Admin registers an item.
    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/items",
            Some(&admin_token),
            Some(json!({
                "name": "Bond paper",
                "quantity": 10,
                "unit": "ream",
                "reorder_point": 3
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let item_id = body["data"]["id"].as_str().unwrap().to_string();

    // Requester submits a supply-out request.
    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/requests",
            Some(&requester_token),
            Some(json!({
                "requester_name": "J. Cruz",
                "requester_email": "jcruz@example.com",
                "division": "HRDO",
                "section": "Records",
                "kind": "SupplyOut",
                "items": [{ "item_id": item_id, "quantity": 4 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], json!("Pending"));

    // A plain user cannot approve.
    let (status, _) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/requests/{request_id}/approve"),
            Some(&requester_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The approver can.
    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/requests/{request_id}/approve"),
            Some(&approver_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("Approved"));

    // A second decision races into a conflict.
    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/requests/{request_id}/reject"),
            Some(&approver_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("Conflict"));

    // Stock moved once.
    let (status, body) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/items/{item_id}"),
            Some(&requester_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(6));

    // Receipt confirmation by the requester.
    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/requests/{request_id}/receive"),
            Some(&requester_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_received"], json!(true));
}

#[tokio::test]
async fn insufficient_stock_surfaces_every_offending_line() {
    let app = TestApp::new().await;
    let admin = app
        .seed_user("Admin", "admin@example.com", Role::Admin)
        .await;
    let token = app.token_for(&admin).await;

    let (_, body) = app
        .request_json(
            Method::POST,
            "/api/v1/items",
            Some(&token),
            Some(json!({
                "name": "Stapler",
                "quantity": 1,
                "unit": "pc",
                "reorder_point": 0
            })),
        )
        .await;
    let item_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .request_json(
            Method::POST,
            "/api/v1/requests",
            Some(&token),
            Some(json!({
                "requester_name": "J. Cruz",
                "requester_email": "jcruz@example.com",
                "division": "HRDO",
                "section": "Records",
                "kind": "SupplyOut",
                "items": [{ "item_id": item_id, "quantity": 5 }]
            })),
        )
        .await;
    let request_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/requests/{request_id}/approve"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap().contains("Stapler"));
    assert_eq!(body["details"][0]["requested"], json!(5));
    assert_eq!(body["details"][0]["available"], json!(1));
}

#[tokio::test]
async fn login_issues_tokens_and_rejects_bad_credentials() {
    let app = TestApp::new().await;
    app.seed_user("J. Cruz", "jcruz@example.com", Role::User)
        .await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({
                "email": "jcruz@example.com",
                "password": "a-sufficiently-long-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["token_type"], json!("Bearer"));

    // The freshly issued token authenticates API calls.
    let (status, _) = app
        .request_json(Method::GET, "/api/v1/items", Some(&access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_json(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({
                "email": "jcruz@example.com",
                "password": "wrong-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn csv_export_returns_csv_with_attachment_header() {
    let app = TestApp::new().await;
    let admin = app
        .seed_user("Admin", "admin@example.com", Role::Admin)
        .await;
    let token = app.token_for(&admin).await;

    app.request_json(
        Method::POST,
        "/api/v1/items",
        Some(&token),
        Some(json!({
            "name": "Bond paper",
            "quantity": 10,
            "unit": "ream",
            "reorder_point": 3
        })),
    )
    .await;

    let (status, bytes) = app
        .request(Method::GET, "/api/v1/items/export", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("id,name,quantity"));
    assert!(text.contains("Bond paper"));
}

#[tokio::test]
async fn memorandum_crud_round_trip() {
    let app = TestApp::new().await;
    let admin = app
        .seed_user("Admin", "admin@example.com", Role::Admin)
        .await;
    let token = app.token_for(&admin).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            "/api/v1/memorandums",
            Some(&token),
            Some(json!({
                "title": "Supply cut-off schedule",
                "reference_no": "HRDO-2024-017",
                "body": "Quarterly cut-off dates for supply requests.",
                "issued_on": "2024-03-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let memo_id = body["data"]["id"].as_str().unwrap().to_string();

    // Duplicate reference numbers are rejected.
    let (status, _) = app
        .request_json(
            Method::POST,
            "/api/v1/memorandums",
            Some(&token),
            Some(json!({
                "title": "Duplicate",
                "reference_no": "HRDO-2024-017",
                "issued_on": "2024-03-02"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .request_json(
            Method::GET,
            "/api/v1/memorandums?search=HRDO-2024",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));

    let (status, _) = app
        .request_json(
            Method::DELETE,
            &format!("/api/v1/memorandums/{memo_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/memorandums/{memo_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
