mod common;

use axum::http::StatusCode;
use serde_json::json;

use crate::common::{build_test_app, get, json_request, send, ADMIN, STAFF};

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let app = build_test_app(vec![]);
    let (status, _) = send(&app, get("/api/users", Some(STAFF))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get("/api/users", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_users_without_passwords() {
    let app = build_test_app(vec![]);
    let (status, body) = send(&app, get("/api/users?sortBy=username&sortOrder=asc", Some(ADMIN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["users"][0]["username"], "admin");
    assert_eq!(body["users"][1]["role"], "PEA");
    assert!(!body.to_string().contains("password"));
    assert!(!body.to_string().contains("$2"));
}

#[tokio::test]
async fn test_role_filter() {
    let app = build_test_app(vec![]);
    let (_, body) = send(&app, get("/api/users?role=ADMIN", Some(ADMIN))).await;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["users"][0]["username"], "admin");
}

#[tokio::test]
async fn test_create_user_and_duplicate() {
    let app = build_test_app(vec![]);
    let payload = json!({ "username": "installer01", "displayname": "ทีมติดตั้ง 1", "role": "OUTSOURCE" });

    let (status, body) = send(&app, json_request("POST", "/api/users", Some(ADMIN), payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role"], "OUTSOURCE");

    // the new account can sign in with the default password
    let (status, _) = send(&app, get("/api/auth/me", Some(("installer01", "12345678")))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, json_request("POST", "/api/users", Some(ADMIN), payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ชื่อผู้ใช้งานนี้ถูกใช้ไปแล้ว");
}

#[tokio::test]
async fn test_create_user_validation() {
    let app = build_test_app(vec![]);
    let payload = json!({ "username": "ab", "displayname": "ok name", "role": "PEA" });
    let (status, body) = send(&app, json_request("POST", "/api/users", Some(ADMIN), payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("ข้อมูลไม่ถูกต้อง"));
}

#[tokio::test]
async fn test_update_and_delete_user() {
    let app = build_test_app(vec![]);
    let staff_id = app
        .users
        .users()
        .into_iter()
        .find(|u| u.username == STAFF.0)
        .unwrap()
        .id;

    let payload = json!({ "username": "somchai", "displayname": "Somchai J.", "role": "OUTSOURCE" });
    let (status, body) = send(
        &app,
        json_request("PUT", &format!("/api/users/{}", staff_id), Some(ADMIN), payload),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayname"], "Somchai J.");

    // password unchanged
    let (status, body) = send(&app, get("/api/auth/me", Some(STAFF))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "OUTSOURCE");

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/api/users/{}", staff_id), Some(ADMIN), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/api/users/{}", staff_id), Some(ADMIN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // deleted accounts stop authenticating at once
    let (status, _) = send(&app, get("/api/auth/me", Some(STAFF))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_endpoint() {
    let app = build_test_app(vec![]);
    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/login", None, json!({ "username": "admin", "password": "admin-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/login", None, json!({ "username": "ghost", "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "ชื่อผู้ใช้งานไม่ถูกต้อง");
}

#[tokio::test]
async fn test_admin_recreated_after_every_account_is_deleted() {
    let app = build_test_app(vec![]);
    let ids: Vec<_> = app
        .users
        .users()
        .into_iter()
        .filter(|u| u.username != ADMIN.0)
        .chain(app.users.users().into_iter().filter(|u| u.username == ADMIN.0))
        .map(|u| u.id)
        .collect();
    for id in ids {
        let (status, _) = send(
            &app,
            json_request("DELETE", &format!("/api/users/{}", id), Some(ADMIN), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert!(app.users.users().is_empty());

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/login", None, json!({ "username": ADMIN.0, "password": ADMIN.1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["role"], "ADMIN");
    assert_eq!(app.users.users().len(), 1);

    // staff accounts are not resurrected
    let (status, _) = send(&app, get("/api/auth/me", Some(STAFF))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
