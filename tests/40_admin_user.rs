mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::{json, Value};

fn new_user(app: &TestApp, username: &str) -> Value {
    json!({
        "username": username,
        "firstName": "Jane",
        "lastName": "Doe",
        "email": format!("{}@mail.com", username),
        "mobileNumber": "08123456789",
        "role": app.seeded.user_role,
        "password": "Jane@@123456",
    })
}

#[tokio::test]
async fn list_is_paginated() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("superadmin").await?;

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?per_page=2&page=1", Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.data().as_array().map(Vec::len), Some(2));

    let meta = &res.body["_pagination"];
    assert_eq!(meta["totalData"], 3);
    assert_eq!(meta["totalPage"], 2);
    assert_eq!(meta["currentPage"], 1);
    assert_eq!(meta["perPage"], 2);
    assert!(meta["availableSearch"].as_array().is_some_and(|a| !a.is_empty()));

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?per_page=2&page=2", Some(&token), None)
        .await?;
    assert_eq!(res.data().as_array().map(Vec::len), Some(1));

    // No password hash on the wire.
    assert!(res.data()[0].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn list_search_sort_and_filter() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?search=ADMIN&sort=username@asc", Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let names: Vec<&str> = res
        .data()
        .as_array()
        .map(|a| a.iter().filter_map(|u| u["username"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["admin", "superadmin"]);

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?is_active=false", Some(&token), None)
        .await?;
    assert_eq!(res.body["_pagination"]["totalData"], 0);

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?is_active=maybe", Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?page=0", Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .call(Method::GET, "/api/v1/admin/user/list?page=184467440737095518&per_page=100", Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "REQUEST_QUERY_INVALID");
    Ok(())
}

#[tokio::test]
async fn plain_user_is_refused() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("user").await?;

    let res = app.call(Method::GET, "/api/v1/admin/user/list", Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "AUTH_ACCESS_FOR_INVALID");
    Ok(())
}

#[tokio::test]
async fn admin_needs_every_permission_code() -> Result<()> {
    let app = TestApp::new().await?;
    let read = app
        .state
        .permissions
        .find_one_by_code("USER_READ")
        .await?
        .map(|p| p.meta.id)
        .expect("seeded permission");
    let reader_role = app
        .state
        .roles
        .create("reader", None, ack_api_rust::database::models::AccessFor::Admin, vec![read])
        .await?;

    let token = app.access_token("superadmin").await?;
    let mut body = new_user(&app, "reader");
    body["role"] = json!(reader_role.meta.id);
    let res = app.call(Method::POST, "/api/v1/admin/user/create", Some(&token), Some(body)).await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);

    let res = app
        .call(
            Method::POST,
            "/api/v1/user/login",
            None,
            Some(json!({ "username": "reader", "password": "Jane@@123456" })),
        )
        .await?;
    let reader = res.data()["accessToken"].as_str().unwrap_or_default().to_string();

    let res = app.call(Method::GET, "/api/v1/admin/user/list", Some(&reader), None).await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .call(Method::POST, "/api/v1/admin/user/create", Some(&reader), Some(new_user(&app, "other")))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.code(), "AUTH_PERMISSION_INVALID");
    Ok(())
}

#[tokio::test]
async fn create_get_update_and_delete() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;

    let res = app
        .call(Method::POST, "/api/v1/admin/user/create", Some(&token), Some(new_user(&app, "Jane.Doe")))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let id = res.data()["_id"].as_str().unwrap_or_default().to_string();

    let res = app.call(Method::GET, &format!("/api/v1/admin/user/get/{}", id), Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["username"], "jane.doe");
    assert_eq!(res.data()["role"]["name"], "user");

    let res = app
        .call(
            Method::PUT,
            &format!("/api/v1/admin/user/update/{}", id),
            Some(&token),
            Some(json!({ "firstName": "Janet", "lastName": "Smith" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.call(Method::GET, &format!("/api/v1/admin/user/get/{}", id), Some(&token), None).await?;
    assert_eq!(res.data()["firstName"], "Janet");

    let res = app.call(Method::DELETE, &format!("/api/v1/admin/user/delete/{}", id), Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::OK);
    let res = app.call(Method::GET, &format!("/api/v1/admin/user/get/{}", id), Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.code(), "USER_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn create_rejects_duplicates_and_unknown_role() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;
    let uri = "/api/v1/admin/user/create";

    let mut body = new_user(&app, "fresh");
    body["username"] = json!("Admin");
    let res = app.call(Method::POST, uri, Some(&token), Some(body)).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.code(), "USER_USERNAME_EXIST");

    let mut body = new_user(&app, "fresh");
    body["email"] = json!("ADMIN@mail.com");
    let res = app.call(Method::POST, uri, Some(&token), Some(body)).await?;
    assert_eq!(res.code(), "USER_EMAIL_EXIST");

    let mut body = new_user(&app, "fresh");
    body["role"] = json!(uuid::Uuid::new_v4());
    let res = app.call(Method::POST, uri, Some(&token), Some(body)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.code(), "ROLE_NOT_FOUND");

    let mut body = new_user(&app, "fresh");
    body["password"] = json!("short");
    let res = app.call(Method::POST, uri, Some(&token), Some(body)).await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn active_toggles_refuse_no_ops() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;
    let id = app
        .state
        .users
        .find_one_by_username("user")
        .await?
        .map(|u| u.meta.id)
        .expect("seeded user");

    let active = format!("/api/v1/admin/user/update/{}/active", id);
    let inactive = format!("/api/v1/admin/user/update/{}/inactive", id);

    let res = app.call(Method::PATCH, &active, Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "USER_ACTIVE");

    assert_eq!(app.call(Method::PATCH, &inactive, Some(&token), None).await?.status, StatusCode::OK);
    let res = app.call(Method::PATCH, &inactive, Some(&token), None).await?;
    assert_eq!(res.code(), "USER_INACTIVE");

    assert_eq!(app.call(Method::PATCH, &active, Some(&token), None).await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn malformed_id_is_bad_request() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;
    let res = app.call(Method::GET, "/api/v1/admin/user/get/not-a-uuid", Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "REQUEST_ID_INVALID");
    Ok(())
}

#[tokio::test]
async fn export_returns_every_user() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("superadmin").await?;
    let res = app.call(Method::POST, "/api/v1/admin/user/export", Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.data().as_array().map(Vec::len), Some(3));
    assert!(res.body.get("_pagination").is_none());
    Ok(())
}
