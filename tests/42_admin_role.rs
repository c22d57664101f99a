mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

async fn permission_id(app: &TestApp, code: &str) -> Result<Uuid> {
    Ok(app
        .state
        .permissions
        .find_one_by_code(code)
        .await?
        .map(|p| p.meta.id)
        .expect("seeded permission"))
}

#[tokio::test]
async fn list_filters_by_access_for() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;

    let res = app.call(Method::GET, "/api/v1/admin/role/list", Some(&token), None).await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["_pagination"]["totalData"], 3);

    let res = app
        .call(Method::GET, "/api/v1/admin/role/list?access_for=admin,user", Some(&token), None)
        .await?;
    assert_eq!(res.body["_pagination"]["totalData"], 2);

    let res = app
        .call(Method::GET, "/api/v1/admin/role/list?access_for=ROOT", Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "REQUEST_QUERY_INVALID");
    Ok(())
}

#[tokio::test]
async fn get_expands_permissions() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;

    let res = app
        .call(Method::GET, &format!("/api/v1/admin/role/get/{}", app.seeded.admin_role), Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let permissions = res.data()["permissions"].as_array().cloned().unwrap_or_default();
    assert!(!permissions.is_empty());
    assert!(permissions[0]["code"].is_string(), "{}", res.body);
    Ok(())
}

#[tokio::test]
async fn create_and_update_role() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;
    let read = permission_id(&app, "SETTING_READ").await?;

    let res = app
        .call(
            Method::POST,
            "/api/v1/admin/role/create",
            Some(&token),
            Some(json!({ "name": "Support", "accessFor": "ADMIN", "permissions": [read] })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let id = res.data()["_id"].as_str().unwrap_or_default().to_string();

    let res = app
        .call(
            Method::POST,
            "/api/v1/admin/role/create",
            Some(&token),
            Some(json!({ "name": "SUPPORT", "accessFor": "ADMIN" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.code(), "ROLE_EXIST");

    // Renaming to its own name is fine, to another role's name is not.
    let update = format!("/api/v1/admin/role/update/{}", id);
    let res = app
        .call(Method::PUT, &update, Some(&token), Some(json!({ "name": "support", "description": "Help desk" })))
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let res = app
        .call(Method::PUT, &update, Some(&token), Some(json!({ "name": "admin" })))
        .await?;
    assert_eq!(res.code(), "ROLE_EXIST");

    let write = permission_id(&app, "SETTING_UPDATE").await?;
    let res = app
        .call(
            Method::PUT,
            &format!("/api/v1/admin/role/update/{}/permission", id),
            Some(&token),
            Some(json!({ "accessFor": "ADMIN", "permissions": [read, write] })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    let res = app.call(Method::GET, &format!("/api/v1/admin/role/get/{}", id), Some(&token), None).await?;
    assert_eq!(res.data()["description"], "Help desk");
    assert_eq!(res.data()["permissions"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn create_rejects_super_admin_and_unknown_permissions() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("superadmin").await?;

    let res = app
        .call(
            Method::POST,
            "/api/v1/admin/role/create",
            Some(&token),
            Some(json!({ "name": "root", "accessFor": "SUPER_ADMIN" })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    let res = app
        .call(
            Method::POST,
            "/api/v1/admin/role/create",
            Some(&token),
            Some(json!({ "name": "ghost", "accessFor": "USER", "permissions": [Uuid::new_v4()] })),
        )
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.code(), "PERMISSION_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn role_in_use_cannot_be_deleted() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("admin").await?;

    let res = app
        .call(Method::DELETE, &format!("/api/v1/admin/role/delete/{}", app.seeded.user_role), Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.code(), "ROLE_USED");

    let spare = app
        .state
        .roles
        .create("spare", None, ack_api_rust::database::models::AccessFor::User, Vec::new())
        .await?;
    let res = app
        .call(Method::DELETE, &format!("/api/v1/admin/role/delete/{}", spare.meta.id), Some(&token), None)
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(app.state.roles.find_one_by_id(spare.meta.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn role_active_toggles() -> Result<()> {
    let app = TestApp::new().await?;
    let token = app.access_token("superadmin").await?;
    let inactive = format!("/api/v1/admin/role/update/{}/inactive", app.seeded.user_role);

    assert_eq!(app.call(Method::PATCH, &inactive, Some(&token), None).await?.status, StatusCode::OK);
    let res = app.call(Method::PATCH, &inactive, Some(&token), None).await?;
    assert_eq!(res.code(), "ROLE_INACTIVE");

    // Users of an inactive role are locked out.
    assert_eq!(app.login("user").await?.code(), "ROLE_INACTIVE");
    Ok(())
}
