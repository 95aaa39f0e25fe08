/// Integration tests for the SoftDesk API
///
/// These tests drive the full router against PostgreSQL:
/// - Registration, login and token refresh
/// - Project creation with its author membership
/// - Membership management and the reserved Author role
/// - Issue assignment rules
/// - Note authorship and correlation ids
/// - List narrowing along the membership chain
///
/// Every test here is ignored by default so the suite passes without a
/// database. Run with `cargo test -- --ignored` and `DATABASE_URL` set.

mod common;

use axum::http::{Method, StatusCode};
use common::{send, TestContext};
use serde_json::{json, Value};
use uuid::Uuid;

fn ids(body: &Value, key: &str) -> Vec<String> {
    body[key]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

fn issue_payload(project_id: Uuid, assignee_id: Uuid) -> Value {
    json!({
        "title": "Login fails",
        "description": "The login form answers 500",
        "tag": "BUG",
        "priority": "HIGH",
        "project_id": project_id,
        "assignee_id": assignee_id
    })
}

#[tokio::test]
#[ignore]
async fn test_register_login_refresh() {
    let ctx = TestContext::new().await.unwrap();
    let username = format!("reg_{}", &Uuid::new_v4().simple().to_string()[..12]);

    let (status, body) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@Example.com", username),
            "password": "correct horse battery",
            "password_confirmation": "correct horse battery",
            "age": 15,
            "can_be_contacted": true
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let account = &body["account"];
    assert_eq!(account["username"], username.as_str());
    assert_eq!(account["can_be_contacted"], true);
    assert_eq!(account["can_data_be_shared"], false);
    assert!(account.get("password_confirmation").is_none());
    assert!(account.get("password_hash").is_none());
    assert!(account.get("password").is_none());

    // Same email in another case
    let (status, body) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "username": format!("{}x", username),
            "email": format!("{}@EXAMPLE.COM", username.to_uppercase()),
            "password": "correct horse battery",
            "password_confirmation": "correct horse battery",
            "age": 40
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "email");

    let (status, body) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": "wrong password here" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", body);

    let (status, tokens) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "username": username, "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", tokens);
    assert_eq!(tokens["token_type"], "Bearer");

    let access = tokens["access_token"].as_str().unwrap();
    let account_id = tokens["account"]["id"].as_str().unwrap();
    let (status, me) = send(
        &ctx.app,
        Method::GET,
        &format!("/v1/accounts/{}", account_id),
        Some(access),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], username.as_str());
    assert!(me["last_login_at"].is_string());

    let (status, refreshed) = send(
        &ctx.app,
        Method::POST,
        "/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": tokens["refresh_token"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", refreshed);
    assert!(refreshed["access_token"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_project_creation_and_visibility() {
    let ctx = TestContext::new().await.unwrap();
    let b = ctx.account("b").await.unwrap();
    let c = ctx.account("c").await.unwrap();
    let d = ctx.account("d").await.unwrap();

    let (status, created) = ctx
        .post(
            "/v1/projects",
            &b,
            json!({ "title": "Alpha", "description": "First project", "type": "BACK_END" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["type"], "BACK_END");
    assert_eq!(created["author_id"], b.id().to_string());
    assert_eq!(created["author_membership"]["role"], "Author");
    assert_eq!(created["author_membership"]["account_id"], b.id().to_string());
    let alpha = created["id"].as_str().unwrap().to_string();

    let (_, memberships) = ctx
        .get(&format!("/v1/memberships?project_id={}", alpha), &b)
        .await;
    let memberships = memberships["memberships"].as_array().unwrap().clone();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0]["role"], "Author");

    // C holds no membership on Alpha
    let (status, listed) = ctx.get("/v1/projects", &c).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!ids(&listed, "projects").contains(&alpha));

    let (status, _) = ctx.get(&format!("/v1/projects/{}", alpha), &c).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A contributor reads but cannot change the project
    ctx.add_contributor(&b, alpha.parse().unwrap(), &d).await.unwrap();

    let (status, _) = ctx.get(&format!("/v1/projects/{}", alpha), &d).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx
        .patch(&format!("/v1/projects/{}", alpha), &d, json!({ "title": "Hijacked" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = ctx.delete(&format!("/v1/projects/{}", alpha), &d).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = ctx
        .put(
            &format!("/v1/projects/{}", alpha),
            &b,
            json!({ "title": "Alpha 2", "description": "Renamed", "type": "IOS" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Alpha 2");
    assert_eq!(updated["type"], "IOS");

    let (status, _) = ctx.delete(&format!("/v1/projects/{}", alpha), &b).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.get(&format!("/v1/projects/{}", alpha), &b).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_membership_rules() {
    let ctx = TestContext::new().await.unwrap();
    let b = ctx.account("b").await.unwrap();
    let d = ctx.account("d").await.unwrap();
    let e = ctx.account("e").await.unwrap();
    let alpha = ctx.project(&b, "Alpha").await.unwrap();

    // Missing or foreign project
    let (status, _) = ctx
        .post("/v1/memberships", &b, json!({ "account_id": d.id() }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .post(
            "/v1/memberships",
            &e,
            json!({ "account_id": e.id(), "project_id": alpha }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .post(
            "/v1/memberships",
            &b,
            json!({ "account_id": d.id(), "project_id": alpha, "role": "Author" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "role");

    let (status, body) = ctx
        .post(
            "/v1/memberships",
            &b,
            json!({ "account_id": Uuid::new_v4(), "project_id": alpha }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "account_id");

    let membership = ctx.add_contributor(&b, alpha, &d).await.unwrap();

    let (status, body) = ctx
        .post(
            "/v1/memberships",
            &b,
            json!({ "account_id": d.id(), "project_id": alpha }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "account_id");

    // The Author membership stays put
    let (_, listed) = ctx
        .get(&format!("/v1/memberships?project_id={}", alpha), &b)
        .await;
    let author_membership = listed["memberships"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["role"] == "Author")
        .map(|m| m["id"].as_str().unwrap().to_string())
        .unwrap();

    let (status, _) = ctx
        .patch(
            &format!("/v1/memberships/{}", author_membership),
            &b,
            json!({ "role": "Contributor" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx
        .delete(&format!("/v1/memberships/{}", author_membership), &b)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Only the project author removes contributors
    let (status, _) = ctx.delete(&format!("/v1/memberships/{}", membership), &d).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.delete(&format!("/v1/memberships/{}", membership), &b).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.get(&format!("/v1/projects/{}", alpha), &d).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn test_issue_assignment_and_scoping() {
    let ctx = TestContext::new().await.unwrap();
    let b = ctx.account("b").await.unwrap();
    let c = ctx.account("c").await.unwrap();
    let d = ctx.account("d").await.unwrap();
    let e = ctx.account("e").await.unwrap();

    let alpha = ctx.project(&b, "Alpha").await.unwrap();
    ctx.add_contributor(&b, alpha, &d).await.unwrap();

    let (status, issue) = ctx.post("/v1/issues", &b, issue_payload(alpha, d.id())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", issue);
    assert_eq!(issue["author_id"], b.id().to_string());
    assert_eq!(issue["assignee_id"], d.id().to_string());
    assert_eq!(issue["status"], "TO_DO");
    let issue_id = issue["id"].as_str().unwrap().to_string();

    let (status, body) = ctx.post("/v1/issues", &b, issue_payload(alpha, e.id())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "assignee_id");

    let (status, _) = ctx.post("/v1/issues", &e, issue_payload(alpha, e.id())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .post("/v1/issues", &b, issue_payload(Uuid::new_v4(), d.id()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reassigning follows the same rule
    let (status, body) = ctx
        .patch(&format!("/v1/issues/{}", issue_id), &b, json!({ "assignee_id": e.id() }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "assignee_id");

    let (status, body) = ctx
        .patch(
            &format!("/v1/issues/{}", issue_id),
            &b,
            json!({ "status": "IN_PROGRESS", "project_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_PROGRESS");
    assert_eq!(body["project_id"], alpha.to_string());
    assert_eq!(body["title"], "Login fails");

    // D may read but not edit B's issue
    let (status, _) = ctx
        .patch(&format!("/v1/issues/{}", issue_id), &d, json!({ "status": "FINISHED" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // C only sees their own project's issues
    let beta = ctx.project(&c, "Beta").await.unwrap();
    let (status, listed) = ctx
        .get(&format!("/v1/issues?project_id={}", alpha), &c)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed["issues"].as_array().unwrap().is_empty());

    let (status, listed) = ctx
        .get(&format!("/v1/memberships?project_id={}", alpha), &c)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed["memberships"].as_array().unwrap().is_empty());

    let (status, listed) = ctx.get("/v1/issues?project_id=garbage", &c).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed["issues"].as_array().unwrap().is_empty());

    let (_, listed) = ctx.get(&format!("/v1/memberships?project_id={}", beta), &c).await;
    assert_eq!(listed["memberships"].as_array().unwrap().len(), 1);

    // E holds no membership at all
    let (status, _) = ctx.get("/v1/issues", &e).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listed) = ctx.get("/v1/issues", &d).await;
    assert!(ids(&listed, "issues").contains(&issue_id));

    let (status, _) = ctx.get(&format!("/v1/issues/{}", issue_id), &c).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.delete(&format!("/v1/issues/{}", issue_id), &b).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_issue_update_requires_assignee_still_member() {
    let ctx = TestContext::new().await.unwrap();
    let b = ctx.account("b").await.unwrap();
    let d = ctx.account("d").await.unwrap();

    let alpha = ctx.project(&b, "Alpha").await.unwrap();
    let membership = ctx.add_contributor(&b, alpha, &d).await.unwrap();

    let (status, issue) = ctx.post("/v1/issues", &b, issue_payload(alpha, d.id())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", issue);
    let issue_uri = format!("/v1/issues/{}", issue["id"].as_str().unwrap());

    let (status, _) = ctx.delete(&format!("/v1/memberships/{}", membership), &b).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The stored assignee left the project, so even a status change is refused
    let (status, body) = ctx.patch(&issue_uri, &b, json!({ "status": "FINISHED" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "assignee_id");

    let (status, body) = ctx
        .patch(&issue_uri, &b, json!({ "status": "FINISHED", "assignee_id": b.id() }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["assignee_id"], b.id().to_string());
}

#[tokio::test]
#[ignore]
async fn test_note_authorship() {
    let ctx = TestContext::new().await.unwrap();
    let b = ctx.account("b").await.unwrap();
    let c = ctx.account("c").await.unwrap();
    let d = ctx.account("d").await.unwrap();

    let alpha = ctx.project(&b, "Alpha").await.unwrap();
    ctx.add_contributor(&b, alpha, &d).await.unwrap();

    let (_, issue) = ctx.post("/v1/issues", &b, issue_payload(alpha, d.id())).await;
    let issue_id = issue["id"].as_str().unwrap().to_string();

    let (status, d_note) = ctx
        .post("/v1/notes", &d, json!({ "description": "Reproduced", "issue_id": issue_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", d_note);
    assert_eq!(d_note["author_id"], d.id().to_string());
    assert!(d_note["correlation_id"].is_string());

    let (status, b_note) = ctx
        .post("/v1/notes", &b, json!({ "description": "Fix incoming", "issue_id": issue_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(b_note["correlation_id"], d_note["correlation_id"]);
    let b_note_id = b_note["id"].as_str().unwrap().to_string();

    let (status, body) = ctx.delete(&format!("/v1/notes/{}", b_note_id), &d).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, edited) = ctx
        .patch(
            &format!("/v1/notes/{}", b_note_id),
            &b,
            json!({ "description": "Fix merged", "correlation_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["description"], "Fix merged");
    assert_eq!(edited["correlation_id"], b_note["correlation_id"]);

    let (status, unchanged) = ctx.patch(&format!("/v1/notes/{}", b_note_id), &b, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unchanged["description"], "Fix merged");

    // Outsiders cannot comment or read
    let (status, _) = ctx
        .post("/v1/notes", &c, json!({ "description": "Hi", "issue_id": issue_id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.get(&format!("/v1/notes/{}", b_note_id), &c).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.get("/v1/notes", &c).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .post("/v1/notes", &d, json!({ "description": "No issue" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = ctx.get(&format!("/v1/notes?issue_id={}", issue_id), &d).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["notes"].as_array().unwrap().len(), 2);

    let (status, _) = ctx.get(&format!("/v1/notes?issue_id={}", issue_id), &c).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Deleting the issue takes its notes along
    let (status, _) = ctx.delete(&format!("/v1/issues/{}", issue_id), &b).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.get(&format!("/v1/notes/{}", b_note_id), &b).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_health_with_database() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = send(&ctx.app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}
