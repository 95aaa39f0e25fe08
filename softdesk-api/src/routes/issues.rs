/// Issue endpoints
///
/// # Endpoints
///
/// - `GET /v1/issues?project_id=` - Issues of the caller's projects
/// - `POST /v1/issues` - Create an issue in a project the caller belongs to
/// - `GET /v1/issues/:id` - Retrieve (project members only)
/// - `PUT /v1/issues/:id` - Replace (issue author only)
/// - `PATCH /v1/issues/:id` - Partial update (issue author only)
/// - `DELETE /v1/issues/:id` - Delete with its notes (issue author only)
///
/// The assignee must be a member of the issue's project after every create
/// and update, including updates that leave the assignee unchanged.
/// An issue never moves between projects.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::{check_request, ProjectFilter},
};
use axum::{extract::State, http::StatusCode, Extension};
use serde::{Deserialize, Serialize};
use softdesk_shared::{
    auth::{
        authorization::{authorize_object, Action, Parent, Policy, TargetFacts},
        middleware::AuthContext,
    },
    models::{
        issue::{CreateIssue, Issue, IssuePriority, IssueStatus, IssueTag, UpdateIssue},
        membership::Membership,
    },
    visibility::{resolve_project_scope, ParentFilter},
};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

const POLICIES: &[Policy] = &[Policy::MemberOnly, Policy::AuthorOrReadOnly];

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIssueRequest {
    #[validate(length(min = 1, max = 128, message = "Title must be 1-128 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub tag: IssueTag,

    pub priority: IssuePriority,

    #[serde(default)]
    pub status: IssueStatus,

    pub project_id: Option<Uuid>,

    pub assignee_id: Option<Uuid>,
}

/// Full replacement; `project_id` is not accepted here
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceIssueRequest {
    #[validate(length(min = 1, max = 128, message = "Title must be 1-128 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub tag: IssueTag,

    pub priority: IssuePriority,

    pub status: IssueStatus,

    pub assignee_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PatchIssueRequest {
    #[validate(length(min = 1, max = 128, message = "Title must be 1-128 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,

    pub tag: Option<IssueTag>,

    pub priority: Option<IssuePriority>,

    pub status: Option<IssueStatus>,

    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct IssueList {
    pub issues: Vec<Issue>,
}

impl From<ReplaceIssueRequest> for UpdateIssue {
    fn from(req: ReplaceIssueRequest) -> Self {
        UpdateIssue {
            title: Some(req.title),
            description: Some(req.description),
            tag: Some(req.tag),
            priority: Some(req.priority),
            status: Some(req.status),
            assignee_id: Some(req.assignee_id),
        }
    }
}

impl From<PatchIssueRequest> for UpdateIssue {
    fn from(req: PatchIssueRequest) -> Self {
        UpdateIssue {
            title: req.title,
            description: req.description,
            tag: req.tag,
            priority: req.priority,
            status: req.status,
            assignee_id: req.assignee_id,
        }
    }
}

/// Rejects an assignee who is not a member of `project_id`
async fn check_assignee(pool: &PgPool, project_id: Uuid, assignee_id: Uuid) -> ApiResult<()> {
    if Membership::has_access(pool, project_id, assignee_id).await? {
        return Ok(());
    }

    debug!(%project_id, %assignee_id, "Assignee is not a project member");
    Err(ApiError::invalid_field(
        "assignee_id",
        "The assignee must be a contributor of the project",
    ))
}

/// Assignee the issue will have once `update` is applied
fn assignee_after(current: Uuid, update: &UpdateIssue) -> Uuid {
    update.assignee_id.unwrap_or(current)
}

pub async fn list_issues(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Json<IssueList>> {
    check_request(&state, &auth, Action::List, Parent::None, POLICIES).await?;

    let scope = resolve_project_scope(&state.db, auth.account_id, &filter.parent()).await?;
    let issues = Issue::list_in_scope(&state.db, &scope).await?;

    Ok(Json(IssueList { issues }))
}

/// Create an issue
///
/// The author is always the caller.
///
/// # Errors
///
/// - `403 Forbidden`: project missing, unknown, or the caller is not a member
/// - `422 Unprocessable Entity`: invalid fields, missing assignee, or an
///   assignee outside the project
pub async fn create_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateIssueRequest>,
) -> ApiResult<(StatusCode, Json<Issue>)> {
    let parent = Parent::Project(ParentFilter::from_id(req.project_id));
    check_request(&state, &auth, Action::Create, parent, POLICIES).await?;

    let project_id = req.project_id.ok_or_else(|| {
        ApiError::Forbidden("You must be a contributor of the project".to_string())
    })?;

    req.validate()?;

    let assignee_id = req
        .assignee_id
        .ok_or_else(|| ApiError::invalid_field("assignee_id", "An assignee is required"))?;
    check_assignee(&state.db, project_id, assignee_id).await?;

    let issue = Issue::create(
        &state.db,
        CreateIssue {
            title: req.title,
            description: req.description,
            tag: req.tag,
            priority: req.priority,
            status: req.status,
            project_id,
            author_id: auth.account_id,
            assignee_id,
        },
    )
    .await?;

    info!(issue_id = %issue.id, project_id = %project_id, author_id = %auth.account_id, "Issue created");

    Ok((StatusCode::CREATED, Json(issue)))
}

async fn load_authorized(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    action: Action,
) -> ApiResult<Issue> {
    let ctx = check_request(state, auth, action, Parent::None, POLICIES).await?;

    let issue = Issue::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".to_string()))?;

    let facts = TargetFacts::for_issue(&state.db, auth.account_id, &issue).await?;
    authorize_object(POLICIES, &ctx, &facts)?;

    Ok(issue)
}

pub async fn get_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Issue>> {
    let issue = load_authorized(&state, &auth, id, Action::Retrieve).await?;
    Ok(Json(issue))
}

async fn apply_update(
    state: &AppState,
    auth: &AuthContext,
    issue: &Issue,
    update: UpdateIssue,
) -> ApiResult<Issue> {
    check_assignee(&state.db, issue.project_id, assignee_after(issue.assignee_id, &update)).await?;

    let updated = Issue::update(&state.db, issue.id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Issue not found".to_string()))?;

    info!(issue_id = %updated.id, account_id = %auth.account_id, "Issue updated");
    Ok(updated)
}

pub async fn replace_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplaceIssueRequest>,
) -> ApiResult<Json<Issue>> {
    let issue = load_authorized(&state, &auth, id, Action::Update).await?;
    req.validate()?;

    Ok(Json(apply_update(&state, &auth, &issue, req.into()).await?))
}

pub async fn update_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchIssueRequest>,
) -> ApiResult<Json<Issue>> {
    let issue = load_authorized(&state, &auth, id, Action::Update).await?;
    req.validate()?;

    Ok(Json(apply_update(&state, &auth, &issue, req.into()).await?))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_authorized(&state, &auth, id, Action::Delete).await?;

    if !Issue::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Issue not found".to_string()));
    }

    info!(issue_id = %id, account_id = %auth.account_id, "Issue deleted");
    Ok(StatusCode::NO_CONTENT)
}
