/// Project endpoints
///
/// # Endpoints
///
/// - `GET /v1/projects` - Projects the caller is a member of
/// - `POST /v1/projects` - Create a project; the caller becomes its author
/// - `GET /v1/projects/:id` - Retrieve (members only)
/// - `PUT /v1/projects/:id` - Replace (author only)
/// - `PATCH /v1/projects/:id` - Partial update (author only)
/// - `DELETE /v1/projects/:id` - Delete with all memberships, issues and notes (author only)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    routes::check_request,
};
use axum::{extract::State, http::StatusCode, Extension};
use serde::{Deserialize, Serialize};
use softdesk_shared::{
    auth::{
        authorization::{authorize_object, Action, Parent, Policy, TargetFacts},
        middleware::AuthContext,
    },
    models::{
        membership::Membership,
        project::{CreateProject, Project, ProjectType, UpdateProject},
    },
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const POLICIES: &[Policy] = &[Policy::AuthorOrReadOnly];

/// Create or replace request
#[derive(Debug, Deserialize, Validate)]
pub struct ProjectRequest {
    #[validate(length(min = 1, max = 128, message = "Title must be 1-128 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

/// Partial update request
#[derive(Debug, Deserialize, Validate)]
pub struct PatchProjectRequest {
    #[validate(length(min = 1, max = 128, message = "Title must be 1-128 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub project_type: Option<ProjectType>,
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct CreatedProject {
    #[serde(flatten)]
    pub project: Project,

    /// The author membership written together with the project
    pub author_membership: Membership,
}

impl From<ProjectRequest> for UpdateProject {
    fn from(req: ProjectRequest) -> Self {
        UpdateProject {
            title: Some(req.title),
            description: Some(req.description),
            project_type: Some(req.project_type),
        }
    }
}

impl From<PatchProjectRequest> for UpdateProject {
    fn from(req: PatchProjectRequest) -> Self {
        UpdateProject {
            title: req.title,
            description: req.description,
            project_type: req.project_type,
        }
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ProjectList>> {
    check_request(&state, &auth, Action::List, Parent::None, POLICIES).await?;

    let projects = Project::list_for_member(&state.db, auth.account_id).await?;
    Ok(Json(ProjectList { projects }))
}

/// Create a project
///
/// The project and the caller's `Author` membership are written in one
/// transaction.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<(StatusCode, Json<CreatedProject>)> {
    check_request(&state, &auth, Action::Create, Parent::None, POLICIES).await?;
    req.validate()?;

    let (project, author_membership) = Project::create_with_author(
        &state.db,
        CreateProject {
            title: req.title,
            description: req.description,
            project_type: req.project_type,
            author_id: auth.account_id,
        },
    )
    .await?;

    info!(
        project_id = %project.id,
        author_id = %auth.account_id,
        project_type = project.project_type.as_str(),
        "Project created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedProject {
            project,
            author_membership,
        }),
    ))
}

/// Loads a project and runs both policy stages against it
async fn load_authorized(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    action: Action,
) -> ApiResult<Project> {
    let ctx = check_request(state, auth, action, Parent::None, POLICIES).await?;

    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    let facts = TargetFacts::for_project(&state.db, auth.account_id, &project).await?;
    authorize_object(POLICIES, &ctx, &facts)?;

    Ok(project)
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    let project = load_authorized(&state, &auth, id, Action::Retrieve).await?;
    Ok(Json(project))
}

async fn apply_update(state: &AppState, auth: &AuthContext, id: Uuid, update: UpdateProject) -> ApiResult<Project> {
    let project = Project::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    info!(project_id = %project.id, account_id = %auth.account_id, "Project updated");
    Ok(project)
}

pub async fn replace_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    load_authorized(&state, &auth, id, Action::Update).await?;
    req.validate()?;

    Ok(Json(apply_update(&state, &auth, id, req.into()).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchProjectRequest>,
) -> ApiResult<Json<Project>> {
    load_authorized(&state, &auth, id, Action::Update).await?;
    req.validate()?;

    Ok(Json(apply_update(&state, &auth, id, req.into()).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_authorized(&state, &auth, id, Action::Delete).await?;

    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }

    info!(project_id = %id, account_id = %auth.account_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_request_uses_type_field() {
        let req: ProjectRequest = serde_json::from_value(serde_json::json!({
            "title": "Alpha",
            "description": "First project",
            "type": "BACK_END"
        }))
        .unwrap();

        assert_eq!(req.project_type, ProjectType::BackEnd);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_title_length_limit() {
        let req = ProjectRequest {
            title: "x".repeat(129),
            description: "d".to_string(),
            project_type: ProjectType::Ios,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_patch_converts_to_partial_update() {
        let req: PatchProjectRequest =
            serde_json::from_value(serde_json::json!({ "title": "Renamed" })).unwrap();
        let update: UpdateProject = req.into();

        assert_eq!(update.title.as_deref(), Some("Renamed"));
        assert!(update.description.is_none());
        assert!(update.project_type.is_none());
    }

    #[test]
    fn test_replace_sets_every_field() {
        let update: UpdateProject = ProjectRequest {
            title: "Alpha".to_string(),
            description: "d".to_string(),
            project_type: ProjectType::Android,
        }
        .into();

        assert!(update.title.is_some());
        assert!(update.description.is_some());
        assert_eq!(update.project_type, Some(ProjectType::Android));
    }
}
