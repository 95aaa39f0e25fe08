/// Membership endpoints
///
/// # Endpoints
///
/// - `GET /v1/memberships?project_id=` - Memberships of the caller's projects
/// - `POST /v1/memberships` - Add an account to a project (project author only)
/// - `GET /v1/memberships/:id` - Retrieve (project members only)
/// - `PUT|PATCH /v1/memberships/:id` - Change the role (project author only)
/// - `DELETE /v1/memberships/:id` - Remove a contributor (project author only)
///
/// The `Author` role is reserved for the membership written at project
/// creation. It cannot be granted, changed or removed here.

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
        account::Account,
        membership::{CreateMembership, Membership, MembershipRole},
    },
    visibility::{resolve_project_scope, ParentFilter},
};
use tracing::info;
use uuid::Uuid;

const POLICIES: &[Policy] = &[Policy::ProjectAuthorOnly];

#[derive(Debug, Deserialize)]
pub struct CreateMembershipRequest {
    pub account_id: Uuid,

    /// Optional so a missing project is a permission denial, not a parse error
    pub project_id: Option<Uuid>,

    #[serde(default)]
    pub role: MembershipRole,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceMembershipRequest {
    pub role: MembershipRole,
}

#[derive(Debug, Deserialize)]
pub struct PatchMembershipRequest {
    pub role: Option<MembershipRole>,
}

#[derive(Debug, Serialize)]
pub struct MembershipList {
    pub memberships: Vec<Membership>,
}

fn check_assignable(role: MembershipRole) -> ApiResult<()> {
    if role.is_assignable() {
        Ok(())
    } else {
        Err(ApiError::invalid_field(
            "role",
            "The Author role is given only to the project's creator",
        ))
    }
}

pub async fn list_memberships(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Json<MembershipList>> {
    check_request(&state, &auth, Action::List, Parent::None, POLICIES).await?;

    let scope = resolve_project_scope(&state.db, auth.account_id, &filter.parent()).await?;
    let memberships = Membership::list_in_scope(&state.db, &scope).await?;

    Ok(Json(MembershipList { memberships }))
}

/// Add an account to a project
///
/// # Errors
///
/// - `403 Forbidden`: project missing, unknown, or not authored by the caller
/// - `422 Unprocessable Entity`: role `Author`, unknown account, or the
///   account is already a member
/// - `409 Conflict`: a concurrent request added the same account first
pub async fn create_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMembershipRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    let parent = Parent::Project(ParentFilter::from_id(req.project_id));
    check_request(&state, &auth, Action::Create, parent, POLICIES).await?;

    // The coarse check only passes for a resolved project
    let project_id = req
        .project_id
        .ok_or_else(|| ApiError::Forbidden("Only the project author can do this".to_string()))?;

    check_assignable(req.role)?;

    if !Account::exists(&state.db, req.account_id).await? {
        return Err(ApiError::invalid_field("account_id", "Account not found"));
    }

    if Membership::has_access(&state.db, project_id, req.account_id).await? {
        return Err(ApiError::invalid_field(
            "account_id",
            "This account is already a contributor of the project",
        ));
    }

    let membership = Membership::create(
        &state.db,
        CreateMembership {
            account_id: req.account_id,
            project_id,
            role: req.role,
        },
    )
    .await?;

    info!(
        membership_id = %membership.id,
        project_id = %project_id,
        account_id = %membership.account_id,
        "Contributor added"
    );

    Ok((StatusCode::CREATED, Json(membership)))
}

async fn load_authorized(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    action: Action,
) -> ApiResult<Membership> {
    let ctx = check_request(state, auth, action, Parent::None, POLICIES).await?;

    let membership = Membership::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    let facts = TargetFacts::for_membership(&state.db, auth.account_id, &membership).await?;
    authorize_object(POLICIES, &ctx, &facts)?;

    Ok(membership)
}

pub async fn get_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Membership>> {
    let membership = load_authorized(&state, &auth, id, Action::Retrieve).await?;
    Ok(Json(membership))
}

async fn change_role(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    role: Option<MembershipRole>,
) -> ApiResult<Membership> {
    let membership = load_authorized(state, auth, id, Action::Update).await?;

    let Some(role) = role else {
        return Ok(membership);
    };

    check_assignable(role)?;

    if membership.role == MembershipRole::Author {
        return Err(ApiError::invalid_field(
            "role",
            "The project author's role cannot be changed",
        ));
    }

    let updated = Membership::update_role(&state.db, id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    info!(membership_id = %id, role = role.as_str(), "Membership role changed");
    Ok(updated)
}

pub async fn replace_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplaceMembershipRequest>,
) -> ApiResult<Json<Membership>> {
    Ok(Json(change_role(&state, &auth, id, Some(req.role)).await?))
}

pub async fn update_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchMembershipRequest>,
) -> ApiResult<Json<Membership>> {
    Ok(Json(change_role(&state, &auth, id, req.role).await?))
}

/// Remove a contributor
///
/// # Errors
///
/// - `403 Forbidden`: caller is not the project author, or the target is
///   the author's own membership
pub async fn delete_membership(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let membership = load_authorized(&state, &auth, id, Action::Delete).await?;

    if membership.role == MembershipRole::Author {
        return Err(ApiError::Forbidden(
            "The project author's membership cannot be removed".to_string(),
        ));
    }

    if !Membership::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Membership not found".to_string()));
    }

    info!(membership_id = %id, project_id = %membership.project_id, "Contributor removed");
    Ok(StatusCode::NO_CONTENT)
}
