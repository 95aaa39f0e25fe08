/// Note endpoints
///
/// # Endpoints
///
/// - `GET /v1/notes?issue_id=` - Notes on issues of the caller's projects
/// - `POST /v1/notes` - Comment on an issue of a project the caller belongs to
/// - `GET /v1/notes/:id` - Retrieve (project members only)
/// - `PUT /v1/notes/:id` - Replace the text (note author only)
/// - `PATCH /v1/notes/:id` - Partial update; an empty body changes nothing (note author only)
/// - `DELETE /v1/notes/:id` - Delete (note author only)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::check_request,
};
use axum::{extract::State, http::StatusCode, Extension};
use serde::{Deserialize, Serialize};
use softdesk_shared::{
    auth::{
        authorization::{authorize_object, Action, Parent, Policy, TargetFacts},
        middleware::AuthContext,
    },
    models::note::{CreateNote, Note},
    visibility::{resolve_note_scope, ParentFilter},
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const POLICIES: &[Policy] = &[Policy::MemberViaIssueOnly, Policy::AuthorOrReadOnly];

/// `?issue_id=` list filter
#[derive(Debug, Default, Deserialize)]
pub struct IssueFilter {
    pub issue_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub issue_id: Option<Uuid>,
}

/// PUT body; the text is the only mutable field
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNoteRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PatchNoteRequest {
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteList {
    pub notes: Vec<Note>,
}

/// List notes
///
/// Without `issue_id` the caller needs at least one membership. With it, the
/// issue must belong to one of the caller's projects (403 otherwise).
pub async fn list_notes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<IssueFilter>,
) -> ApiResult<Json<NoteList>> {
    let parent = ParentFilter::parse(filter.issue_id.as_deref());
    check_request(&state, &auth, Action::List, Parent::Issue(parent), POLICIES).await?;

    let scope = resolve_note_scope(&state.db, auth.account_id, &parent).await?;
    let notes = Note::list_in_scope(&state.db, &scope).await?;

    Ok(Json(NoteList { notes }))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    let parent = Parent::Issue(ParentFilter::from_id(req.issue_id));
    check_request(&state, &auth, Action::Create, parent, POLICIES).await?;

    let issue_id = req.issue_id.ok_or_else(|| {
        ApiError::Forbidden("You must be a contributor of the issue's project".to_string())
    })?;

    req.validate()?;

    let note = Note::create(
        &state.db,
        CreateNote {
            description: req.description,
            author_id: auth.account_id,
            issue_id,
        },
    )
    .await?;

    info!(
        note_id = %note.id,
        correlation_id = %note.correlation_id,
        issue_id = %issue_id,
        author_id = %auth.account_id,
        "Note created"
    );

    Ok((StatusCode::CREATED, Json(note)))
}

async fn load_authorized(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    action: Action,
) -> ApiResult<Note> {
    let ctx = check_request(state, auth, action, Parent::None, POLICIES).await?;

    let note = Note::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    let facts = TargetFacts::for_note(&state.db, auth.account_id, &note).await?;
    authorize_object(POLICIES, &ctx, &facts)?;

    Ok(note)
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Note>> {
    let note = load_authorized(&state, &auth, id, Action::Retrieve).await?;
    Ok(Json(note))
}

async fn edit_note(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    description: &str,
) -> ApiResult<Note> {
    let note = Note::update_description(&state.db, id, description)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note not found".to_string()))?;

    info!(note_id = %id, account_id = %auth.account_id, "Note updated");
    Ok(note)
}

pub async fn replace_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<Note>> {
    load_authorized(&state, &auth, id, Action::Update).await?;
    req.validate()?;

    Ok(Json(edit_note(&state, &auth, id, &req.description).await?))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchNoteRequest>,
) -> ApiResult<Json<Note>> {
    let note = load_authorized(&state, &auth, id, Action::Update).await?;
    req.validate()?;

    match req.description {
        Some(description) => Ok(Json(edit_note(&state, &auth, id, &description).await?)),
        None => Ok(Json(note)),
    }
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    load_authorized(&state, &auth, id, Action::Delete).await?;

    if !Note::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Note not found".to_string()));
    }

    info!(note_id = %id, account_id = %auth.account_id, "Note deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_ignores_parent_and_correlation_id() {
        let req: UpdateNoteRequest = serde_json::from_value(serde_json::json!({
            "description": "Edited",
            "issue_id": Uuid::new_v4(),
            "correlation_id": Uuid::new_v4()
        }))
        .unwrap();

        assert_eq!(req.description, "Edited");
    }

    #[test]
    fn test_patch_without_description_is_accepted() {
        let req: PatchNoteRequest = serde_json::from_value(serde_json::json!({})).unwrap();

        assert!(req.description.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_patch_with_empty_description_fails_validation() {
        let req = PatchNoteRequest {
            description: Some(String::new()),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_description_fails_validation() {
        let req = CreateNoteRequest {
            description: String::new(),
            issue_id: Some(Uuid::new_v4()),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_blank_issue_filter_is_missing() {
        let filter = IssueFilter {
            issue_id: Some("  ".to_string()),
        };
        assert!(ParentFilter::parse(filter.issue_id.as_deref()).is_missing());
    }
}
