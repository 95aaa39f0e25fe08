/// Issue model and database operations
///
/// Issues are work items tracked inside a project. Each one has an author
/// (stamped from the caller on creation) and an assignee that must hold a
/// membership on the same project.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE issues (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(128) NOT NULL,
///     description TEXT NOT NULL,
///     tag issue_tag NOT NULL,
///     priority issue_priority NOT NULL,
///     status issue_status NOT NULL DEFAULT 'TO_DO',
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     author_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     assignee_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::visibility::ProjectScope;

/// Kind of work an issue describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_tag", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueTag {
    Bug,
    Feature,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_priority", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
}

/// Progress of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "issue_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    ToDo,
    InProgress,
    Finished,
}

impl Default for IssueStatus {
    fn default() -> Self {
        IssueStatus::ToDo
    }
}

/// An issue
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub tag: IssueTag,
    pub priority: IssuePriority,
    pub status: IssueStatus,

    /// Owning project; fixed after creation
    pub project_id: Uuid,

    /// Account that created the issue
    pub author_id: Uuid,

    /// Member of `project_id` responsible for the issue
    pub assignee_id: Uuid,

    pub created_at: DateTime<Utc>,
}

/// Input for creating an issue
#[derive(Debug, Clone)]
pub struct CreateIssue {
    pub title: String,
    pub description: String,
    pub tag: IssueTag,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    pub project_id: Uuid,
    pub author_id: Uuid,
    pub assignee_id: Uuid,
}

/// Fields that may change on an existing issue
#[derive(Debug, Clone, Default)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tag: Option<IssueTag>,
    pub priority: Option<IssuePriority>,
    pub status: Option<IssueStatus>,
    pub assignee_id: Option<Uuid>,
}

const ISSUE_COLUMNS: &str = "id, title, description, tag, priority, status, project_id, \
                             author_id, assignee_id, created_at";

impl Issue {
    /// Inserts a new issue
    ///
    /// The caller is responsible for checking that `assignee_id` is a member
    /// of `project_id` beforehand.
    pub async fn create(pool: &PgPool, data: CreateIssue) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO issues (title, description, tag, priority, status, project_id, author_id, assignee_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ISSUE_COLUMNS}"
        );

        sqlx::query_as::<_, Issue>(&query)
            .bind(data.title)
            .bind(data.description)
            .bind(data.tag)
            .bind(data.priority)
            .bind(data.status)
            .bind(data.project_id)
            .bind(data.author_id)
            .bind(data.assignee_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1");

        sqlx::query_as::<_, Issue>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Resolves the project an issue belongs to
    pub async fn project_id_of(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT project_id FROM issues WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists issues inside a visibility scope, newest first
    pub async fn list_in_scope(pool: &PgPool, scope: &ProjectScope) -> Result<Vec<Self>, sqlx::Error> {
        let project_ids = match scope {
            ProjectScope::Empty => return Ok(Vec::new()),
            ProjectScope::Projects(ids) => ids,
        };

        let query = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues \
             WHERE project_id = ANY($1) \
             ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, Issue>(&query)
            .bind(project_ids)
            .fetch_all(pool)
            .await
    }

    /// Applies the non-None fields of `data`
    ///
    /// Returns None if the issue does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateIssue,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE issues SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 tag = COALESCE($4, tag), \
                 priority = COALESCE($5, priority), \
                 status = COALESCE($6, status), \
                 assignee_id = COALESCE($7, assignee_id) \
             WHERE id = $1 \
             RETURNING {ISSUE_COLUMNS}"
        );

        sqlx::query_as::<_, Issue>(&query)
            .bind(id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.tag)
            .bind(data.priority)
            .bind(data.status)
            .bind(data.assignee_id)
            .fetch_optional(pool)
            .await
    }

    /// Deletes an issue and its notes
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM issues WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
