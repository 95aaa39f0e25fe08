/// Project model and database operations
///
/// A project has exactly one author. The author's `Author` membership is
/// written in the same transaction as the project itself, so no project is
/// ever visible without it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_type AS ENUM ('BACK_END', 'FRONT_END', 'IOS', 'ANDROID');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(128) NOT NULL,
///     description TEXT NOT NULL,
///     project_type project_type NOT NULL,
///     author_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Deleting a project cascades to its memberships, issues and their notes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::membership::{Membership, MembershipRole};

/// Platform a project targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectType {
    BackEnd,
    FrontEnd,
    Ios,
    Android,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::BackEnd => "BACK_END",
            ProjectType::FrontEnd => "FRONT_END",
            ProjectType::Ios => "IOS",
            ProjectType::Android => "ANDROID",
        }
    }
}

/// A project
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,

    pub title: String,

    pub description: String,

    /// Serialized as `type`
    #[serde(rename = "type")]
    pub project_type: ProjectType,

    /// Account that created the project
    pub author_id: Uuid,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub title: String,
    pub description: String,
    pub project_type: ProjectType,
    /// Always the creating caller, never client-supplied
    pub author_id: Uuid,
}

/// Fields that may change on an existing project
///
/// `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub project_type: Option<ProjectType>,
}

const PROJECT_COLUMNS: &str = "id, title, description, project_type, author_id, created_at";

impl Project {
    /// Creates a project and its author's `Author` membership atomically
    ///
    /// Both rows are written in one transaction. If either insert fails the
    /// transaction is dropped without commit and nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the author does not exist or the database fails.
    pub async fn create_with_author(
        pool: &PgPool,
        data: CreateProject,
    ) -> Result<(Self, Membership), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO projects (title, description, project_type, author_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {PROJECT_COLUMNS}"
        );

        let project = sqlx::query_as::<_, Project>(&query)
            .bind(data.title)
            .bind(data.description)
            .bind(data.project_type)
            .bind(data.author_id)
            .fetch_one(&mut *tx)
            .await?;

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (account_id, project_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, account_id, project_id, role, created_at
            "#,
        )
        .bind(project.author_id)
        .bind(project.id)
        .bind(MembershipRole::Author)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(project_id = %project.id, author_id = %project.author_id, "Project created with author membership");
        Ok((project, membership))
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists the projects an account is a member of, newest first
    pub async fn list_for_member(pool: &PgPool, account_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.title, p.description, p.project_type, p.author_id, p.created_at
            FROM projects p
            JOIN memberships m ON m.project_id = p.id
            WHERE m.account_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(pool)
        .await
    }

    /// Applies the non-None fields of `data`
    ///
    /// Returns None if the project does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 project_type = COALESCE($4, project_type) \
             WHERE id = $1 \
             RETURNING {PROJECT_COLUMNS}"
        );

        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.project_type)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a project together with everything hanging off it
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
