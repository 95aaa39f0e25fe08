/// Note model and database operations
///
/// Notes are comments on an issue. Each note carries a correlation id
/// generated by the database at insert time; a trigger keeps it unchanged
/// on every later update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::visibility::NoteScope;

/// A note attached to an issue
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,

    /// Globally unique, assigned once at creation
    pub correlation_id: Uuid,

    pub description: String,

    /// Account that wrote the note
    pub author_id: Uuid,

    /// Issue the note belongs to; fixed after creation
    pub issue_id: Uuid,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNote {
    pub description: String,
    pub author_id: Uuid,
    pub issue_id: Uuid,
}

const NOTE_COLUMNS: &str = "id, correlation_id, description, author_id, issue_id, created_at";

impl Note {
    pub async fn create(pool: &PgPool, data: CreateNote) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO notes (description, author_id, issue_id) \
             VALUES ($1, $2, $3) \
             RETURNING {NOTE_COLUMNS}"
        );

        sqlx::query_as::<_, Note>(&query)
            .bind(data.description)
            .bind(data.author_id)
            .bind(data.issue_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1");

        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists notes inside a visibility scope, oldest first
    pub async fn list_in_scope(pool: &PgPool, scope: &NoteScope) -> Result<Vec<Self>, sqlx::Error> {
        match scope {
            NoteScope::Empty => Ok(Vec::new()),
            NoteScope::Issue(issue_id) => {
                let query = format!(
                    "SELECT {NOTE_COLUMNS} FROM notes \
                     WHERE issue_id = $1 \
                     ORDER BY created_at ASC"
                );

                sqlx::query_as::<_, Note>(&query)
                    .bind(issue_id)
                    .fetch_all(pool)
                    .await
            }
            NoteScope::Projects(project_ids) => {
                sqlx::query_as::<_, Note>(
                    r#"
                    SELECT n.id, n.correlation_id, n.description, n.author_id, n.issue_id, n.created_at
                    FROM notes n
                    JOIN issues i ON i.id = n.issue_id
                    WHERE i.project_id = ANY($1)
                    ORDER BY n.created_at ASC
                    "#,
                )
                .bind(project_ids)
                .fetch_all(pool)
                .await
            }
        }
    }

    /// Replaces the note's text
    ///
    /// Returns None if the note does not exist.
    pub async fn update_description(
        pool: &PgPool,
        id: Uuid,
        description: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE notes SET description = $2 WHERE id = $1 RETURNING {NOTE_COLUMNS}"
        );

        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .bind(description)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
