/// Membership model and database operations
///
/// A membership binds an account to a project with a role. It is the single
/// gate for visibility: an account sees a project, its issues and their notes
/// only through a membership on that project.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('Author', 'Contributor');
///
/// CREATE TABLE memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     role membership_role NOT NULL DEFAULT 'Contributor',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (account_id, project_id)
/// );
/// ```
///
/// # Roles
///
/// - **Author**: held only by the project's author, created with the project
/// - **Contributor**: every other member
///
/// # Example
///
/// ```no_run
/// use softdesk_shared::models::membership::{CreateMembership, Membership, MembershipRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, project_id: Uuid, account_id: Uuid) -> Result<(), sqlx::Error> {
/// Membership::create(&pool, CreateMembership {
///     account_id,
///     project_id,
///     role: MembershipRole::Contributor,
/// }).await?;
///
/// assert!(Membership::has_access(&pool, project_id, account_id).await?);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::visibility::ProjectScope;

/// Role held on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_role")]
pub enum MembershipRole {
    /// The project's author; exactly one per project
    Author,

    /// Any other member
    Contributor,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Author => "Author",
            MembershipRole::Contributor => "Contributor",
        }
    }

    /// Whether the role can be granted through the membership endpoints
    ///
    /// `Author` is only ever written by project creation.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, MembershipRole::Author)
    }
}

impl Default for MembershipRole {
    fn default() -> Self {
        MembershipRole::Contributor
    }
}

/// Membership of an account in a project
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,

    /// Member account
    pub account_id: Uuid,

    /// Project the membership grants access to
    pub project_id: Uuid,

    pub role: MembershipRole,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub account_id: Uuid,
    pub project_id: Uuid,
    pub role: MembershipRole,
}

const MEMBERSHIP_COLUMNS: &str = "id, account_id, project_id, role, created_at";

impl Membership {
    /// Adds an account to a project
    ///
    /// # Errors
    ///
    /// Fails with a unique violation (`memberships_account_project_key`) if
    /// the account is already a member, or a foreign key violation if the
    /// account or project does not exist.
    pub async fn create(pool: &PgPool, data: CreateMembership) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO memberships (account_id, project_id, role) \
             VALUES ($1, $2, $3) \
             RETURNING {MEMBERSHIP_COLUMNS}"
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(data.account_id)
            .bind(data.project_id)
            .bind(data.role)
            .fetch_one(pool)
            .await
    }

    /// Finds a membership by its ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = $1");

        sqlx::query_as::<_, Membership>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds the membership of an account in a project
    pub async fn find(
        pool: &PgPool,
        project_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE project_id = $1 AND account_id = $2"
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(project_id)
            .bind(account_id)
            .fetch_optional(pool)
            .await
    }

    /// Checks if an account is a member of a project (any role)
    pub async fn has_access(
        pool: &PgPool,
        project_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM memberships
                WHERE project_id = $1 AND account_id = $2
            )
            "#,
        )
        .bind(project_id)
        .bind(account_id)
        .fetch_one(pool)
        .await
    }

    /// Checks if an account is a member of any project at all
    pub async fn has_any(pool: &PgPool, account_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM memberships WHERE account_id = $1)")
            .bind(account_id)
            .fetch_one(pool)
            .await
    }

    /// IDs of every project an account is a member of
    pub async fn project_ids_for(pool: &PgPool, account_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT project_id FROM memberships WHERE account_id = $1")
            .bind(account_id)
            .fetch_all(pool)
            .await
    }

    /// Lists memberships inside a visibility scope, oldest first
    pub async fn list_in_scope(pool: &PgPool, scope: &ProjectScope) -> Result<Vec<Self>, sqlx::Error> {
        let project_ids = match scope {
            ProjectScope::Empty => return Ok(Vec::new()),
            ProjectScope::Projects(ids) => ids,
        };

        let query = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE project_id = ANY($1) \
             ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(project_ids)
            .fetch_all(pool)
            .await
    }

    /// Changes the role of a membership
    ///
    /// Returns None if the membership does not exist.
    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: MembershipRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE memberships SET role = $2 WHERE id = $1 RETURNING {MEMBERSHIP_COLUMNS}"
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    /// Removes a membership
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts memberships of a project holding a given role
    pub async fn count_by_role(
        pool: &PgPool,
        project_id: Uuid,
        role: MembershipRole,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE project_id = $1 AND role = $2",
        )
        .bind(project_id)
        .bind(role)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
