/// Database models for SoftDesk
///
/// Each model owns its table and exposes async CRUD operations over a
/// `PgPool`.
///
/// # Models
///
/// - `account`: User identities with consent flags
/// - `project`: Projects, created together with their author's membership
/// - `membership`: Account-project relationships with a role
/// - `issue`: Work items inside a project
/// - `note`: Comments attached to an issue
///
/// # Example
///
/// ```no_run
/// use softdesk_shared::models::project::{CreateProject, Project, ProjectType};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, author_id: Uuid) -> Result<(), sqlx::Error> {
/// let (project, author_membership) = Project::create_with_author(&pool, CreateProject {
///     title: "Alpha".to_string(),
///     description: "First project".to_string(),
///     project_type: ProjectType::BackEnd,
///     author_id,
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

pub mod account;
pub mod issue;
pub mod membership;
pub mod note;
pub mod project;
