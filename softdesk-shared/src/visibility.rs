/// Visibility scoping for list endpoints
///
/// Every list is narrowed to what the caller's memberships permit. Scoping
/// is split in two: pure functions decide the scope from already-resolved
/// facts, and async resolvers fetch those facts from the database.
///
/// A malformed or unauthorized filter never produces an error. It narrows
/// the result to the empty set.
///
/// # Example
///
/// ```
/// use softdesk_shared::visibility::{scope_by_project, ParentFilter, ProjectScope};
/// use uuid::Uuid;
///
/// let alpha = Uuid::new_v4();
/// let beta = Uuid::new_v4();
///
/// // Filtering by a project the caller is not a member of yields nothing
/// let filter = ParentFilter::Id(beta);
/// assert_eq!(scope_by_project(&filter, &[alpha]), ProjectScope::Empty);
///
/// // No filter means every project the caller is a member of
/// let scope = scope_by_project(&ParentFilter::Missing, &[alpha]);
/// assert_eq!(scope, ProjectScope::Projects(vec![alpha]));
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{issue::Issue, membership::Membership};

/// A parent id taken from a query string or payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    /// No id was supplied
    Missing,

    /// Something was supplied but it is not a UUID
    Invalid,

    Id(Uuid),
}

impl ParentFilter {
    /// Parses a raw parameter value
    ///
    /// Empty or whitespace-only values count as missing.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => ParentFilter::Missing,
            Some(value) => match Uuid::parse_str(value) {
                Ok(id) => ParentFilter::Id(id),
                Err(_) => ParentFilter::Invalid,
            },
        }
    }

    pub fn from_id(id: Option<Uuid>) -> Self {
        id.map_or(ParentFilter::Missing, ParentFilter::Id)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ParentFilter::Missing)
    }
}

/// Projects whose children may be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    Empty,
    Projects(Vec<Uuid>),
}

/// Notes that may be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteScope {
    Empty,

    /// Notes of one issue
    Issue(Uuid),

    /// Notes of every issue in these projects
    Projects(Vec<Uuid>),
}

fn projects_or_empty(project_ids: &[Uuid]) -> ProjectScope {
    if project_ids.is_empty() {
        ProjectScope::Empty
    } else {
        ProjectScope::Projects(project_ids.to_vec())
    }
}

/// Scope for memberships and issues filtered by project
pub fn scope_by_project(filter: &ParentFilter, member_projects: &[Uuid]) -> ProjectScope {
    match filter {
        ParentFilter::Missing => projects_or_empty(member_projects),
        ParentFilter::Invalid => ProjectScope::Empty,
        ParentFilter::Id(project_id) if member_projects.contains(project_id) => {
            ProjectScope::Projects(vec![*project_id])
        }
        ParentFilter::Id(_) => ProjectScope::Empty,
    }
}

/// Scope for notes filtered by issue
///
/// `issue_project` is the project of the filtered issue, or None when the
/// issue does not exist.
pub fn scope_by_issue(
    filter: &ParentFilter,
    issue_project: Option<Uuid>,
    member_projects: &[Uuid],
) -> NoteScope {
    match filter {
        ParentFilter::Missing => {
            if member_projects.is_empty() {
                NoteScope::Empty
            } else {
                NoteScope::Projects(member_projects.to_vec())
            }
        }
        ParentFilter::Invalid => NoteScope::Empty,
        ParentFilter::Id(issue_id) => match issue_project {
            Some(project_id) if member_projects.contains(&project_id) => NoteScope::Issue(*issue_id),
            _ => NoteScope::Empty,
        },
    }
}

/// Resolves the project scope of `account_id` from the database
pub async fn resolve_project_scope(
    pool: &PgPool,
    account_id: Uuid,
    filter: &ParentFilter,
) -> Result<ProjectScope, sqlx::Error> {
    if matches!(filter, ParentFilter::Invalid) {
        return Ok(ProjectScope::Empty);
    }

    let member_projects = Membership::project_ids_for(pool, account_id).await?;
    Ok(scope_by_project(filter, &member_projects))
}

/// Resolves the note scope of `account_id` from the database
pub async fn resolve_note_scope(
    pool: &PgPool,
    account_id: Uuid,
    filter: &ParentFilter,
) -> Result<NoteScope, sqlx::Error> {
    let issue_project = match filter {
        ParentFilter::Invalid => return Ok(NoteScope::Empty),
        ParentFilter::Id(issue_id) => match Issue::project_id_of(pool, *issue_id).await? {
            Some(project_id) => Some(project_id),
            None => return Ok(NoteScope::Empty),
        },
        ParentFilter::Missing => None,
    };

    let member_projects = Membership::project_ids_for(pool, account_id).await?;
    Ok(scope_by_issue(filter, issue_project, &member_projects))
}
