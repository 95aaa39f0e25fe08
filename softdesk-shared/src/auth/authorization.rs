/// Access-control policies
///
/// Every endpoint names the policies it is guarded by as a slice of
/// [`Policy`] values. Checks run in two stages:
///
/// 1. **Coarse** ([`authorize`]): before any object is loaded, against the
///    request context (caller, action, referenced parent).
/// 2. **Per object** ([`authorize_object`]): once the target is loaded,
///    against facts about it (author, project author, caller membership).
///
/// The predicates themselves are pure functions. Everything they need is
/// resolved from the database up front by [`RequestContext::resolve`] and the
/// `TargetFacts::for_*` constructors, so the rules can be tested without a
/// database.
///
/// # Policies
///
/// | Policy | Coarse | Per object |
/// |---|---|---|
/// | `ProjectAuthorOnly` | reads open; create needs the referenced project's author | mutations need the object's project author |
/// | `MemberOnly` | list needs any membership; create needs membership on the referenced project | membership on the object's project |
/// | `AuthorOrReadOnly` | open | reads open; mutations need the object's author |
/// | `MemberViaIssueOnly` | list/create need the referenced issue's project membership | membership on the note's issue's project |
///
/// Independently of the policies, an object is only reachable by members of
/// its project.
///
/// # Example
///
/// ```
/// use softdesk_shared::auth::authorization::{
///     authorize_object, Action, ParentRef, Policy, RequestContext, TargetFacts,
/// };
/// use uuid::Uuid;
///
/// let author = Uuid::new_v4();
/// let member = Uuid::new_v4();
///
/// let ctx = RequestContext::new(member, Action::Delete, ParentRef::Missing, true);
/// let issue = TargetFacts::new(author, author, true);
///
/// // Members may read issues but only the author may delete one
/// assert!(authorize_object(&[Policy::MemberOnly, Policy::AuthorOrReadOnly], &ctx, &issue).is_err());
/// ```

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    issue::Issue,
    membership::Membership,
    note::Note,
    project::Project,
};
use crate::visibility::ParentFilter;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The caller may not perform this action
    #[error("{0}")]
    Denied(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Named access-control rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    ProjectAuthorOnly,
    MemberOnly,
    AuthorOrReadOnly,
    MemberViaIssueOnly,
}

impl Policy {
    fn denial(&self) -> &'static str {
        match self {
            Policy::ProjectAuthorOnly => "Only the project author can perform this action",
            Policy::MemberOnly => "You must be a contributor of this project",
            Policy::AuthorOrReadOnly => "Only the author can modify this resource",
            Policy::MemberViaIssueOnly => "You must be a contributor of the issue's project",
        }
    }
}

/// What the request is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Action {
    /// Read-only actions
    pub fn is_safe(&self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

/// Parent object referenced by a list filter or a create payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    /// No parent id was supplied
    Missing,

    /// An id was supplied but does not name an existing object
    Unresolved,

    /// The project the parent id leads to
    Resolved {
        project_id: Uuid,
        project_author_id: Uuid,
        caller_is_member: bool,
    },
}

/// Which kind of parent a request refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    None,
    Project(ParentFilter),
    Issue(ParentFilter),
}

/// Facts about the request, resolved before the coarse check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub caller: Uuid,
    pub action: Action,
    pub parent: ParentRef,

    /// Whether the caller holds at least one membership anywhere
    pub has_any_membership: bool,
}

impl RequestContext {
    pub fn new(caller: Uuid, action: Action, parent: ParentRef, has_any_membership: bool) -> Self {
        Self {
            caller,
            action,
            parent,
            has_any_membership,
        }
    }

    /// Resolves the request context from the database
    ///
    /// An issue parent is followed to its project.
    pub async fn resolve(
        pool: &PgPool,
        caller: Uuid,
        action: Action,
        parent: Parent,
    ) -> Result<Self, sqlx::Error> {
        let project_id = match parent {
            Parent::None => Ok(None),
            Parent::Project(filter) => match filter {
                ParentFilter::Missing => Ok(None),
                ParentFilter::Invalid => Err(()),
                ParentFilter::Id(id) => Ok(Some(id)),
            },
            Parent::Issue(filter) => match filter {
                ParentFilter::Missing => Ok(None),
                ParentFilter::Invalid => Err(()),
                ParentFilter::Id(id) => Issue::project_id_of(pool, id).await?.map(Some).ok_or(()),
            },
        };

        let parent = match project_id {
            Ok(None) => ParentRef::Missing,
            Err(()) => ParentRef::Unresolved,
            Ok(Some(project_id)) => match Project::find_by_id(pool, project_id).await? {
                None => ParentRef::Unresolved,
                Some(project) => ParentRef::Resolved {
                    project_id,
                    project_author_id: project.author_id,
                    caller_is_member: Membership::has_access(pool, project_id, caller).await?,
                },
            },
        };

        let has_any_membership = Membership::has_any(pool, caller).await?;

        debug!(%caller, ?action, ?parent, has_any_membership, "Resolved request context");
        Ok(Self::new(caller, action, parent, has_any_membership))
    }

    fn caller_is_parent_member(&self) -> bool {
        matches!(self.parent, ParentRef::Resolved { caller_is_member: true, .. })
    }

    fn caller_is_parent_author(&self) -> bool {
        matches!(self.parent, ParentRef::Resolved { project_author_id, .. } if project_author_id == self.caller)
    }
}

/// Facts about a loaded object, resolved before the per-object check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFacts {
    /// Author of the object itself
    pub author_id: Uuid,

    /// Author of the project the object belongs to
    pub project_author_id: Uuid,

    /// Whether the caller is a member of that project
    pub caller_is_member: bool,
}

impl TargetFacts {
    pub fn new(author_id: Uuid, project_author_id: Uuid, caller_is_member: bool) -> Self {
        Self {
            author_id,
            project_author_id,
            caller_is_member,
        }
    }

    pub async fn for_project(pool: &PgPool, caller: Uuid, project: &Project) -> Result<Self, sqlx::Error> {
        let caller_is_member = Membership::has_access(pool, project.id, caller).await?;
        Ok(Self::new(project.author_id, project.author_id, caller_is_member))
    }

    /// A membership's "author" is the account it grants access to
    pub async fn for_membership(
        pool: &PgPool,
        caller: Uuid,
        membership: &Membership,
    ) -> Result<Self, sqlx::Error> {
        let project_author_id = project_author(pool, membership.project_id).await?;
        let caller_is_member = Membership::has_access(pool, membership.project_id, caller).await?;

        Ok(Self::new(membership.account_id, project_author_id, caller_is_member))
    }

    pub async fn for_issue(pool: &PgPool, caller: Uuid, issue: &Issue) -> Result<Self, sqlx::Error> {
        let project_author_id = project_author(pool, issue.project_id).await?;
        let caller_is_member = Membership::has_access(pool, issue.project_id, caller).await?;

        Ok(Self::new(issue.author_id, project_author_id, caller_is_member))
    }

    pub async fn for_note(pool: &PgPool, caller: Uuid, note: &Note) -> Result<Self, sqlx::Error> {
        let project_id = Issue::project_id_of(pool, note.issue_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let project_author_id = project_author(pool, project_id).await?;
        let caller_is_member = Membership::has_access(pool, project_id, caller).await?;

        Ok(Self::new(note.author_id, project_author_id, caller_is_member))
    }
}

async fn project_author(pool: &PgPool, project_id: Uuid) -> Result<Uuid, sqlx::Error> {
    Project::find_by_id(pool, project_id)
        .await?
        .map(|project| project.author_id)
        .ok_or(sqlx::Error::RowNotFound)
}

/// Coarse check of one policy against the request context
pub fn has_permission(policy: Policy, ctx: &RequestContext) -> bool {
    match policy {
        Policy::ProjectAuthorOnly => match ctx.action {
            Action::Create => ctx.caller_is_parent_author(),
            _ => true,
        },
        Policy::MemberOnly => match ctx.action {
            Action::List => ctx.has_any_membership,
            Action::Create => ctx.caller_is_parent_member(),
            _ => true,
        },
        Policy::AuthorOrReadOnly => true,
        Policy::MemberViaIssueOnly => match (ctx.action, ctx.parent) {
            (Action::List, ParentRef::Missing) => ctx.has_any_membership,
            (Action::List | Action::Create, _) => ctx.caller_is_parent_member(),
            _ => true,
        },
    }
}

/// Per-object check of one policy
pub fn has_object_permission(policy: Policy, ctx: &RequestContext, target: &TargetFacts) -> bool {
    match policy {
        Policy::ProjectAuthorOnly => ctx.action.is_safe() || target.project_author_id == ctx.caller,
        Policy::MemberOnly | Policy::MemberViaIssueOnly => target.caller_is_member,
        Policy::AuthorOrReadOnly => ctx.action.is_safe() || target.author_id == ctx.caller,
    }
}

/// Runs the coarse check of every policy in order
///
/// # Errors
///
/// Returns `AuthzError::Denied` with the first failing policy's message.
pub fn authorize(policies: &[Policy], ctx: &RequestContext) -> Result<(), AuthzError> {
    match policies.iter().find(|policy| !has_permission(**policy, ctx)) {
        Some(policy) => {
            debug!(caller = %ctx.caller, ?policy, action = ?ctx.action, "Permission denied");
            Err(AuthzError::Denied(policy.denial()))
        }
        None => Ok(()),
    }
}

/// Runs the per-object check of every policy in order
///
/// Objects outside the caller's projects are denied before any policy runs.
pub fn authorize_object(
    policies: &[Policy],
    ctx: &RequestContext,
    target: &TargetFacts,
) -> Result<(), AuthzError> {
    if !target.caller_is_member {
        debug!(caller = %ctx.caller, action = ?ctx.action, "Object outside caller's projects");
        return Err(AuthzError::Denied("You are not a contributor of this project"));
    }

    match policies
        .iter()
        .find(|policy| !has_object_permission(**policy, ctx, target))
    {
        Some(policy) => {
            debug!(caller = %ctx.caller, ?policy, action = ?ctx.action, "Object permission denied");
            Err(AuthzError::Denied(policy.denial()))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUE_POLICIES: &[Policy] = &[Policy::MemberOnly, Policy::AuthorOrReadOnly];
    const NOTE_POLICIES: &[Policy] = &[Policy::MemberViaIssueOnly, Policy::AuthorOrReadOnly];

    fn resolved(project_author_id: Uuid, caller_is_member: bool) -> ParentRef {
        ParentRef::Resolved {
            project_id: Uuid::new_v4(),
            project_author_id,
            caller_is_member,
        }
    }

    #[test]
    fn test_action_is_safe() {
        assert!(Action::List.is_safe());
        assert!(Action::Retrieve.is_safe());
        assert!(!Action::Create.is_safe());
        assert!(!Action::Update.is_safe());
        assert!(!Action::Delete.is_safe());
    }

    #[test]
    fn test_project_author_only_create() {
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();

        let ctx = RequestContext::new(author, Action::Create, resolved(author, true), true);
        assert!(has_permission(Policy::ProjectAuthorOnly, &ctx));

        let ctx = RequestContext::new(other, Action::Create, resolved(author, true), true);
        assert!(!has_permission(Policy::ProjectAuthorOnly, &ctx));

        for parent in [ParentRef::Missing, ParentRef::Unresolved] {
            let ctx = RequestContext::new(author, Action::Create, parent, true);
            assert!(!has_permission(Policy::ProjectAuthorOnly, &ctx));
        }
    }

    #[test]
    fn test_project_author_only_reads_are_open() {
        let ctx = RequestContext::new(Uuid::new_v4(), Action::List, ParentRef::Missing, false);
        assert!(has_permission(Policy::ProjectAuthorOnly, &ctx));

        let target = TargetFacts::new(Uuid::new_v4(), Uuid::new_v4(), true);
        let ctx = RequestContext::new(Uuid::new_v4(), Action::Retrieve, ParentRef::Missing, true);
        assert!(has_object_permission(Policy::ProjectAuthorOnly, &ctx, &target));
    }

    #[test]
    fn test_project_author_only_mutations() {
        let author = Uuid::new_v4();
        let contributor = Uuid::new_v4();
        let target = TargetFacts::new(contributor, author, true);

        let ctx = RequestContext::new(author, Action::Delete, ParentRef::Missing, true);
        assert!(has_object_permission(Policy::ProjectAuthorOnly, &ctx, &target));

        let ctx = RequestContext::new(contributor, Action::Update, ParentRef::Missing, true);
        assert!(!has_object_permission(Policy::ProjectAuthorOnly, &ctx, &target));
    }

    #[test]
    fn test_member_only_list_requires_any_membership() {
        let caller = Uuid::new_v4();

        let ctx = RequestContext::new(caller, Action::List, ParentRef::Missing, false);
        assert!(authorize(ISSUE_POLICIES, &ctx).is_err());

        let ctx = RequestContext::new(caller, Action::List, ParentRef::Missing, true);
        assert!(authorize(ISSUE_POLICIES, &ctx).is_ok());
    }

    #[test]
    fn test_member_only_create_requires_parent_membership() {
        let caller = Uuid::new_v4();

        let ctx = RequestContext::new(caller, Action::Create, resolved(Uuid::new_v4(), true), true);
        assert!(authorize(ISSUE_POLICIES, &ctx).is_ok());

        let ctx = RequestContext::new(caller, Action::Create, resolved(Uuid::new_v4(), false), true);
        assert!(matches!(
            authorize(ISSUE_POLICIES, &ctx),
            Err(AuthzError::Denied(_))
        ));

        let ctx = RequestContext::new(caller, Action::Create, ParentRef::Missing, true);
        assert!(authorize(ISSUE_POLICIES, &ctx).is_err());
    }

    #[test]
    fn test_author_or_read_only() {
        let author = Uuid::new_v4();
        let member = Uuid::new_v4();
        let target = TargetFacts::new(author, Uuid::new_v4(), true);

        for action in [Action::Retrieve, Action::List] {
            let ctx = RequestContext::new(member, action, ParentRef::Missing, true);
            assert!(has_object_permission(Policy::AuthorOrReadOnly, &ctx, &target));
        }

        for action in [Action::Update, Action::Delete] {
            let ctx = RequestContext::new(member, action, ParentRef::Missing, true);
            assert!(!has_object_permission(Policy::AuthorOrReadOnly, &ctx, &target));

            let ctx = RequestContext::new(author, action, ParentRef::Missing, true);
            assert!(has_object_permission(Policy::AuthorOrReadOnly, &ctx, &target));
        }
    }

    #[test]
    fn test_member_via_issue_only() {
        let caller = Uuid::new_v4();

        for action in [Action::List, Action::Create] {
            let ctx = RequestContext::new(caller, action, resolved(Uuid::new_v4(), true), true);
            assert!(authorize(NOTE_POLICIES, &ctx).is_ok());

            let ctx = RequestContext::new(caller, action, resolved(Uuid::new_v4(), false), true);
            assert!(authorize(NOTE_POLICIES, &ctx).is_err());

            let ctx = RequestContext::new(caller, action, ParentRef::Unresolved, true);
            assert!(authorize(NOTE_POLICIES, &ctx).is_err());
        }
    }

    #[test]
    fn test_member_via_issue_only_without_issue_id() {
        let caller = Uuid::new_v4();

        let ctx = RequestContext::new(caller, Action::List, ParentRef::Missing, true);
        assert!(authorize(NOTE_POLICIES, &ctx).is_ok());

        let ctx = RequestContext::new(caller, Action::List, ParentRef::Missing, false);
        assert!(authorize(NOTE_POLICIES, &ctx).is_err());

        let ctx = RequestContext::new(caller, Action::Create, ParentRef::Missing, true);
        assert!(authorize(NOTE_POLICIES, &ctx).is_err());
    }

    #[test]
    fn test_objects_outside_caller_projects_are_denied() {
        let caller = Uuid::new_v4();
        let target = TargetFacts::new(caller, caller, false);
        let ctx = RequestContext::new(caller, Action::Retrieve, ParentRef::Missing, true);

        assert!(authorize_object(&[Policy::AuthorOrReadOnly], &ctx, &target).is_err());
    }

    #[test]
    fn test_member_deleting_someone_elses_note_is_denied() {
        let note_author = Uuid::new_v4();
        let member = Uuid::new_v4();
        let note = TargetFacts::new(note_author, note_author, true);

        let ctx = RequestContext::new(member, Action::Delete, ParentRef::Missing, true);
        let err = authorize_object(NOTE_POLICIES, &ctx, &note).unwrap_err();
        assert_eq!(err.to_string(), "Only the author can modify this resource");

        let ctx = RequestContext::new(member, Action::Retrieve, ParentRef::Missing, true);
        assert!(authorize_object(NOTE_POLICIES, &ctx, &note).is_ok());
    }
}
