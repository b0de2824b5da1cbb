use crate::id::UserId;
use crate::resource::ProjectSnapshot;

/// Scoping predicate for project list queries.
///
/// Storage backends either evaluate [`matches`](Self::matches) directly or
/// translate the variant into their own query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFilter {
    /// Every project.
    All,
    /// Projects the user created or is a member of.
    AccessibleTo(UserId),
}

impl ProjectFilter {
    pub fn matches(&self, project: &ProjectSnapshot) -> bool {
        match self {
            ProjectFilter::All => true,
            ProjectFilter::AccessibleTo(user) => project.is_participant(user),
        }
    }
}
