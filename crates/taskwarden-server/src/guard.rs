use std::sync::Arc;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::Identity;
use taskwarden_core::loader::{LoadError, SnapshotLoader};
use taskwarden_core::policy::{Action, Decision, PolicyEngine, ProjectFilter, Resource};
use taskwarden_core::resource::{
    CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot, UserSnapshot,
};

use crate::audit;
use crate::error::ApiError;
use crate::metrics::Metrics;

/// Loads the target of an operation and runs it past the [`PolicyEngine`].
///
/// A missing target is reported before any decision is made, so callers
/// always see `NotFound` ahead of `Denied`.
pub struct Enforcer<L: SnapshotLoader> {
    loader: L,
    engine: PolicyEngine,
    metrics: Option<Arc<Metrics>>,
}

impl<L: SnapshotLoader> Enforcer<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            engine: PolicyEngine::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn visibility(&self, identity: &Identity) -> ProjectFilter {
        self.engine.visibility(identity)
    }

    pub async fn authorize_project(
        &self,
        identity: &Identity,
        id: &ProjectId,
        action: Action,
    ) -> Result<ProjectSnapshot, ApiError> {
        let project = self
            .loader
            .load_project(id)
            .await
            .map_err(|e| self.load_failed(e))?;
        self.authorize(identity, Resource::Project(&project), action)?;
        Ok(project)
    }

    pub async fn authorize_task(
        &self,
        identity: &Identity,
        id: &TaskId,
        action: Action,
    ) -> Result<TaskSnapshot, ApiError> {
        let task = self
            .loader
            .load_task(id)
            .await
            .map_err(|e| self.load_failed(e))?;
        self.authorize(identity, Resource::Task(&task), action)?;
        Ok(task)
    }

    pub async fn authorize_comment(
        &self,
        identity: &Identity,
        id: &CommentId,
        action: Action,
    ) -> Result<CommentSnapshot, ApiError> {
        let comment = self
            .loader
            .load_comment(id)
            .await
            .map_err(|e| self.load_failed(e))?;
        self.authorize(identity, Resource::Comment(&comment), action)?;
        Ok(comment)
    }

    pub async fn authorize_user(
        &self,
        identity: &Identity,
        id: &UserId,
        action: Action,
    ) -> Result<UserSnapshot, ApiError> {
        let user = self
            .loader
            .load_user(id)
            .await
            .map_err(|e| self.load_failed(e))?;
        self.authorize(identity, Resource::User(&user), action)?;
        Ok(user)
    }

    /// Create check for a task in `project_id`. Returns the parent project.
    pub async fn authorize_new_task(
        &self,
        identity: &Identity,
        project_id: &ProjectId,
    ) -> Result<ProjectSnapshot, ApiError> {
        let project = self
            .loader
            .load_project(project_id)
            .await
            .map_err(|e| self.load_failed(e))?;
        self.authorize(identity, Resource::NewTask { project: &project }, Action::Create)?;
        Ok(project)
    }

    /// Create check for a comment on `task_id`. Returns the parent task.
    pub async fn authorize_new_comment(
        &self,
        identity: &Identity,
        task_id: &TaskId,
    ) -> Result<TaskSnapshot, ApiError> {
        let task = self
            .loader
            .load_task(task_id)
            .await
            .map_err(|e| self.load_failed(e))?;
        self.authorize(identity, Resource::NewComment { task: &task }, Action::Create)?;
        Ok(task)
    }

    /// Decides on a resource whose facts are already loaded, typically a
    /// creation target and its parent.
    pub fn authorize(
        &self,
        identity: &Identity,
        resource: Resource<'_>,
        action: Action,
    ) -> Result<(), ApiError> {
        match self.engine.evaluate(identity, resource, action) {
            Ok(decision) => self.settle(
                identity,
                resource.kind(),
                &target_id(&resource),
                action,
                decision,
            ),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    user_id = %identity.id,
                    "unsupported authorization request"
                );
                if cfg!(debug_assertions) {
                    panic!("{err}");
                }
                Err(err.into())
            }
        }
    }

    /// The assignment integrity rule. Not bypassed by the admin role.
    pub fn ensure_assignable(
        &self,
        identity: &Identity,
        project: &ProjectSnapshot,
        target: &UserId,
    ) -> Result<(), ApiError> {
        let decision = self.engine.check_assignee(project, target);
        self.settle(
            identity,
            ResourceKind::Project,
            &project.id.to_string(),
            Action::AssignTask,
            decision,
        )
    }

    fn settle(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        resource_id: &str,
        action: Action,
        decision: Decision,
    ) -> Result<(), ApiError> {
        match decision {
            Decision::Allow => {
                if let Some(ref m) = self.metrics {
                    m.record_allowed();
                }
                Ok(())
            }
            Decision::Deny(reason) => {
                if let Some(ref m) = self.metrics {
                    m.record_denied();
                }
                audit::audit_access_denied(&identity.id, kind, resource_id, action, reason);
                Err(ApiError::Denied(reason))
            }
        }
    }

    fn load_failed(&self, err: LoadError) -> ApiError {
        if let (LoadError::NotFound(_), Some(m)) = (&err, &self.metrics) {
            m.record_not_found();
        }
        err.into()
    }
}

fn target_id(resource: &Resource<'_>) -> String {
    match resource {
        Resource::Project(p) | Resource::NewTask { project: p } => p.id.to_string(),
        Resource::Task(t) | Resource::NewComment { task: t } => t.id.to_string(),
        Resource::Comment(c) => c.id.to_string(),
        Resource::User(u) => u.id.to_string(),
        Resource::NewProject | Resource::NewUser => String::new(),
    }
}
