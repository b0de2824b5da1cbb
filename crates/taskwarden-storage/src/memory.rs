use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::Role;
use taskwarden_core::model::{
    Comment, NewComment, NewProject, NewTask, NewUser, Project, ProjectPatch, Task, TaskPatch, User,
    UserPatch,
};
use taskwarden_core::policy::ProjectFilter;
use taskwarden_core::resource::{CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot};

use crate::traits::{
    CommentStore, ProjectStore, StorageError, TaskQuery, TaskStore, UserStore,
};

#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    record: T,
}

#[derive(Debug, Default)]
struct InnerState {
    seq: u64,
    users: HashMap<UserId, Stored<User>>,
    projects: HashMap<ProjectId, Stored<Project>>,
    tasks: HashMap<TaskId, Stored<Task>>,
    comments: HashMap<CommentId, Stored<Comment>>,
}

impl InnerState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn email_taken(&self, email: &str, except: Option<&UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.record.email == email && Some(&u.record.id) != except)
    }

    fn project_snapshot(&self, id: &ProjectId) -> Option<ProjectSnapshot> {
        self.projects.get(id).map(|p| p.record.snapshot())
    }

    fn task_snapshot(&self, id: &TaskId) -> Option<TaskSnapshot> {
        let task = &self.tasks.get(id)?.record;
        let project = self.project_snapshot(&task.project_id)?;
        Some(task.snapshot(project))
    }

    fn comment_snapshot(&self, id: &CommentId) -> Option<CommentSnapshot> {
        let comment = &self.comments.get(id)?.record;
        let task = self.task_snapshot(&comment.task_id)?;
        Some(comment.snapshot(task))
    }

    fn ensure_users_exist(&self, ids: &[UserId]) -> Result<(), StorageError> {
        if ids.iter().all(|id| self.users.contains_key(id)) {
            Ok(())
        } else {
            Err(StorageError::NotFound(ResourceKind::User))
        }
    }

    fn remove_task(&mut self, id: &TaskId) {
        self.tasks.remove(id);
        self.comments.retain(|_, c| c.record.task_id != *id);
    }
}

fn newest_first<T: Clone>(mut rows: Vec<&Stored<T>>) -> Vec<T> {
    rows.sort_by(|a, b| b.seq.cmp(&a.seq));
    rows.into_iter().map(|s| s.record.clone()).collect()
}

fn oldest_first<T: Clone>(mut rows: Vec<&Stored<T>>) -> Vec<T> {
    rows.sort_by_key(|s| s.seq);
    rows.into_iter().map(|s| s.record.clone()).collect()
}

/// Process-local store. Every operation, snapshot loads included, runs under
/// one lock, so a snapshot never mixes states.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InnerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Internal("in-memory store lock poisoned".to_string()))
    }
}

impl UserStore for InMemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let mut state = self.lock()?;
        if state.email_taken(&user.email, None) {
            return Err(StorageError::Conflict(format!(
                "email already in use: {}",
                user.email
            )));
        }

        let now = Utc::now();
        let record = User {
            id: UserId::generate(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        let seq = state.next_seq();
        state.users.insert(
            record.id,
            Stored {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let state = self.lock()?;
        Ok(state.users.get(id).map(|u| u.record.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.record.email == email)
            .map(|u| u.record.clone()))
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError> {
        let state = self.lock()?;
        let mut users: Vec<User> = ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .map(|u| u.record.clone())
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users.dedup_by_key(|u| u.id);
        Ok(users)
    }

    async fn missing_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, StorageError> {
        let state = self.lock()?;
        Ok(ids
            .iter()
            .filter(|id| !state.users.contains_key(id))
            .copied()
            .collect())
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, StorageError> {
        let mut state = self.lock()?;
        if let Some(ref email) = patch.email
            && state.email_taken(email, Some(id))
        {
            return Err(StorageError::Conflict(format!(
                "email already in use: {email}"
            )));
        }

        let user = &mut state
            .users
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::User))?
            .record;
        if let Some(ref email) = patch.email {
            user.email = email.clone();
        }
        if let Some(ref first_name) = patch.first_name {
            user.first_name = Some(first_name.clone());
        }
        if let Some(ref last_name) = patch.last_name {
            user.last_name = Some(last_name.clone());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_role(&self, id: &UserId, role: Role) -> Result<User, StorageError> {
        let mut state = self.lock()?;
        let user = &mut state
            .users
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::User))?
            .record;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(id) {
            return Err(StorageError::NotFound(ResourceKind::User));
        }
        if state.projects.values().any(|p| p.record.creator_id == *id) {
            return Err(StorageError::Conflict(
                "user still owns projects".to_string(),
            ));
        }

        state.users.remove(id);
        for project in state.projects.values_mut() {
            project.record.member_ids.remove(id);
        }
        for task in state.tasks.values_mut() {
            if task.record.assignee_id == Some(*id) {
                task.record.assignee_id = None;
            }
        }
        state.comments.retain(|_, c| c.record.author_id != *id);
        Ok(())
    }
}

impl ProjectStore for InMemoryStore {
    async fn create_project(&self, project: &NewProject) -> Result<Project, StorageError> {
        let mut state = self.lock()?;
        state.ensure_users_exist(&[project.creator_id])?;
        state.ensure_users_exist(&project.member_ids)?;

        let now = Utc::now();
        let record = Project {
            id: ProjectId::generate(),
            name: project.name.clone(),
            description: project.description.clone(),
            creator_id: project.creator_id,
            member_ids: project.member_ids.iter().copied().collect(),
            created_at: now,
            updated_at: now,
        };
        let seq = state.next_seq();
        state.projects.insert(
            record.id,
            Stored {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, StorageError> {
        let state = self.lock()?;
        Ok(state.projects.get(id).map(|p| p.record.clone()))
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, StorageError> {
        let state = self.lock()?;
        let rows = state
            .projects
            .values()
            .filter(|p| filter.matches(&p.record.snapshot()))
            .collect();
        Ok(newest_first(rows))
    }

    async fn update_project(
        &self,
        id: &ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, StorageError> {
        let mut state = self.lock()?;
        let project = &mut state
            .projects
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::Project))?
            .record;
        if let Some(ref name) = patch.name {
            project.name = name.clone();
        }
        if let Some(ref description) = patch.description {
            project.description = Some(description.clone());
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.projects.remove(id).is_none() {
            return Err(StorageError::NotFound(ResourceKind::Project));
        }
        let task_ids: Vec<TaskId> = state
            .tasks
            .values()
            .filter(|t| t.record.project_id == *id)
            .map(|t| t.record.id)
            .collect();
        for task_id in &task_ids {
            state.remove_task(task_id);
        }
        Ok(())
    }

    async fn add_members(
        &self,
        id: &ProjectId,
        members: &[UserId],
    ) -> Result<Project, StorageError> {
        let mut state = self.lock()?;
        if !state.projects.contains_key(id) {
            return Err(StorageError::NotFound(ResourceKind::Project));
        }
        state.ensure_users_exist(members)?;

        let project = &mut state
            .projects
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::Project))?
            .record;
        project.member_ids.extend(members.iter().copied());
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn remove_members(
        &self,
        id: &ProjectId,
        members: &[UserId],
    ) -> Result<Project, StorageError> {
        let mut state = self.lock()?;
        let project = &mut state
            .projects
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::Project))?
            .record;
        for member in members {
            project.member_ids.remove(member);
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn project_snapshot(
        &self,
        id: &ProjectId,
    ) -> Result<Option<ProjectSnapshot>, StorageError> {
        let state = self.lock()?;
        Ok(state.project_snapshot(id))
    }
}

impl TaskStore for InMemoryStore {
    async fn create_task(&self, task: &NewTask) -> Result<Task, StorageError> {
        let mut state = self.lock()?;
        if !state.projects.contains_key(&task.project_id) {
            return Err(StorageError::NotFound(ResourceKind::Project));
        }
        if let Some(assignee) = task.assignee_id {
            state.ensure_users_exist(&[assignee])?;
        }

        let now = Utc::now();
        let record = Task {
            id: TaskId::generate(),
            project_id: task.project_id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: Default::default(),
            assignee_id: task.assignee_id,
            created_at: now,
            updated_at: now,
        };
        let seq = state.next_seq();
        state.tasks.insert(
            record.id,
            Stored {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StorageError> {
        let state = self.lock()?;
        Ok(state.tasks.get(id).map(|t| t.record.clone()))
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StorageError> {
        let state = self.lock()?;
        let rows = state
            .tasks
            .values()
            .filter(|t| {
                let task = &t.record;
                let visible = state
                    .project_snapshot(&task.project_id)
                    .is_some_and(|p| query.projects.matches(&p));
                visible
                    && query.project_id.is_none_or(|id| task.project_id == id)
                    && query.status.is_none_or(|s| task.status == s)
                    && query.assignee_id.is_none_or(|a| task.assignee_id == Some(a))
            })
            .collect();
        Ok(newest_first(rows))
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StorageError> {
        let mut state = self.lock()?;
        if let Some(Some(assignee)) = patch.assignee_id {
            state.ensure_users_exist(&[assignee])?;
        }

        let task = &mut state
            .tasks
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::Task))?
            .record;
        if let Some(ref title) = patch.title {
            task.title = title.clone();
        }
        if let Some(ref description) = patch.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(assignee) = patch.assignee_id {
            task.assignee_id = assignee;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.tasks.contains_key(id) {
            return Err(StorageError::NotFound(ResourceKind::Task));
        }
        state.remove_task(id);
        Ok(())
    }

    async fn task_snapshot(&self, id: &TaskId) -> Result<Option<TaskSnapshot>, StorageError> {
        let state = self.lock()?;
        Ok(state.task_snapshot(id))
    }
}

impl CommentStore for InMemoryStore {
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, StorageError> {
        let mut state = self.lock()?;
        if !state.tasks.contains_key(&comment.task_id) {
            return Err(StorageError::NotFound(ResourceKind::Task));
        }
        state.ensure_users_exist(&[comment.author_id])?;

        let now = Utc::now();
        let record = Comment {
            id: CommentId::generate(),
            task_id: comment.task_id,
            author_id: comment.author_id,
            content: comment.content.clone(),
            created_at: now,
            updated_at: now,
        };
        let seq = state.next_seq();
        state.comments.insert(
            record.id,
            Stored {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get_comment(&self, id: &CommentId) -> Result<Option<Comment>, StorageError> {
        let state = self.lock()?;
        Ok(state.comments.get(id).map(|c| c.record.clone()))
    }

    async fn list_comments_by_task(&self, task_id: &TaskId) -> Result<Vec<Comment>, StorageError> {
        let state = self.lock()?;
        let rows = state
            .comments
            .values()
            .filter(|c| c.record.task_id == *task_id)
            .collect();
        Ok(oldest_first(rows))
    }

    async fn list_comments_by_author(
        &self,
        author_id: &UserId,
    ) -> Result<Vec<Comment>, StorageError> {
        let state = self.lock()?;
        let rows = state
            .comments
            .values()
            .filter(|c| c.record.author_id == *author_id)
            .collect();
        Ok(newest_first(rows))
    }

    async fn update_comment(&self, id: &CommentId, content: &str) -> Result<Comment, StorageError> {
        let mut state = self.lock()?;
        let comment = &mut state
            .comments
            .get_mut(id)
            .ok_or(StorageError::NotFound(ResourceKind::Comment))?
            .record;
        comment.content = content.to_string();
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: &CommentId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .comments
            .remove(id)
            .map(|_| ())
            .ok_or(StorageError::NotFound(ResourceKind::Comment))
    }

    async fn comment_snapshot(
        &self,
        id: &CommentId,
    ) -> Result<Option<CommentSnapshot>, StorageError> {
        let state = self.lock()?;
        Ok(state.comment_snapshot(id))
    }
}
