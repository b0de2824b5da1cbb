use std::sync::Arc;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::loader::{LoadError, SnapshotLoader};
use taskwarden_core::resource::{
    CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot, UserSnapshot,
};
use taskwarden_storage::{StorageError, Store};

fn to_load_error(err: StorageError) -> LoadError {
    match err {
        StorageError::NotFound(kind) => LoadError::NotFound(kind),
        other => LoadError::Storage(other.to_string()),
    }
}

/// Serves policy snapshots straight from a storage backend.
pub struct StoreSnapshotLoader<S: Store> {
    store: Arc<S>,
}

impl<S: Store> StoreSnapshotLoader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: Store> SnapshotLoader for StoreSnapshotLoader<S> {
    async fn load_project(&self, id: &ProjectId) -> Result<ProjectSnapshot, LoadError> {
        self.store
            .project_snapshot(id)
            .await
            .map_err(to_load_error)?
            .ok_or(LoadError::NotFound(ResourceKind::Project))
    }

    async fn load_task(&self, id: &TaskId) -> Result<TaskSnapshot, LoadError> {
        self.store
            .task_snapshot(id)
            .await
            .map_err(to_load_error)?
            .ok_or(LoadError::NotFound(ResourceKind::Task))
    }

    async fn load_comment(&self, id: &CommentId) -> Result<CommentSnapshot, LoadError> {
        self.store
            .comment_snapshot(id)
            .await
            .map_err(to_load_error)?
            .ok_or(LoadError::NotFound(ResourceKind::Comment))
    }

    async fn load_user(&self, id: &UserId) -> Result<UserSnapshot, LoadError> {
        self.store
            .get_user(id)
            .await
            .map_err(to_load_error)?
            .map(|user| UserSnapshot::new(user.id))
            .ok_or(LoadError::NotFound(ResourceKind::User))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskwarden_core::identity::Role;
    use taskwarden_core::model::{NewProject, NewTask, NewUser};
    use taskwarden_storage::{InMemoryStore, ProjectStore, TaskStore, UserStore};

    async fn seed_user(store: &InMemoryStore, email: &str) -> UserId {
        store
            .create_user(&NewUser {
                email: email.to_string(),
                first_name: None,
                last_name: None,
                role: Role::Member,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn loader_resolves_task_through_project() {
        let store = Arc::new(InMemoryStore::new());
        let creator = seed_user(&store, "c@example.com").await;
        let member = seed_user(&store, "m@example.com").await;
        let project = store
            .create_project(&NewProject {
                name: "apollo".to_string(),
                description: None,
                creator_id: creator,
                member_ids: vec![member],
            })
            .await
            .unwrap();
        let task = store
            .create_task(&NewTask {
                project_id: project.id,
                title: "launch".to_string(),
                description: None,
                assignee_id: None,
            })
            .await
            .unwrap();

        let loader = StoreSnapshotLoader::new(Arc::clone(&store));
        let snapshot = loader.load_task(&task.id).await.unwrap();

        assert_eq!(snapshot.project.id, project.id);
        assert_eq!(snapshot.project.creator_id, creator);
        assert!(snapshot.project.is_member(&member));
    }

    #[tokio::test]
    async fn loader_reports_missing_resources_by_kind() {
        let store = Arc::new(InMemoryStore::new());
        let loader = StoreSnapshotLoader::new(store);

        assert_eq!(
            loader.load_project(&ProjectId::generate()).await.unwrap_err(),
            LoadError::NotFound(ResourceKind::Project)
        );
        assert_eq!(
            loader.load_comment(&CommentId::generate()).await.unwrap_err(),
            LoadError::NotFound(ResourceKind::Comment)
        );
        assert_eq!(
            loader.load_user(&UserId::generate()).await.unwrap_err(),
            LoadError::NotFound(ResourceKind::User)
        );
    }

    #[tokio::test]
    async fn loader_maps_user_record_to_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let id = seed_user(&store, "a@example.com").await;
        let loader = StoreSnapshotLoader::new(store);

        let snapshot = loader.load_user(&id).await.unwrap();
        assert_eq!(snapshot.id, id);
    }
}
