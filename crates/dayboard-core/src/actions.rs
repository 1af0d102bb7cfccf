use std::sync::Arc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use dayboard_shared::{ProjectCreate, ProjectPatch, TaskCreate, TaskPatch};
use tracing::{info, instrument, warn};

use crate::service::TaskService;
use crate::store::SharedStore;
use crate::task::{Project, Task};
use crate::transition::toggle_completion;

/// Non-drag mutations. Unlike drops these wait for the service and surface
/// its errors to the caller.
#[derive(Clone)]
pub struct TaskActions {
    service: Arc<dyn TaskService>,
    store: SharedStore,
}

impl TaskActions {
    pub fn new(service: Arc<dyn TaskService>, store: SharedStore) -> Self {
        Self { service, store }
    }

    /// Replaces the store contents with the service's current records.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let (tasks, projects) =
            tokio::try_join!(self.service.list_tasks(), self.service.list_projects())
                .context("failed to load tasks")?;

        let tasks = tasks
            .into_iter()
            .map(Task::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let projects = projects
            .into_iter()
            .map(Project::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let count = tasks.len();
        self.store.lock().replace_all(tasks, projects);
        Ok(count)
    }

    #[instrument(skip(self, create), fields(title = %create.title))]
    pub async fn create_task(&self, create: TaskCreate) -> anyhow::Result<Task> {
        let dto = self
            .service
            .create_task(create)
            .await
            .context("failed to create task")?;
        self.merge(dto)
    }

    /// Checkbox toggle between done and todo.
    #[instrument(skip(self, now))]
    pub async fn toggle_completion(&self, task_id: &str, now: DateTime<Utc>) -> anyhow::Result<Task> {
        let task = self.snapshot(task_id)?;
        let delta = toggle_completion(&task, now);
        self.update(task_id, delta.to_patch()).await
    }

    #[instrument(skip(self))]
    pub async fn delete_task(&self, task_id: &str) -> anyhow::Result<()> {
        self.service
            .delete_task(task_id)
            .await
            .with_context(|| format!("failed to delete task {task_id}"))?;
        if let Some(task) = self.store.lock().task_mut(task_id) {
            task.deleted = true;
        }
        info!("task moved to trash");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn restore_task(&self, task_id: &str) -> anyhow::Result<Task> {
        let dto = self
            .service
            .restore_task(task_id)
            .await
            .with_context(|| format!("failed to restore task {task_id}"))?;
        self.merge(dto)
    }

    #[instrument(skip(self))]
    pub async fn permanently_delete_task(&self, task_id: &str) -> anyhow::Result<()> {
        self.service
            .permanently_delete_task(task_id)
            .await
            .with_context(|| format!("failed to permanently delete task {task_id}"))?;
        self.store.lock().remove(task_id);
        info!("task permanently deleted");
        Ok(())
    }

    #[instrument(skip(self, create), fields(name = %create.name))]
    pub async fn create_project(&self, create: ProjectCreate) -> anyhow::Result<Project> {
        let dto = self
            .service
            .create_project(create)
            .await
            .context("failed to create project")?;
        let project = Project::try_from(dto)?;
        self.store.lock().upsert_project(project.clone());
        Ok(project)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_project(&self, project_id: &str, patch: ProjectPatch) -> anyhow::Result<Project> {
        let dto = self
            .service
            .update_project(project_id, patch)
            .await
            .with_context(|| format!("failed to update project {project_id}"))?;
        let project = Project::try_from(dto)?;
        self.store.lock().upsert_project(project.clone());
        Ok(project)
    }

    /// Deletes the project, then detaches every task that referenced it,
    /// both locally and on the service. Returns the detached task ids.
    #[instrument(skip(self))]
    pub async fn delete_project(&self, project_id: &str) -> anyhow::Result<Vec<String>> {
        self.service
            .delete_project(project_id)
            .await
            .with_context(|| format!("failed to delete project {project_id}"))?;

        let cleared = {
            let mut store = self.store.lock();
            store.remove_project(project_id);
            store.clear_project_refs(project_id)
        };

        let mut failures = 0usize;
        for task_id in &cleared {
            let patch = TaskPatch {
                project_id: Some(None),
                ..TaskPatch::default()
            };
            if let Err(err) = self.update(task_id, patch).await {
                warn!(task_id = %task_id, error = %format!("{err:#}"), "failed to detach task from deleted project");
                failures += 1;
            }
        }
        if failures > 0 {
            return Err(anyhow!(
                "project {project_id} deleted but {failures} of {} tasks could not be detached",
                cleared.len()
            ));
        }

        info!(detached = cleared.len(), "project deleted");
        Ok(cleared)
    }

    fn snapshot(&self, task_id: &str) -> anyhow::Result<Task> {
        self.store
            .lock()
            .task(task_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown task: {task_id}"))
    }

    async fn update(&self, task_id: &str, patch: TaskPatch) -> anyhow::Result<Task> {
        let dto = self
            .service
            .update_task(task_id, patch)
            .await
            .with_context(|| format!("failed to update task {task_id}"))?;
        self.merge(dto)
    }

    fn merge(&self, dto: dayboard_shared::TaskDto) -> anyhow::Result<Task> {
        let task = Task::try_from(dto)?;
        self.store.lock().merge_server(task.clone());
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use dayboard_shared::{ProjectCreate, ProjectPatch, TaskCreate};

    use super::TaskActions;
    use crate::service::{InMemoryTaskService, TaskService};
    use crate::store::TaskStore;
    use crate::task::{Status, View};

    fn actions() -> (TaskActions, Arc<InMemoryTaskService>, crate::store::SharedStore) {
        let service = Arc::new(InMemoryTaskService::new());
        let store = TaskStore::new().into_shared();
        let actions = TaskActions::new(service.clone(), Arc::clone(&store));
        (actions, service, store)
    }

    fn create(title: &str) -> TaskCreate {
        TaskCreate {
            title: title.to_string(),
            ..TaskCreate::default()
        }
    }

    #[tokio::test]
    async fn refresh_replaces_the_store() {
        let (actions, service, store) = actions();
        service.create_task(create("one")).await.expect("create");
        service.create_task(create("two")).await.expect("create");

        assert!(!store.lock().is_loaded());
        assert_eq!(actions.refresh().await.expect("refresh"), 2);
        assert!(store.lock().is_loaded());
        assert_eq!(store.lock().tasks().len(), 2);
    }

    #[tokio::test]
    async fn toggle_completion_round_trips() {
        let (actions, _, store) = actions();
        let task = actions.create_task(create("pay rent")).await.expect("create");
        let now = Utc::now();

        let done = actions.toggle_completion(&task.id, now).await.expect("toggle");
        assert_eq!(done.status, Status::Done);
        let completed_at = done.completed_at.expect("completion stamp");
        assert!((completed_at - now).num_milliseconds().abs() < 1000);

        let reopened = actions.toggle_completion(&task.id, now).await.expect("toggle");
        assert_eq!(reopened.status, Status::Todo);
        assert!(reopened.completed_at.is_none());
        assert_eq!(store.lock().task(&task.id).expect("task").status, Status::Todo);
    }

    #[tokio::test]
    async fn trash_restore_and_purge() {
        let (actions, service, store) = actions();
        let task = actions.create_task(create("old idea")).await.expect("create");
        let today = Utc::now().date_naive();

        actions.delete_task(&task.id).await.expect("delete");
        assert_eq!(store.lock().visible(&View::Trash, today).len(), 1);

        let restored = actions.restore_task(&task.id).await.expect("restore");
        assert!(!restored.deleted);
        assert!(store.lock().visible(&View::Trash, today).is_empty());

        actions.permanently_delete_task(&task.id).await.expect("purge");
        assert!(store.lock().task(&task.id).is_none());
        assert!(service.task(&task.id).is_none());
    }

    #[tokio::test]
    async fn deleting_a_project_detaches_its_tasks() {
        let (actions, service, store) = actions();
        let project = actions
            .create_project(ProjectCreate {
                name: "Garden".to_string(),
                color: None,
            })
            .await
            .expect("project");
        let mut in_project = create("plant tulips");
        in_project.project_id = Some(project.id.clone());
        let task = actions.create_task(in_project).await.expect("create");
        let loose = actions.create_task(create("call mum")).await.expect("create");

        let cleared = actions.delete_project(&project.id).await.expect("delete");
        assert_eq!(cleared, vec![task.id.clone()]);
        assert!(store.lock().project(&project.id).is_none());
        assert!(store.lock().task(&task.id).expect("task").project_id.is_none());
        assert!(service.task(&task.id).expect("remote").project_id.is_none());
        assert!(store.lock().task(&loose.id).is_some());
    }

    #[tokio::test]
    async fn renaming_a_project_updates_the_store() {
        let (actions, _, store) = actions();
        let project = actions
            .create_project(ProjectCreate {
                name: "Hous".to_string(),
                color: Some("#aa3300".to_string()),
            })
            .await
            .expect("project");

        let renamed = actions
            .update_project(
                &project.id,
                ProjectPatch {
                    name: Some("House".to_string()),
                    color: Some(None),
                },
            )
            .await
            .expect("rename");
        assert_eq!(renamed.name, "House");
        assert!(renamed.color.is_none());
        assert_eq!(store.lock().project(&project.id).expect("stored").name, "House");
        assert_eq!(store.lock().projects().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tasks_surface_errors() {
        let (actions, _, _) = actions();
        let err = actions
            .toggle_completion("missing", Utc::now())
            .await
            .expect_err("unknown");
        assert!(err.to_string().contains("unknown task"));
        assert!(actions.delete_task("missing").await.is_err());
    }
}
