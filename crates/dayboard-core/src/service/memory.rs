use async_trait::async_trait;
use chrono::Utc;
use dayboard_shared::{ProjectCreate, ProjectDto, ProjectPatch, TaskCreate, TaskDto, TaskPatch};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{ServiceError, TaskService};
use crate::datetime::format_timestamp;

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<TaskDto>,
    projects: Vec<ProjectDto>,
}

/// Keeps records in process, assigning UUID ids and stamping `updated_at`
/// on every write like the real service does.
#[derive(Debug, Default)]
pub struct InMemoryTaskService {
    state: Mutex<MemoryState>,
}

impl InMemoryTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(tasks: Vec<TaskDto>, projects: Vec<ProjectDto>) -> Self {
        Self {
            state: Mutex::new(MemoryState { tasks, projects }),
        }
    }

    pub fn task(&self, id: &str) -> Option<TaskDto> {
        self.state.lock().tasks.iter().find(|task| task.id == id).cloned()
    }

    fn with_task<R>(
        &self,
        id: &str,
        edit: impl FnOnce(&mut TaskDto) -> R,
    ) -> Result<R, ServiceError> {
        let mut state = self.state.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))?;
        let result = edit(task);
        task.updated_at = now_stamp();
        Ok(result)
    }
}

fn now_stamp() -> String {
    format_timestamp(Utc::now())
}

fn apply_patch(task: &mut TaskDto, patch: TaskPatch) {
    if let Some(title) = patch.title {
        task.title = title;
    }
    if let Some(description) = patch.description {
        task.description = description;
    }
    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(project_id) = patch.project_id {
        task.project_id = project_id;
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    if let Some(tags) = patch.tags {
        task.tags = tags;
    }
    if let Some(starred) = patch.starred {
        task.starred = starred;
    }
    if let Some(archived) = patch.archived {
        task.archived = archived;
    }
    if let Some(completed_at) = patch.completed_at {
        task.completed_at = completed_at;
    }
}

#[async_trait]
impl TaskService for InMemoryTaskService {
    async fn list_tasks(&self) -> Result<Vec<TaskDto>, ServiceError> {
        Ok(self.state.lock().tasks.clone())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectDto>, ServiceError> {
        Ok(self.state.lock().projects.clone())
    }

    async fn create_task(&self, create: TaskCreate) -> Result<TaskDto, ServiceError> {
        let stamp = now_stamp();
        let task = TaskDto {
            id: Uuid::new_v4().to_string(),
            title: create.title,
            description: create.description,
            project_id: create.project_id,
            status: create.status,
            priority: create.priority,
            estimated_minutes: create.estimated_minutes,
            actual_minutes: 0,
            due_date: create.due_date,
            tags: create.tags,
            starred: false,
            archived: false,
            deleted: false,
            created_at: stamp.clone(),
            updated_at: stamp,
            completed_at: None,
        };
        debug!(task_id = %task.id, "in-memory task created");
        self.state.lock().tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<TaskDto, ServiceError> {
        self.with_task(id, |task| {
            apply_patch(task, patch);
        })?;
        self.task(id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.with_task(id, |task| task.deleted = true)
    }

    async fn restore_task(&self, id: &str) -> Result<TaskDto, ServiceError> {
        self.with_task(id, |task| task.deleted = false)?;
        self.task(id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))
    }

    async fn permanently_delete_task(&self, id: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let idx = state
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))?;
        state.tasks.remove(idx);
        Ok(())
    }

    async fn create_project(&self, create: ProjectCreate) -> Result<ProjectDto, ServiceError> {
        let stamp = now_stamp();
        let project = ProjectDto {
            id: Uuid::new_v4().to_string(),
            name: create.name,
            color: create.color,
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        self.state.lock().projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<ProjectDto, ServiceError> {
        let mut state = self.state.lock();
        let project = state
            .projects
            .iter_mut()
            .find(|project| project.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("project {id}")))?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(color) = patch.color {
            project.color = color;
        }
        project.updated_at = now_stamp();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let before = state.projects.len();
        state.projects.retain(|project| project.id != id);
        if state.projects.len() == before {
            return Err(ServiceError::NotFound(format!("project {id}")));
        }
        Ok(())
    }
}
