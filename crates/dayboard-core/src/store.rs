use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::task::{Project, Task, View};
use crate::transition::TaskDelta;

/// The store as shared between the interaction layer and dispatch
/// completions. Locks are held only for synchronous edits.
pub type SharedStore = Arc<Mutex<TaskStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    /// The stored copy came from a newer server response.
    Stale,
    /// The task left the store while the request was in flight.
    Missing,
}

/// In-memory tasks and projects for the current page.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    projects: Vec<Project>,
    loaded: bool,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[instrument(skip(self, tasks, projects), fields(tasks = tasks.len(), projects = projects.len()))]
    pub fn replace_all(&mut self, tasks: Vec<Task>, projects: Vec<Project>) {
        self.tasks = tasks;
        self.projects = projects;
        self.loaded = true;
        info!("task store refreshed");
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    pub fn visible(&self, view: &View, today: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.is_visible_in(view, today))
            .collect()
    }

    /// Applies `delta` locally ahead of the server. Returns the new snapshot.
    #[instrument(skip(self, delta), fields(fields = ?delta.field_names()))]
    pub fn apply_delta(&mut self, id: &str, delta: &TaskDelta) -> Option<Task> {
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        delta.apply_to(task);
        debug!("applied optimistic delta");
        Some(task.clone())
    }

    /// Folds a server record in. The freshest `updated_at` wins, so a late
    /// response to an earlier write cannot overwrite a later one.
    #[instrument(skip(self, task), fields(task_id = %task.id, updated_at = %task.updated_at))]
    pub fn merge_server(&mut self, task: Task) -> MergeOutcome {
        match self.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) if existing.updated_at > task.updated_at => {
                debug!(stored = %existing.updated_at, "discarding stale server record");
                MergeOutcome::Stale
            }
            Some(existing) => {
                *existing = task;
                MergeOutcome::Replaced
            }
            None => {
                self.tasks.push(task);
                MergeOutcome::Inserted
            }
        }
    }

    /// Like [`merge_server`](Self::merge_server) but never inserts.
    pub fn merge_existing(&mut self, task: Task) -> MergeOutcome {
        if self.task(&task.id).is_none() {
            debug!(task_id = %task.id, "task is gone; dropping server record");
            return MergeOutcome::Missing;
        }
        self.merge_server(task)
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let idx = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn upsert_project(&mut self, project: Project) {
        match self.projects.iter_mut().find(|existing| existing.id == project.id) {
            Some(existing) => *existing = project,
            None => self.projects.push(project),
        }
    }

    pub fn remove_project(&mut self, id: &str) -> Option<Project> {
        let idx = self.projects.iter().position(|project| project.id == id)?;
        Some(self.projects.remove(idx))
    }

    /// Clears `project_id` on every task pointing at `project_id`; returns
    /// the ids that changed.
    #[instrument(skip(self))]
    pub fn clear_project_refs(&mut self, project_id: &str) -> Vec<String> {
        let mut cleared = Vec::new();
        for task in self
            .tasks
            .iter_mut()
            .filter(|task| task.project_id.as_deref() == Some(project_id))
        {
            task.project_id = None;
            cleared.push(task.id.clone());
        }
        debug!(count = cleared.len(), "cleared project references");
        cleared
    }
}
