//! The remote task service the engine mutates through.
//!
//! - `HttpTaskService`: the REST API over JSON
//! - `InMemoryTaskService`: in-process stand-in for tests

mod http;
mod memory;

use async_trait::async_trait;
use dayboard_shared::{ProjectCreate, ProjectDto, ProjectPatch, TaskCreate, TaskDto, TaskPatch};
use thiserror::Error;

pub use http::HttpTaskService;
pub use memory::InMemoryTaskService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<TaskDto>, ServiceError>;

    async fn list_projects(&self) -> Result<Vec<ProjectDto>, ServiceError>;

    async fn create_task(&self, create: TaskCreate) -> Result<TaskDto, ServiceError>;

    /// Applies any subset of fields; absent patch fields are left alone.
    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<TaskDto, ServiceError>;

    /// Soft delete.
    async fn delete_task(&self, id: &str) -> Result<(), ServiceError>;

    async fn restore_task(&self, id: &str) -> Result<TaskDto, ServiceError>;

    async fn permanently_delete_task(&self, id: &str) -> Result<(), ServiceError>;

    async fn create_project(&self, create: ProjectCreate) -> Result<ProjectDto, ServiceError>;

    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<ProjectDto, ServiceError>;

    /// Does not touch tasks that reference the project.
    async fn delete_project(&self, id: &str) -> Result<(), ServiceError>;
}
