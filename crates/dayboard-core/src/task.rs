use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dayboard_shared::{ProjectDto, TaskDto, TaskPriority, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::datetime::{
    format_timestamp, format_wire_datetime, parse_timestamp, parse_wire_datetime,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Todo,
    InProgress,
    Waiting,
    Scheduled,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Scheduled => "scheduled",
            Self::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<TaskStatus> for Status {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Todo => Self::Todo,
            TaskStatus::InProgress => Self::InProgress,
            TaskStatus::Waiting => Self::Waiting,
            TaskStatus::Scheduled => Self::Scheduled,
            TaskStatus::Done => Self::Done,
        }
    }
}

impl From<Status> for TaskStatus {
    fn from(value: Status) -> Self {
        match value {
            Status::Todo => Self::Todo,
            Status::InProgress => Self::InProgress,
            Status::Waiting => Self::Waiting,
            Status::Scheduled => Self::Scheduled,
            Status::Done => Self::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl From<TaskPriority> for Priority {
    fn from(value: TaskPriority) -> Self {
        match value {
            TaskPriority::Low => Self::Low,
            TaskPriority::Medium => Self::Medium,
            TaskPriority::High => Self::High,
            TaskPriority::Urgent => Self::Urgent,
        }
    }
}

impl From<Priority> for TaskPriority {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Low => Self::Low,
            Priority::Medium => Self::Medium,
            Priority::High => Self::High,
            Priority::Urgent => Self::Urgent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Weak reference; the project may no longer exist.
    #[serde(default)]
    pub project_id: Option<String>,

    pub status: Status,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub estimated_minutes: u32,

    #[serde(default)]
    pub actual_minutes: u32,

    /// Wall-clock time in the configured timezone.
    #[serde(default)]
    pub due_date: Option<NaiveDateTime>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub starred: bool,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub deleted: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new_todo(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            project_id: None,
            status: Status::Todo,
            priority: Priority::Medium,
            estimated_minutes: 0,
            actual_minutes: 0,
            due_date: None,
            tags: BTreeSet::new(),
            starred: false,
            archived: false,
            deleted: false,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_visible_in(&self, view: &View, today: NaiveDate) -> bool {
        if matches!(view, View::Trash) {
            return self.deleted;
        }
        if self.deleted {
            return false;
        }
        if self.archived && !matches!(view, View::Archived | View::Completed) {
            return false;
        }

        let due_day = self.due_date.map(|due| due.date());
        match view {
            View::All => true,
            View::Inbox => self.status == Status::Todo,
            View::Today => !self.status.is_done() && due_day == Some(today),
            View::Upcoming => !self.status.is_done() && due_day.is_some_and(|day| day > today),
            View::Waiting => self.status == Status::Waiting,
            View::Scheduled => self.status == Status::Scheduled,
            View::Completed => self.status.is_done(),
            View::Archived => self.archived,
            View::Starred => self.starred,
            View::Project(project_id) => self.project_id.as_deref() == Some(project_id.as_str()),
            View::Trash => self.deleted,
        }
    }
}

impl TryFrom<TaskDto> for Task {
    type Error = anyhow::Error;

    fn try_from(dto: TaskDto) -> Result<Self, Self::Error> {
        let due_date = dto
            .due_date
            .as_deref()
            .map(parse_wire_datetime)
            .transpose()
            .with_context(|| format!("task {} has an invalid due_date", dto.id))?;
        let created_at = parse_timestamp(&dto.created_at)
            .with_context(|| format!("task {} has an invalid created_at", dto.id))?;
        let updated_at = parse_timestamp(&dto.updated_at)
            .with_context(|| format!("task {} has an invalid updated_at", dto.id))?;
        let completed_at = dto
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .with_context(|| format!("task {} has an invalid completed_at", dto.id))?;

        Ok(Self {
            id: dto.id,
            title: dto.title,
            description: dto.description,
            project_id: dto.project_id,
            status: dto.status.into(),
            priority: dto.priority.into(),
            estimated_minutes: dto.estimated_minutes,
            actual_minutes: dto.actual_minutes,
            due_date,
            tags: dto.tags.into_iter().collect(),
            starred: dto.starred,
            archived: dto.archived,
            deleted: dto.deleted,
            created_at,
            updated_at,
            completed_at,
        })
    }
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            project_id: task.project_id.clone(),
            status: task.status.into(),
            priority: task.priority.into(),
            estimated_minutes: task.estimated_minutes,
            actual_minutes: task.actual_minutes,
            due_date: task.due_date.map(format_wire_datetime),
            tags: task.tags.iter().cloned().collect(),
            starred: task.starred,
            archived: task.archived,
            deleted: task.deleted,
            created_at: format_timestamp(task.created_at),
            updated_at: format_timestamp(task.updated_at),
            completed_at: task.completed_at.map(format_timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectDto> for Project {
    type Error = anyhow::Error;

    fn try_from(dto: ProjectDto) -> Result<Self, Self::Error> {
        let created_at = parse_timestamp(&dto.created_at)
            .with_context(|| format!("project {} has an invalid created_at", dto.id))?;
        let updated_at = parse_timestamp(&dto.updated_at)
            .with_context(|| format!("project {} has an invalid updated_at", dto.id))?;
        Ok(Self {
            id: dto.id,
            name: dto.name,
            color: dto.color,
            created_at,
            updated_at,
        })
    }
}

impl From<&Project> for ProjectDto {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            color: project.color.clone(),
            created_at: format_timestamp(project.created_at),
            updated_at: format_timestamp(project.updated_at),
        }
    }
}

/// A read-side slice of the task list, one per sidebar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    All,
    Inbox,
    Today,
    Upcoming,
    Waiting,
    Scheduled,
    Completed,
    Archived,
    Starred,
    Project(String),
    Trash,
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(project_id) = trimmed.strip_prefix("project:") {
            if project_id.is_empty() {
                return Err(anyhow!("project view needs a project id"));
            }
            return Ok(Self::Project(project_id.to_string()));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "inbox" => Ok(Self::Inbox),
            "today" => Ok(Self::Today),
            "upcoming" => Ok(Self::Upcoming),
            "waiting" => Ok(Self::Waiting),
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            "starred" => Ok(Self::Starred),
            "trash" => Ok(Self::Trash),
            other => Err(anyhow!("unknown view: {other}")),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Inbox => f.write_str("inbox"),
            Self::Today => f.write_str("today"),
            Self::Upcoming => f.write_str("upcoming"),
            Self::Waiting => f.write_str("waiting"),
            Self::Scheduled => f.write_str("scheduled"),
            Self::Completed => f.write_str("completed"),
            Self::Archived => f.write_str("archived"),
            Self::Starred => f.write_str("starred"),
            Self::Project(project_id) => write!(f, "project:{project_id}"),
            Self::Trash => f.write_str("trash"),
        }
    }
}
