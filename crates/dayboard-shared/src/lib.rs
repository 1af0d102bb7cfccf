use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  #[default]
  Todo,
  InProgress,
  Waiting,
  Scheduled,
  Done
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
  Low,
  #[default]
  Medium,
  High,
  Urgent
}

/// A task record as served by the
/// task service.
///
/// `due_date` is local wall time
/// (`YYYY-MM-DDTHH:MM:SS`); the
/// `*_at` stamps are RFC 3339 UTC.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct TaskDto {
  pub id:                String,
  #[serde(default)]
  pub title:             String,
  #[serde(default)]
  pub description:       Option<String>,
  #[serde(default)]
  pub project_id:        Option<String>,
  #[serde(default)]
  pub status:            TaskStatus,
  #[serde(default)]
  pub priority:          TaskPriority,
  #[serde(default)]
  pub estimated_minutes: u32,
  #[serde(default)]
  pub actual_minutes:    u32,
  #[serde(default)]
  pub due_date:          Option<String>,
  #[serde(default)]
  pub tags:              Vec<String>,
  #[serde(default)]
  pub starred:           bool,
  #[serde(default)]
  pub archived:          bool,
  #[serde(default)]
  pub deleted:           bool,
  pub created_at:        String,
  pub updated_at:        String,
  #[serde(default)]
  pub completed_at:      Option<String>
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
)]
pub struct TaskCreate {
  pub title:             String,
  pub description:       Option<String>,
  pub project_id:        Option<String>,
  #[serde(default)]
  pub status:            TaskStatus,
  #[serde(default)]
  pub priority:          TaskPriority,
  #[serde(default)]
  pub estimated_minutes: u32,
  pub due_date:          Option<String>,
  #[serde(default)]
  pub tags:              Vec<String>
}

/// Partial update for `PATCH
/// /tasks/{id}`.
///
/// Absent fields are left alone by
/// the service. Nullable fields are
/// tri-state: `None` is absent,
/// `Some(None)` is an explicit `null`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:        Option<String>,
  #[serde(
    default,
    deserialize_with = "nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub description:  Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub status:       Option<TaskStatus>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:     Option<TaskPriority>,
  #[serde(
    default,
    deserialize_with = "nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub project_id:   Option<Option<String>>,
  #[serde(
    default,
    deserialize_with = "nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:     Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub tags:         Option<Vec<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub starred:      Option<bool>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub archived:     Option<bool>,
  #[serde(
    default,
    deserialize_with = "nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub completed_at: Option<Option<String>>
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct ProjectDto {
  pub id:         String,
  #[serde(default)]
  pub name:       String,
  #[serde(default)]
  pub color:      Option<String>,
  pub created_at: String,
  pub updated_at: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ProjectCreate {
  pub name:  String,
  pub color: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct ProjectPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub name:  Option<String>,
  #[serde(
    default,
    deserialize_with = "nullable::deserialize",
    skip_serializing_if = "Option::is_none"
  )]
  pub color: Option<Option<String>>
}

/// Keeps an explicit `null` distinct
/// from a missing field.
pub mod nullable {
  use serde::{
    Deserialize,
    Deserializer
  };

  pub fn deserialize<'de, D, T>(
    deserializer: D
  ) -> Result<Option<Option<T>>, D::Error>
  where
    D: Deserializer<'de>,
    T: Deserialize<'de>
  {
    Option::<T>::deserialize(
      deserializer
    )
    .map(Some)
  }
}
