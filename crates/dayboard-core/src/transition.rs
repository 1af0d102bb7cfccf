//! Status machine: maps a (task, drop target) pair to the field delta the
//! drop implies.
//!
//! This is a total function. No target is refused; the UI is the only place
//! that could keep a task out of a bucket.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use dayboard_shared::TaskPatch;

use crate::config::Config;
use crate::datetime::{format_timestamp, format_wire_datetime, local_now, place_at_hour, place_on_date};
use crate::target::{Bucket, DropTarget};
use crate::task::{Status, Task};

/// Field changes produced by a transition. `None` means untouched; for the
/// nullable fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDelta {
    pub status: Option<Status>,
    pub project_id: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDateTime>>,
    pub archived: Option<bool>,
    pub starred: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.status.is_some() {
            names.push("status");
        }
        if self.project_id.is_some() {
            names.push("project_id");
        }
        if self.due_date.is_some() {
            names.push("due_date");
        }
        if self.archived.is_some() {
            names.push("archived");
        }
        if self.starred.is_some() {
            names.push("starred");
        }
        if self.completed_at.is_some() {
            names.push("completed_at");
        }
        names
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(project_id) = &self.project_id {
            task.project_id = project_id.clone();
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(archived) = self.archived {
            task.archived = archived;
        }
        if let Some(starred) = self.starred {
            task.starred = starred;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
    }

    pub fn applied(&self, task: &Task) -> Task {
        let mut next = task.clone();
        self.apply_to(&mut next);
        next
    }

    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            status: self.status.map(Into::into),
            project_id: self.project_id.clone(),
            due_date: self.due_date.map(|due| due.map(format_wire_datetime)),
            archived: self.archived,
            starred: self.starred,
            completed_at: self.completed_at.map(|stamp| stamp.map(format_timestamp)),
            ..TaskPatch::default()
        }
    }
}

/// Clock and calendar settings a transition is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    /// `now` on the wall clock of the configured timezone.
    pub local_now: NaiveDateTime,
    pub default_due_time: NaiveTime,
    pub upcoming_days: i64,
}

impl TransitionContext {
    pub fn new(now: DateTime<Utc>, tz: &Tz, default_due_time: NaiveTime, upcoming_days: i64) -> Self {
        let local = local_now(tz, now);
        Self {
            now,
            local_now: local.with_nanosecond(0).unwrap_or(local),
            default_due_time,
            upcoming_days,
        }
    }

    pub fn from_config(cfg: &Config, now: DateTime<Utc>) -> Self {
        Self::new(
            now,
            &cfg.time.timezone,
            cfg.calendar.default_time,
            cfg.calendar.upcoming_days,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Update(TaskDelta),
    /// Place the task near `anchor`. Nothing durable backs this yet.
    Reorder { anchor: String },
}

pub fn transition(task: &Task, target: &DropTarget, ctx: &TransitionContext) -> Transition {
    let delta = match target {
        DropTarget::StatusBucket(bucket) => bucket_delta(*bucket, ctx),
        DropTarget::ProjectBucket(project) => TaskDelta {
            project_id: Some(project.project_id().map(str::to_string)),
            ..TaskDelta::default()
        },
        DropTarget::CalendarDate(date) => calendar_delta(
            task,
            place_on_date(task.due_date, *date, ctx.default_due_time),
        ),
        DropTarget::CalendarHour(date, hour) => calendar_delta(task, place_at_hour(*date, *hour)),
        DropTarget::ListPosition(anchor) => {
            return Transition::Reorder {
                anchor: anchor.clone(),
            };
        }
    };
    Transition::Update(delta)
}

/// Snapshot of `task` after dropping it on `target`.
pub fn apply_transition(task: &Task, target: &DropTarget, ctx: &TransitionContext) -> Task {
    match transition(task, target, ctx) {
        Transition::Update(delta) => delta.applied(task),
        Transition::Reorder { .. } => task.clone(),
    }
}

/// Checkbox toggle, separate from drops: done <-> todo.
pub fn toggle_completion(task: &Task, now: DateTime<Utc>) -> TaskDelta {
    if task.status.is_done() {
        TaskDelta {
            status: Some(Status::Todo),
            completed_at: Some(None),
            ..TaskDelta::default()
        }
    } else {
        TaskDelta {
            status: Some(Status::Done),
            completed_at: Some(Some(now)),
            ..TaskDelta::default()
        }
    }
}

fn bucket_delta(bucket: Bucket, ctx: &TransitionContext) -> TaskDelta {
    match bucket {
        Bucket::Waiting => TaskDelta {
            status: Some(Status::Waiting),
            ..TaskDelta::default()
        },
        Bucket::Scheduled => TaskDelta {
            status: Some(Status::Scheduled),
            ..TaskDelta::default()
        },
        Bucket::Completed => TaskDelta {
            status: Some(Status::Done),
            completed_at: Some(Some(ctx.now)),
            ..TaskDelta::default()
        },
        Bucket::Archived => TaskDelta {
            archived: Some(true),
            ..TaskDelta::default()
        },
        Bucket::Inbox => TaskDelta {
            status: Some(Status::Todo),
            ..TaskDelta::default()
        },
        Bucket::Today => TaskDelta {
            due_date: Some(Some(ctx.local_now)),
            ..TaskDelta::default()
        },
        Bucket::Upcoming => TaskDelta {
            due_date: Some(Some(upcoming_due(ctx))),
            ..TaskDelta::default()
        },
        Bucket::Starred => TaskDelta {
            starred: Some(true),
            ..TaskDelta::default()
        },
    }
}

/// Out-of-range windows fall back to the current local time.
fn upcoming_due(ctx: &TransitionContext) -> NaiveDateTime {
    Duration::try_days(ctx.upcoming_days)
        .and_then(|window| ctx.local_now.checked_add_signed(window))
        .unwrap_or(ctx.local_now)
}

fn calendar_delta(task: &Task, due: NaiveDateTime) -> TaskDelta {
    TaskDelta {
        due_date: Some(Some(due)),
        status: (task.status == Status::Scheduled).then_some(Status::Todo),
        ..TaskDelta::default()
    }
}
