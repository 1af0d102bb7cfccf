//! Drop targets and the per-render catalog that holds them.
//!
//! Presentational code registers a target (by value or by its textual id)
//! together with its on-screen rectangle whenever the region mounts, and
//! unregisters it on unmount. Textual ids are decoded exactly once here;
//! everything downstream matches on [`DropTarget`].

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datetime::HourOfDay;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("drop target id is empty")]
    Empty,
    #[error("drop target `{0}` has no payload")]
    MissingPayload(String),
    #[error("unknown drop target kind `{0}`")]
    UnknownKind(String),
    #[error("unknown status bucket `{0}`")]
    UnknownBucket(String),
    #[error("invalid calendar date `{0}`")]
    InvalidDate(String),
    #[error("invalid calendar hour `{0}`")]
    InvalidHour(String),
}

/// Sidebar smart lists a task can be dropped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Inbox,
    Today,
    Upcoming,
    Waiting,
    Scheduled,
    Completed,
    Archived,
    Starred,
}

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::Inbox,
        Bucket::Today,
        Bucket::Upcoming,
        Bucket::Waiting,
        Bucket::Scheduled,
        Bucket::Completed,
        Bucket::Archived,
        Bucket::Starred,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Today => "today",
            Self::Upcoming => "upcoming",
            Self::Waiting => "waiting",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Starred => "starred",
        }
    }
}

impl FromStr for Bucket {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| TargetError::UnknownBucket(s.to_string()))
    }
}

/// Payload of a project bucket; `Unassigned` is the "none" row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectRef {
    Project(String),
    Unassigned,
}

impl ProjectRef {
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Project(id) => Some(id.as_str()),
            Self::Unassigned => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DropTarget {
    StatusBucket(Bucket),
    ProjectBucket(ProjectRef),
    CalendarDate(NaiveDate),
    CalendarHour(NaiveDate, HourOfDay),
    /// Insert near this sibling task. Reordering only.
    ListPosition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    StatusBucket,
    ProjectBucket,
    CalendarDate,
    CalendarHour,
    ListPosition,
}

impl DropTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::StatusBucket(_) => TargetKind::StatusBucket,
            Self::ProjectBucket(_) => TargetKind::ProjectBucket,
            Self::CalendarDate(_) => TargetKind::CalendarDate,
            Self::CalendarHour(..) => TargetKind::CalendarHour,
            Self::ListPosition(_) => TargetKind::ListPosition,
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

impl FromStr for DropTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(TargetError::Empty);
        }

        let (kind, payload) = raw
            .split_once(':')
            .ok_or_else(|| TargetError::MissingPayload(raw.to_string()))?;
        if payload.is_empty() {
            return Err(TargetError::MissingPayload(raw.to_string()));
        }

        match kind {
            "status" => payload.parse().map(Self::StatusBucket),
            "project" => Ok(Self::ProjectBucket(if payload == "none" {
                ProjectRef::Unassigned
            } else {
                ProjectRef::Project(payload.to_string())
            })),
            "date" => NaiveDate::parse_from_str(payload, DATE_FORMAT)
                .map(Self::CalendarDate)
                .map_err(|_| TargetError::InvalidDate(payload.to_string())),
            "hour" => {
                let invalid = || TargetError::InvalidHour(payload.to_string());
                let (date_part, hour_part) = payload.split_once('T').ok_or_else(invalid)?;
                let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
                    .map_err(|_| TargetError::InvalidDate(date_part.to_string()))?;
                if hour_part.len() != 2 || !hour_part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let hour = hour_part
                    .parse::<u32>()
                    .ok()
                    .and_then(HourOfDay::new)
                    .ok_or_else(invalid)?;
                Ok(Self::CalendarHour(date, hour))
            }
            "task" => Ok(Self::ListPosition(payload.to_string())),
            other => Err(TargetError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusBucket(bucket) => write!(f, "status:{}", bucket.as_str()),
            Self::ProjectBucket(ProjectRef::Project(id)) => write!(f, "project:{id}"),
            Self::ProjectBucket(ProjectRef::Unassigned) => f.write_str("project:none"),
            Self::CalendarDate(date) => write!(f, "date:{}", date.format(DATE_FORMAT)),
            Self::CalendarHour(date, hour) => {
                write!(f, "hour:{}T{:02}", date.format(DATE_FORMAT), hour.get())
            }
            Self::ListPosition(task_id) => write!(f, "task:{task_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Overlap area; zero when the rectangles only touch or are disjoint.
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let overlap_w = self.right().min(other.right()) - self.x.max(other.x);
        let overlap_h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if overlap_w <= 0.0 || overlap_h <= 0.0 {
            0.0
        } else {
            overlap_w * overlap_h
        }
    }

    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTarget {
    pub target: DropTarget,
    pub rect: Rect,
}

/// What the UI mounts: the textual id plus the current rectangle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDescriptor {
    pub id: String,
    pub kind: TargetKind,
    pub rect: Rect,
}

/// Targets registered for the current render, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<RegisteredTarget>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `target`, or moves it to `rect` if already registered.
    /// A re-registered target keeps its original position in the order.
    pub fn register(&mut self, target: DropTarget, rect: Rect) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.target == target) {
            entry.rect = rect;
            return;
        }
        self.entries.push(RegisteredTarget { target, rect });
    }

    pub fn register_id(&mut self, id: &str, rect: Rect) -> Result<DropTarget, TargetError> {
        let target: DropTarget = id.parse()?;
        self.register(target.clone(), rect);
        Ok(target)
    }

    pub fn unregister(&mut self, target: &DropTarget) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.target != target);
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTarget> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptors(&self) -> Vec<TargetDescriptor> {
        self.entries
            .iter()
            .map(|entry| TargetDescriptor {
                id: entry.target.to_string(),
                kind: entry.target.kind(),
                rect: entry.rect,
            })
            .collect()
    }
}
