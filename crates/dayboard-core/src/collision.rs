//! Picks the drop target a dragged task is over.
//!
//! Groups are tried in a fixed order and the first group with a hit wins:
//! sidebar buckets (status and project), calendar days, calendar hours, and
//! finally the nearest task row. Small sidebar and calendar regions would
//! otherwise lose to the large, always-present task list.

use serde::Serialize;

use crate::target::{Catalog, DropTarget, Rect, TargetKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityGroup {
    Sidebar,
    CalendarDate,
    CalendarHour,
    ListPosition,
}

impl PriorityGroup {
    pub const ORDER: [PriorityGroup; 4] = [
        PriorityGroup::Sidebar,
        PriorityGroup::CalendarDate,
        PriorityGroup::CalendarHour,
        PriorityGroup::ListPosition,
    ];

    pub fn of(kind: TargetKind) -> Self {
        match kind {
            TargetKind::StatusBucket | TargetKind::ProjectBucket => Self::Sidebar,
            TargetKind::CalendarDate => Self::CalendarDate,
            TargetKind::CalendarHour => Self::CalendarHour,
            TargetKind::ListPosition => Self::ListPosition,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sidebar => "sidebar",
            Self::CalendarDate => "calendar_date",
            Self::CalendarHour => "calendar_hour",
            Self::ListPosition => "list_position",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub target: DropTarget,
    /// Overlap area for the intersection groups, center distance for
    /// task rows.
    pub score: f64,
}

/// The winning group, ranked best first.
#[derive(Debug, Clone, PartialEq)]
pub struct Collisions {
    pub group: PriorityGroup,
    pub winner: Candidate,
    pub runners_up: Vec<Candidate>,
}

impl Collisions {
    pub fn resolved(&self) -> &DropTarget {
        &self.winner.target
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        std::iter::once(&self.winner).chain(self.runners_up.iter())
    }

    fn from_ranked(group: PriorityGroup, mut ranked: Vec<Candidate>) -> Option<Self> {
        if ranked.is_empty() {
            return None;
        }
        let winner = ranked.remove(0);
        Some(Self {
            group,
            winner,
            runners_up: ranked,
        })
    }
}

/// Runs the priority groups against `dragged`. `None` only when nothing
/// intersects and no task rows are registered.
pub fn detect_collisions(dragged: &Rect, catalog: &Catalog) -> Option<Collisions> {
    for group in PriorityGroup::ORDER {
        let ranked = match group {
            PriorityGroup::ListPosition => rank_by_distance(dragged, catalog),
            _ => rank_by_overlap(dragged, catalog, group),
        };
        if let Some(collisions) = Collisions::from_ranked(group, ranked) {
            return Some(collisions);
        }
    }
    None
}

pub fn resolve(dragged: &Rect, catalog: &Catalog) -> Option<DropTarget> {
    detect_collisions(dragged, catalog).map(|collisions| collisions.winner.target)
}

// Sorts are stable, so equal scores keep registration order.
fn rank_by_overlap(dragged: &Rect, catalog: &Catalog, group: PriorityGroup) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = catalog
        .iter()
        .filter(|entry| PriorityGroup::of(entry.target.kind()) == group)
        .filter_map(|entry| {
            let area = dragged.intersection_area(&entry.rect);
            (area > 0.0).then(|| Candidate {
                target: entry.target.clone(),
                score: area,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

fn rank_by_distance(dragged: &Rect, catalog: &Catalog) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = catalog
        .iter()
        .filter(|entry| entry.target.kind() == TargetKind::ListPosition)
        .map(|entry| Candidate {
            target: entry.target.clone(),
            score: dragged.center_distance(&entry.rect),
        })
        .collect();
    ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{PriorityGroup, detect_collisions, resolve};
    use crate::datetime::HourOfDay;
    use crate::target::{Bucket, Catalog, DropTarget, ProjectRef, Rect};

    fn row(id: &str) -> DropTarget {
        DropTarget::ListPosition(id.to_string())
    }

    fn day(d: u32) -> DropTarget {
        DropTarget::CalendarDate(NaiveDate::from_ymd_opt(2024, 3, d).expect("valid date"))
    }

    fn hour(h: u32) -> DropTarget {
        DropTarget::CalendarHour(
            NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date"),
            HourOfDay::new(h).expect("valid hour"),
        )
    }

    #[test]
    fn sidebar_beats_list_regardless_of_overlap() {
        let mut catalog = Catalog::new();
        catalog.register(row("t-1"), Rect::new(0.0, 0.0, 500.0, 500.0));
        catalog.register(
            DropTarget::StatusBucket(Bucket::Waiting),
            Rect::new(95.0, 95.0, 10.0, 10.0),
        );

        let dragged = Rect::new(0.0, 0.0, 100.0, 100.0);
        let collisions = detect_collisions(&dragged, &catalog).expect("collision");
        assert_eq!(collisions.group, PriorityGroup::Sidebar);
        assert_eq!(collisions.resolved(), &DropTarget::StatusBucket(Bucket::Waiting));
        assert_eq!(collisions.candidates().count(), 1);
    }

    #[test]
    fn largest_overlap_wins_inside_a_group() {
        let mut catalog = Catalog::new();
        let project = DropTarget::ProjectBucket(ProjectRef::Project("p-1".to_string()));
        catalog.register(
            DropTarget::StatusBucket(Bucket::Starred),
            Rect::new(0.0, 0.0, 100.0, 20.0),
        );
        catalog.register(project.clone(), Rect::new(0.0, 20.0, 100.0, 20.0));

        let dragged = Rect::new(0.0, 15.0, 100.0, 20.0);
        let collisions = detect_collisions(&dragged, &catalog).expect("collision");
        assert_eq!(collisions.resolved(), &project);
        assert_eq!(collisions.winner.score, 1500.0);
        assert_eq!(collisions.runners_up.len(), 1);
        assert_eq!(collisions.runners_up[0].score, 500.0);
    }

    #[test]
    fn equal_overlap_falls_back_to_registration_order() {
        let mut catalog = Catalog::new();
        catalog.register(day(11), Rect::new(0.0, 0.0, 10.0, 10.0));
        catalog.register(day(12), Rect::new(10.0, 0.0, 10.0, 10.0));

        let dragged = Rect::new(5.0, 0.0, 10.0, 10.0);
        assert_eq!(resolve(&dragged, &catalog), Some(day(11)));
    }

    #[test]
    fn groups_are_tried_in_priority_order() {
        let mut catalog = Catalog::new();
        catalog.register(row("t-1"), Rect::new(0.0, 0.0, 400.0, 400.0));
        catalog.register(hour(9), Rect::new(0.0, 0.0, 200.0, 200.0));
        catalog.register(day(10), Rect::new(150.0, 150.0, 20.0, 20.0));
        catalog.register(
            DropTarget::StatusBucket(Bucket::Inbox),
            Rect::new(300.0, 300.0, 20.0, 20.0),
        );

        let on_everything = Rect::new(0.0, 0.0, 400.0, 400.0);
        let found = detect_collisions(&on_everything, &catalog).expect("collision");
        assert_eq!(found.group, PriorityGroup::Sidebar);

        let on_calendar = Rect::new(0.0, 0.0, 180.0, 180.0);
        let found = detect_collisions(&on_calendar, &catalog).expect("collision");
        assert_eq!(found.group, PriorityGroup::CalendarDate);
        assert_eq!(found.resolved(), &day(10));

        let on_hours = Rect::new(0.0, 0.0, 50.0, 50.0);
        let found = detect_collisions(&on_hours, &catalog).expect("collision");
        assert_eq!(found.group, PriorityGroup::CalendarHour);
        assert_eq!(found.resolved(), &hour(9));
    }

    #[test]
    fn nearest_row_is_the_fallback() {
        let mut catalog = Catalog::new();
        catalog.register(
            DropTarget::StatusBucket(Bucket::Archived),
            Rect::new(0.0, 0.0, 50.0, 50.0),
        );
        catalog.register(row("far"), Rect::new(200.0, 400.0, 300.0, 40.0));
        catalog.register(row("near"), Rect::new(200.0, 100.0, 300.0, 40.0));

        // Touching the sidebar edge is not a hit.
        let dragged = Rect::new(50.0, 100.0, 100.0, 40.0);
        let found = detect_collisions(&dragged, &catalog).expect("collision");
        assert_eq!(found.group, PriorityGroup::ListPosition);
        assert_eq!(found.resolved(), &row("near"));
        assert_eq!(found.runners_up[0].target, row("far"));
    }

    #[test]
    fn nothing_registered_resolves_to_none() {
        let mut catalog = Catalog::new();
        let dragged = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(resolve(&dragged, &catalog), None);

        catalog.register(day(3), Rect::new(100.0, 100.0, 10.0, 10.0));
        assert_eq!(resolve(&dragged, &catalog), None);
    }
}
