//! Drag lifecycle: one session per pointer, driven through the coordinator.
//!
//! A drop is committed in three steps: the task's next state is computed,
//! applied to the store right away, then sent to the service in the
//! background. A failed send is logged and the local state stays as is.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::collision::resolve;
use crate::config::Config;
use crate::dispatch::{DispatchHandle, MutationDispatcher};
use crate::store::SharedStore;
use crate::target::{Catalog, DropTarget, Rect, TargetError};
use crate::transition::{TaskDelta, Transition, TransitionContext, transition};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a drag of task {0} is already in progress")]
    AlreadyActive(String),

    #[error("no drag in progress")]
    NotDragging,

    #[error("drag ended for task {ended} while task {active} was being dragged")]
    TaskMismatch { active: String, ended: String },

    #[error(transparent)]
    Target(#[from] TargetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dragging,
    Committing,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum SessionState {
    #[default]
    Idle,
    Dragging {
        task_id: String,
        over: Option<DropTarget>,
    },
    Committing {
        task_id: String,
    },
}

/// State of one pointer's drag. Only the coordinator mutates it.
#[derive(Debug, Default)]
pub struct DragSession {
    state: SessionState,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Idle => Phase::Idle,
            SessionState::Dragging { .. } => Phase::Dragging,
            SessionState::Committing { .. } => Phase::Committing,
        }
    }

    pub fn active_task(&self) -> Option<&str> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Dragging { task_id, .. } | SessionState::Committing { task_id } => {
                Some(task_id)
            }
        }
    }

    /// The target currently highlighted under the pointer.
    pub fn highlighted(&self) -> Option<&DropTarget> {
        match &self.state {
            SessionState::Dragging { over, .. } => over.as_ref(),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
    }
}

#[derive(Debug)]
pub enum DragOutcome {
    /// The delta is applied locally and on its way to the service.
    Dispatched {
        task_id: String,
        target: DropTarget,
        delta: TaskDelta,
        handle: DispatchHandle,
    },
    /// Dropped on another task row. There is no persisted order to update.
    ReorderIgnored { task_id: String, anchor: String },
    /// Released over nothing, over itself, or the task vanished.
    Cancelled,
}

impl DragOutcome {
    pub fn into_handle(self) -> Option<DispatchHandle> {
        match self {
            Self::Dispatched { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

pub struct DragCoordinator {
    store: SharedStore,
    dispatcher: MutationDispatcher,
    config: Config,
    clock: fn() -> DateTime<Utc>,
}

impl DragCoordinator {
    pub fn new(store: SharedStore, dispatcher: MutationDispatcher, config: Config) -> Self {
        Self {
            store,
            dispatcher,
            config,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn context(&self) -> TransitionContext {
        TransitionContext::from_config(&self.config, (self.clock)())
    }

    #[instrument(skip(self, session))]
    pub fn start(&self, session: &mut DragSession, task_id: &str) -> Result<(), SessionError> {
        if let Some(active) = session.active_task() {
            return Err(SessionError::AlreadyActive(active.to_string()));
        }
        session.state = SessionState::Dragging {
            task_id: task_id.to_string(),
            over: None,
        };
        debug!("drag started");
        Ok(())
    }

    /// Re-resolves the target under `pointer` and records it as the
    /// highlight.
    pub fn over<'s>(
        &self,
        session: &'s mut DragSession,
        pointer: &Rect,
        catalog: &Catalog,
    ) -> Result<Option<&'s DropTarget>, SessionError> {
        let SessionState::Dragging { task_id, over } = &mut session.state else {
            return Err(SessionError::NotDragging);
        };
        let resolved = resolve(pointer, catalog);
        if *over != resolved {
            let label = resolved
                .as_ref()
                .map_or_else(|| "none".to_string(), ToString::to_string);
            debug!(task_id = %task_id, target = %label, "drag target changed");
            *over = resolved;
        }
        Ok(over.as_ref())
    }

    /// Ends the drag on `target`, or cancels it when there is none.
    #[instrument(skip(self, session, target), fields(target = ?target.as_ref().map(ToString::to_string)))]
    pub fn end(
        &self,
        session: &mut DragSession,
        task_id: &str,
        target: Option<DropTarget>,
    ) -> Result<DragOutcome, SessionError> {
        match session.active_task() {
            None => return Err(SessionError::NotDragging),
            Some(active) if active != task_id => {
                let err = SessionError::TaskMismatch {
                    active: active.to_string(),
                    ended: task_id.to_string(),
                };
                session.reset();
                return Err(err);
            }
            Some(_) => {}
        }

        session.state = SessionState::Committing {
            task_id: task_id.to_string(),
        };
        let outcome = match target {
            Some(target) => self.commit(task_id, target),
            None => {
                debug!("drag released over no target");
                DragOutcome::Cancelled
            }
        };
        session.reset();
        Ok(outcome)
    }

    /// Ends the drag on whatever `over` last highlighted.
    pub fn release(
        &self,
        session: &mut DragSession,
        task_id: &str,
    ) -> Result<DragOutcome, SessionError> {
        let target = session.highlighted().cloned();
        self.end(session, task_id, target)
    }

    /// Entry point for the view layer, which reports targets by id.
    pub fn on_drag_end(
        &self,
        session: &mut DragSession,
        task_id: &str,
        target_id: Option<&str>,
    ) -> Result<DragOutcome, SessionError> {
        if session.active_task().is_none() {
            return Err(SessionError::NotDragging);
        }
        let target = match target_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => match id.parse::<DropTarget>() {
                Ok(target) => Some(target),
                Err(err) => {
                    warn!(target_id = %id, error = %err, "unreadable drop target; cancelling drag");
                    session.reset();
                    return Err(err.into());
                }
            },
            None => None,
        };
        self.end(session, task_id, target)
    }

    /// Same commit path as a drag, without pointer tracking.
    pub fn move_task(
        &self,
        session: &mut DragSession,
        task_id: &str,
        target: DropTarget,
    ) -> Result<DragOutcome, SessionError> {
        self.start(session, task_id)?;
        self.end(session, task_id, Some(target))
    }

    pub fn cancel(&self, session: &mut DragSession) {
        if let Some(task_id) = session.active_task() {
            debug!(task_id = %task_id, "drag cancelled");
        }
        session.reset();
    }

    fn commit(&self, task_id: &str, target: DropTarget) -> DragOutcome {
        let Some(task) = self.store.lock().task(task_id).cloned() else {
            warn!(task_id = %task_id, "dragged task is not in the store; ignoring drop");
            return DragOutcome::Cancelled;
        };

        let delta = match transition(&task, &target, &self.context()) {
            Transition::Update(delta) => delta,
            Transition::Reorder { anchor } if anchor == task_id => {
                debug!("dropped onto itself");
                return DragOutcome::Cancelled;
            }
            Transition::Reorder { anchor } => {
                warn!(
                    task_id = %task_id,
                    anchor = %anchor,
                    "list reordering is not persisted; ignoring drop"
                );
                return DragOutcome::ReorderIgnored {
                    task_id: task_id.to_string(),
                    anchor,
                };
            }
        };

        self.store.lock().apply_delta(task_id, &delta);
        info!(task_id = %task_id, target = %target, "drop committed");
        let handle = self.dispatcher.dispatch(task_id, &delta);
        DragOutcome::Dispatched {
            task_id: task_id.to_string(),
            target,
            delta,
            handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use tokio::runtime::Handle;

    use super::{DragCoordinator, DragOutcome, DragSession, Phase, SessionError};
    use crate::config::Config;
    use crate::dispatch::MutationDispatcher;
    use crate::service::InMemoryTaskService;
    use crate::store::{SharedStore, TaskStore};
    use crate::target::{Bucket, Catalog, DropTarget, Rect, TargetError};
    use crate::task::{Status, Task};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
            .single()
            .expect("valid now")
    }

    fn setup(tasks: Vec<Task>) -> (DragCoordinator, SharedStore) {
        let service = Arc::new(InMemoryTaskService::with_records(
            tasks.iter().map(Into::into).collect(),
            vec![],
        ));
        let store = TaskStore::new().into_shared();
        store.lock().replace_all(tasks, vec![]);
        let dispatcher = MutationDispatcher::new(service, Arc::clone(&store), Handle::current());
        let coordinator = DragCoordinator::new(Arc::clone(&store), dispatcher, Config::default())
            .with_clock(fixed_now);
        (coordinator, store)
    }

    #[tokio::test]
    async fn one_drag_at_a_time() {
        let (coordinator, _) = setup(vec![Task::new_todo("a", "a", fixed_now())]);
        let mut session = DragSession::new();

        coordinator.start(&mut session, "a").expect("start");
        assert_eq!(session.phase(), Phase::Dragging);
        assert_eq!(
            coordinator.start(&mut session, "b"),
            Err(SessionError::AlreadyActive("a".to_string()))
        );

        coordinator.cancel(&mut session);
        assert_eq!(session.phase(), Phase::Idle);
        assert!(matches!(
            coordinator.end(&mut session, "a", None),
            Err(SessionError::NotDragging)
        ));
    }

    #[tokio::test]
    async fn over_tracks_the_highlight_and_release_commits_it() {
        let (coordinator, store) = setup(vec![Task::new_todo("a", "a", fixed_now())]);
        let mut catalog = Catalog::new();
        catalog.register(
            DropTarget::StatusBucket(Bucket::Waiting),
            Rect::new(0.0, 0.0, 100.0, 40.0),
        );
        let mut session = DragSession::new();
        coordinator.start(&mut session, "a").expect("start");

        let away = Rect::new(500.0, 500.0, 10.0, 10.0);
        assert_eq!(coordinator.over(&mut session, &away, &catalog), Ok(None));

        let on_waiting = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(
            coordinator.over(&mut session, &on_waiting, &catalog),
            Ok(Some(&DropTarget::StatusBucket(Bucket::Waiting)))
        );

        let outcome = coordinator.release(&mut session, "a").expect("release");
        assert!(matches!(outcome, DragOutcome::Dispatched { .. }));
        assert_eq!(store.lock().task("a").expect("task").status, Status::Waiting);
        assert_eq!(session.phase(), Phase::Idle);

        let report = outcome.into_handle().expect("handle").settled().await;
        assert!(report.is_applied());
    }

    #[tokio::test]
    async fn mismatched_end_resets_the_session() {
        let (coordinator, _) = setup(vec![Task::new_todo("a", "a", fixed_now())]);
        let mut session = DragSession::new();
        coordinator.start(&mut session, "a").expect("start");

        let err = coordinator
            .end(&mut session, "b", Some(DropTarget::StatusBucket(Bucket::Today)))
            .expect_err("mismatch");
        assert_eq!(
            err,
            SessionError::TaskMismatch {
                active: "a".to_string(),
                ended: "b".to_string(),
            }
        );
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn unreadable_target_ids_cancel_the_drag() {
        let (coordinator, store) = setup(vec![Task::new_todo("a", "a", fixed_now())]);
        let mut session = DragSession::new();
        let idle = coordinator
            .on_drag_end(&mut session, "a", Some("status:someday"))
            .expect_err("no drag yet");
        assert_eq!(idle, SessionError::NotDragging);

        coordinator.start(&mut session, "a").expect("start");
        let err = coordinator
            .on_drag_end(&mut session, "a", Some("status:someday"))
            .expect_err("bad id");
        assert!(matches!(err, SessionError::Target(TargetError::UnknownBucket(_))));
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(store.lock().task("a").expect("task").status, Status::Todo);
    }

    #[tokio::test]
    async fn dropping_a_vanished_task_is_a_no_op() {
        let (coordinator, store) = setup(vec![]);
        let mut session = DragSession::new();
        let outcome = coordinator
            .move_task(&mut session, "gone", DropTarget::StatusBucket(Bucket::Completed))
            .expect("ended");
        assert!(matches!(outcome, DragOutcome::Cancelled));
        assert!(store.lock().tasks().is_empty());
    }

    #[tokio::test]
    async fn row_drops_do_not_mutate() {
        let (coordinator, store) = setup(vec![
            Task::new_todo("a", "a", fixed_now()),
            Task::new_todo("b", "b", fixed_now()),
        ]);
        let before = store.lock().task("a").cloned();
        let mut session = DragSession::new();

        let err = coordinator
            .on_drag_end(&mut session, "a", Some("task:b"))
            .expect_err("not dragging");
        assert_eq!(err, SessionError::NotDragging);

        coordinator.start(&mut session, "a").expect("start");
        let outcome = coordinator
            .on_drag_end(&mut session, "a", Some("task:b"))
            .expect("ended");
        assert!(matches!(
            outcome,
            DragOutcome::ReorderIgnored { ref anchor, .. } if anchor == "b"
        ));

        let outcome = coordinator
            .move_task(&mut session, "a", DropTarget::ListPosition("a".to_string()))
            .expect("ended");
        assert!(matches!(outcome, DragOutcome::Cancelled));
        assert_eq!(store.lock().task("a").cloned(), before);
    }
}
