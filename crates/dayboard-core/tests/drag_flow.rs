use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use dayboard_core::config::Config;
use dayboard_core::dispatch::{DispatchReport, MutationDispatcher};
use dayboard_core::service::{InMemoryTaskService, ServiceError, TaskService};
use dayboard_core::session::{DragCoordinator, DragOutcome, DragSession};
use dayboard_core::store::{SharedStore, TaskStore};
use dayboard_core::target::{Catalog, Rect};
use dayboard_core::task::{Status, Task};
use dayboard_shared::{ProjectCreate, ProjectDto, ProjectPatch, TaskCreate, TaskDto, TaskPatch};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::runtime::Handle;

/// Records every patch before handing it to the in-memory service, or
/// rejects every update when `reject` is set.
struct RecordingService {
    inner: InMemoryTaskService,
    patches: Mutex<Vec<(String, Value)>>,
    reject: bool,
}

impl RecordingService {
    fn new(tasks: &[Task], reject: bool) -> Self {
        Self {
            inner: InMemoryTaskService::with_records(tasks.iter().map(Into::into).collect(), vec![]),
            patches: Mutex::new(Vec::new()),
            reject,
        }
    }

    fn last_patch(&self) -> Value {
        self.patches
            .lock()
            .last()
            .map(|(_, patch)| patch.clone())
            .expect("a patch was sent")
    }
}

#[async_trait]
impl TaskService for RecordingService {
    async fn list_tasks(&self) -> Result<Vec<TaskDto>, ServiceError> {
        self.inner.list_tasks().await
    }

    async fn list_projects(&self) -> Result<Vec<ProjectDto>, ServiceError> {
        self.inner.list_projects().await
    }

    async fn create_task(&self, create: TaskCreate) -> Result<TaskDto, ServiceError> {
        self.inner.create_task(create).await
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<TaskDto, ServiceError> {
        let body = serde_json::to_value(&patch).expect("patch serializes");
        self.patches.lock().push((id.to_string(), body));
        if self.reject {
            return Err(ServiceError::Rejected {
                status: 503,
                message: "maintenance".to_string(),
            });
        }
        self.inner.update_task(id, patch).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.inner.delete_task(id).await
    }

    async fn restore_task(&self, id: &str) -> Result<TaskDto, ServiceError> {
        self.inner.restore_task(id).await
    }

    async fn permanently_delete_task(&self, id: &str) -> Result<(), ServiceError> {
        self.inner.permanently_delete_task(id).await
    }

    async fn create_project(&self, create: ProjectCreate) -> Result<ProjectDto, ServiceError> {
        self.inner.create_project(create).await
    }

    async fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<ProjectDto, ServiceError> {
        self.inner.update_project(id, patch).await
    }

    async fn delete_project(&self, id: &str) -> Result<(), ServiceError> {
        self.inner.delete_project(id).await
    }
}

struct Harness {
    service: Arc<RecordingService>,
    store: SharedStore,
    coordinator: DragCoordinator,
}

fn harness(tasks: Vec<Task>, reject: bool) -> Harness {
    let service = Arc::new(RecordingService::new(&tasks, reject));
    let store = TaskStore::new().into_shared();
    store.lock().replace_all(tasks, vec![]);
    let dispatcher = MutationDispatcher::new(service.clone(), Arc::clone(&store), Handle::current());
    let coordinator = DragCoordinator::new(Arc::clone(&store), dispatcher, Config::default());
    Harness {
        service,
        store,
        coordinator,
    }
}

fn seeded(id: &str) -> Task {
    // Older than anything the service stamps, so confirmations replace it.
    Task::new_todo(id, format!("task {id}"), Utc::now() - Duration::hours(1))
}

async fn drop_on(h: &Harness, task_id: &str, target_id: &str) -> DispatchReport {
    let mut session = DragSession::new();
    h.coordinator.start(&mut session, task_id).expect("start");
    let outcome = h
        .coordinator
        .on_drag_end(&mut session, task_id, Some(target_id))
        .expect("drop");
    outcome
        .into_handle()
        .expect("drop was dispatched")
        .settled()
        .await
}

#[tokio::test]
async fn todo_dropped_on_scheduled_only_sends_status() {
    let h = harness(vec![seeded("t-1")], false);

    let report = drop_on(&h, "t-1", "status:scheduled").await;

    assert!(report.is_applied());
    assert_eq!(h.service.last_patch(), json!({"status": "scheduled"}));
    assert_eq!(h.store.lock().task("t-1").expect("task").status, Status::Scheduled);
}

#[tokio::test]
async fn scheduled_task_dropped_on_a_day_gets_default_time_and_reverts_to_todo() {
    let mut task = seeded("t-1");
    task.status = Status::Scheduled;
    let h = harness(vec![task], false);

    drop_on(&h, "t-1", "date:2024-03-10").await;

    assert_eq!(
        h.service.last_patch(),
        json!({"status": "todo", "due_date": "2024-03-10T09:00:00"})
    );
    let stored = h.store.lock().task("t-1").cloned().expect("task");
    assert_eq!(stored.status, Status::Todo);
    assert_eq!(
        stored.due_date,
        NaiveDate::from_ymd_opt(2024, 3, 10).and_then(|d| d.and_hms_opt(9, 0, 0))
    );
}

#[tokio::test]
async fn dropping_on_no_project_clears_the_reference() {
    let mut task = seeded("t-1");
    task.project_id = Some("A".to_string());
    let h = harness(vec![task], false);

    drop_on(&h, "t-1", "project:none").await;

    assert_eq!(h.service.last_patch(), json!({"project_id": null}));
    assert!(h.store.lock().task("t-1").expect("task").project_id.is_none());
}

#[tokio::test]
async fn completing_by_drop_stamps_the_current_instant() {
    let h = harness(vec![seeded("t-1")], false);

    let before = Utc::now();
    drop_on(&h, "t-1", "status:completed").await;

    let stored = h.store.lock().task("t-1").cloned().expect("task");
    assert_eq!(stored.status, Status::Done);
    let completed_at = stored.completed_at.expect("completion stamp");
    assert!((completed_at - before).num_milliseconds().abs() < 5_000);

    let patch = h.service.last_patch();
    assert_eq!(patch["status"], json!("done"));
    assert!(patch["completed_at"].is_string());
}

#[tokio::test]
async fn failed_updates_keep_the_optimistic_state() {
    let h = harness(vec![seeded("t-1")], true);

    let mut session = DragSession::new();
    h.coordinator.start(&mut session, "t-1").expect("start");
    let outcome = h
        .coordinator
        .on_drag_end(&mut session, "t-1", Some("status:starred"))
        .expect("drop");

    // Applied locally before the service answers.
    assert!(h.store.lock().task("t-1").expect("task").starred);

    let report = outcome.into_handle().expect("dispatched").settled().await;
    match report {
        DispatchReport::Failed { task_id, reason } => {
            assert_eq!(task_id, "t-1");
            assert!(reason.contains("503"), "{reason}");
        }
        other => panic!("expected a failed dispatch, got {other:?}"),
    }
    assert!(h.store.lock().task("t-1").expect("task").starred);
}

#[tokio::test]
async fn a_new_drag_can_start_while_an_update_is_in_flight() {
    let h = harness(vec![seeded("a"), seeded("b")], false);
    let mut session = DragSession::new();

    h.coordinator.start(&mut session, "a").expect("start a");
    let first = h
        .coordinator
        .on_drag_end(&mut session, "a", Some("status:waiting"))
        .expect("drop a");
    h.coordinator.start(&mut session, "b").expect("start b");
    let second = h
        .coordinator
        .on_drag_end(&mut session, "b", Some("status:archived"))
        .expect("drop b");

    assert!(first.into_handle().expect("a").settled().await.is_applied());
    assert!(second.into_handle().expect("b").settled().await.is_applied());

    let store = h.store.lock();
    assert_eq!(store.task("a").expect("a").status, Status::Waiting);
    assert!(store.task("b").expect("b").archived);
}

#[tokio::test]
async fn pointer_over_sidebar_wins_and_empty_release_cancels() {
    let h = harness(vec![seeded("t-1"), seeded("t-2")], false);
    let mut catalog = Catalog::new();
    catalog
        .register_id("task:t-2", Rect::new(200.0, 0.0, 600.0, 600.0))
        .expect("row");
    catalog
        .register_id("status:waiting", Rect::new(0.0, 0.0, 220.0, 30.0))
        .expect("bucket");

    let mut session = DragSession::new();
    h.coordinator.start(&mut session, "t-1").expect("start");
    let over = h
        .coordinator
        .over(&mut session, &Rect::new(190.0, 10.0, 300.0, 40.0), &catalog)
        .expect("over")
        .map(ToString::to_string);
    assert_eq!(over.as_deref(), Some("status:waiting"));
    h.coordinator.cancel(&mut session);

    h.coordinator.start(&mut session, "t-1").expect("restart");
    let outcome = h
        .coordinator
        .on_drag_end(&mut session, "t-1", None)
        .expect("release");
    assert!(matches!(outcome, DragOutcome::Cancelled));
    assert!(h.service.patches.lock().is_empty());
}
