use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::service::TaskService;
use crate::store::{MergeOutcome, SharedStore};
use crate::task::Task;
use crate::transition::TaskDelta;

/// How a dispatched mutation settled.
#[derive(Debug)]
pub enum DispatchReport {
  Applied {
    task: Task,
    outcome: MergeOutcome,
  },
  Failed {
    task_id: String,
    reason: String,
  },
}

impl DispatchReport {
  pub fn is_applied(&self) -> bool {
    matches!(self, Self::Applied { .. })
  }
}

/// Completion of a fire-and-forget mutation. Dropping it detaches the
/// request; it still runs to completion.
#[derive(Debug)]
pub struct DispatchHandle {
  task_id: String,
  join: JoinHandle<DispatchReport>,
}

impl DispatchHandle {
  pub fn task_id(&self) -> &str {
    &self.task_id
  }

  pub async fn settled(self) -> DispatchReport {
    match self.join.await {
      Ok(report) => report,
      Err(err) => DispatchReport::Failed {
        task_id: self.task_id,
        reason: format!("dispatch task aborted: {err}"),
      },
    }
  }
}

/// Sends deltas to the task service without blocking the caller. Failures
/// are logged; the optimistic local state is not rolled back.
#[derive(Clone)]
pub struct MutationDispatcher {
  service: Arc<dyn TaskService>,
  store: SharedStore,
  runtime: Handle,
}

impl MutationDispatcher {
  pub fn new(service: Arc<dyn TaskService>, store: SharedStore, runtime: Handle) -> Self {
    Self {
      service,
      store,
      runtime,
    }
  }

  pub fn dispatch(&self, task_id: &str, delta: &TaskDelta) -> DispatchHandle {
    let patch = delta.to_patch();
    let span = info_span!("dispatch", task_id = %task_id);
    span.in_scope(|| info!(fields = ?delta.field_names(), "sending task update"));

    let service = Arc::clone(&self.service);
    let store = Arc::clone(&self.store);
    let handle_id = task_id.to_string();
    let task_id = task_id.to_string();

    let join = self.runtime.spawn(
      async move {
        let dto = match service.update_task(&task_id, patch).await {
          Ok(dto) => dto,
          Err(err) => {
            error!(error = %err, "task update failed; local state kept");
            return DispatchReport::Failed {
              task_id,
              reason: err.to_string(),
            };
          }
        };

        let task = match Task::try_from(dto) {
          Ok(task) => task,
          Err(err) => {
            error!(error = %format!("{err:#}"), "task update returned an unreadable record");
            return DispatchReport::Failed {
              task_id,
              reason: format!("{err:#}"),
            };
          }
        };

        let outcome = store.lock().merge_existing(task.clone());
        info!(?outcome, "task update confirmed");
        DispatchReport::Applied { task, outcome }
      }
      .instrument(span),
    );

    DispatchHandle {
      task_id: handle_id,
      join,
    }
  }
}
