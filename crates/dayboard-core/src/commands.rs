use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::{NaiveDate, Utc};
use dayboard_shared::{ProjectCreate, TaskCreate};
use serde::Deserialize;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::actions::TaskActions;
use crate::cli::Command;
use crate::collision::detect_collisions;
use crate::config::Config;
use crate::datetime::local_now;
use crate::dispatch::{DispatchReport, MutationDispatcher};
use crate::render::Renderer;
use crate::service::{HttpTaskService, TaskService};
use crate::session::{DragCoordinator, DragOutcome, DragSession};
use crate::store::{SharedStore, TaskStore};
use crate::target::{Catalog, DropTarget, Rect};
use crate::task::{Task, View};
use crate::transition::{Transition, transition};

/// Everything a command needs, wired to one task service.
pub struct App {
    pub config: Config,
    pub store: SharedStore,
    pub actions: TaskActions,
    pub coordinator: DragCoordinator,
}

impl App {
    pub fn connect(config: Config, runtime: Handle) -> anyhow::Result<Self> {
        let service = HttpTaskService::new(&config.service.base_url)
            .with_context(|| format!("failed to set up client for {}", config.service.base_url))?;
        Ok(Self::with_service(config, Arc::new(service), runtime))
    }

    pub fn with_service(config: Config, service: Arc<dyn TaskService>, runtime: Handle) -> Self {
        let store = TaskStore::new().into_shared();
        let dispatcher = MutationDispatcher::new(Arc::clone(&service), Arc::clone(&store), runtime);
        let coordinator = DragCoordinator::new(Arc::clone(&store), dispatcher, config.clone());
        let actions = TaskActions::new(service, Arc::clone(&store));
        Self {
            config,
            store,
            actions,
            coordinator,
        }
    }

    fn today(&self) -> NaiveDate {
        local_now(&self.config.time.timezone, Utc::now()).date()
    }

    fn task(&self, id: &str) -> anyhow::Result<Task> {
        self.store
            .lock()
            .task(id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown task: {id}"))
    }
}

#[instrument(skip(app, renderer, command))]
pub async fn execute(app: &App, renderer: &mut Renderer, command: Command) -> anyhow::Result<()> {
    debug!(?command, "executing command");
    match command {
        Command::List { view, json } => {
            let view: View = view.parse()?;
            app.actions.refresh().await?;
            let today = app.today();
            let store = app.store.lock();
            let tasks = store.visible(&view, today);
            info!(view = %view, count = tasks.len(), "listing tasks");
            if json {
                renderer.print_json(&tasks)
            } else {
                renderer.print_task_table(&tasks, store.projects(), today)
            }
        }
        Command::Show { id } => {
            app.actions.refresh().await?;
            let task = app.task(&id)?;
            let projects = app.store.lock().projects().to_vec();
            renderer.print_task_info(&task, &projects)
        }
        Command::Add { title, project } => {
            let task = app
                .actions
                .create_task(TaskCreate {
                    title,
                    project_id: project,
                    ..TaskCreate::default()
                })
                .await?;
            renderer.print_line(&format!("Created task {}.", task.id))
        }
        Command::Move { id, target } => move_task(app, renderer, &id, &target).await,
        Command::Preview { id, target } => {
            let target = parse_target(&target)?;
            app.actions.refresh().await?;
            let task = app.task(&id)?;
            match transition(&task, &target, &app.coordinator.context()) {
                Transition::Update(delta) => renderer.print_json(&delta.to_patch()),
                Transition::Reorder { anchor } => {
                    renderer.print_line(&format!("Would place {id} next to {anchor}; order is not saved."))
                }
            }
        }
        Command::Resolve { layout, pointer } => {
            let catalog = load_layout(&layout)?;
            let pointer = parse_rect(&pointer)?;
            match detect_collisions(&pointer, &catalog) {
                Some(collisions) => renderer.print_collisions(&collisions),
                None => renderer.print_line("No drop target under the pointer."),
            }
        }
        Command::Toggle { id } => {
            app.actions.refresh().await?;
            let task = app.actions.toggle_completion(&id, Utc::now()).await?;
            let projects = app.store.lock().projects().to_vec();
            renderer.print_task_info(&task, &projects)
        }
        Command::Delete { id } => {
            app.actions.delete_task(&id).await?;
            renderer.print_line(&format!("Moved task {id} to the trash."))
        }
        Command::Restore { id } => {
            let task = app.actions.restore_task(&id).await?;
            renderer.print_line(&format!("Restored task {}.", task.id))
        }
        Command::Purge { id } => {
            app.actions.permanently_delete_task(&id).await?;
            renderer.print_line(&format!("Deleted task {id} permanently."))
        }
        Command::Projects => {
            app.actions.refresh().await?;
            let projects = app.store.lock().projects().to_vec();
            renderer.print_projects(&projects)
        }
        Command::ProjectAdd { name, color } => {
            let project = app.actions.create_project(ProjectCreate { name, color }).await?;
            renderer.print_line(&format!("Created project {}.", project.id))
        }
        Command::ProjectDelete { id } => {
            app.actions.refresh().await?;
            let detached = app.actions.delete_project(&id).await?;
            renderer.print_line(&format!(
                "Deleted project {id}; detached {} task(s).",
                detached.len()
            ))
        }
    }
}

/// A drop without a pointer. The CLI waits for the service so the process
/// does not exit with the update still in flight.
async fn move_task(app: &App, renderer: &mut Renderer, id: &str, target: &str) -> anyhow::Result<()> {
    let target = parse_target(target)?;
    app.actions.refresh().await?;
    app.task(id)?;

    let mut session = DragSession::new();
    match app.coordinator.move_task(&mut session, id, target)? {
        DragOutcome::Dispatched { handle, .. } => match handle.settled().await {
            DispatchReport::Applied { task, .. } => {
                let projects = app.store.lock().projects().to_vec();
                renderer.print_task_info(&task, &projects)
            }
            DispatchReport::Failed { reason, .. } => bail!("task {id} was not saved: {reason}"),
        },
        DragOutcome::ReorderIgnored { anchor, .. } => {
            renderer.print_line(&format!("Task order is not saved; {id} stays where it is (anchor {anchor})."))
        }
        DragOutcome::Cancelled => renderer.print_line("Nothing to do."),
    }
}

fn parse_target(raw: &str) -> anyhow::Result<DropTarget> {
    raw.parse::<DropTarget>()
        .with_context(|| format!("invalid drop target: {raw}"))
}

/// `x,y,width,height`
fn parse_rect(raw: &str) -> anyhow::Result<Rect> {
    let parts = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid number in rectangle: {part}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let [x, y, width, height] = parts[..] else {
        bail!("expected x,y,width,height, got: {raw}");
    };
    Ok(Rect::new(x, y, width, height))
}

#[derive(Debug, Deserialize)]
struct LayoutEntry {
    id: String,
    #[serde(flatten)]
    rect: Rect,
}

/// Reads a JSON array of `{ "id", "x", "y", "width", "height" }` in mount
/// order.
fn load_layout(path: &Path) -> anyhow::Result<Catalog> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let entries: Vec<LayoutEntry> =
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;

    let mut catalog = Catalog::new();
    for entry in entries {
        catalog
            .register_id(&entry.id, entry.rect)
            .with_context(|| format!("invalid target in {}", path.display()))?;
    }
    if catalog.is_empty() {
        warn!(path = %path.display(), "layout has no drop targets");
    }
    debug!(targets = catalog.len(), "layout loaded");
    Ok(catalog)
}
