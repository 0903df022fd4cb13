use anyhow::{bail, Context, Result};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use common::{
    apps, engine, ExecuteTaskResponse, TaskDescriptor, TaskError, WorkerRegisterRequest,
    WorkerRegisterResponse,
};
use reqwest::Client;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    net::TcpListener,
    sync::{Notify, OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
    time::sleep,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::WorkerConfig;

pub const EXECUTE_TASK_PATH: &str = "/api/v1/tasks/execute";

const REGISTER_ATTEMPTS: u32 = 30;
const REGISTER_BACKOFF: Duration = Duration::from_secs(1);

/// Estado compartido por los handlers del worker.
#[derive(Clone)]
pub struct WorkerState {
    data_dir: Arc<PathBuf>,
    // una tarea a la vez: el master nunca manda dos, y si pasa se rechaza
    busy: Arc<Semaphore>,
    served: Arc<AtomicU32>,
    max_tasks: Option<u32>,
    shutdown: Arc<Notify>,
}

impl WorkerState {
    pub fn new(data_dir: PathBuf, max_tasks: Option<u32>) -> Self {
        Self {
            data_dir: Arc::new(data_dir),
            busy: Arc::new(Semaphore::new(1)),
            served: Arc::new(AtomicU32::new(0)),
            max_tasks,
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn exhausted(&self) -> bool {
        self.max_tasks
            .is_some_and(|max| self.served.load(Ordering::SeqCst) >= max)
    }
}

pub fn build_router(state: WorkerState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(|| async { "ok" }))
        .route(EXECUTE_TASK_PATH, post(execute_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- ejecución de tareas ---------------- */

async fn execute_task(
    State(state): State<WorkerState>,
    Json(task): Json<TaskDescriptor>,
) -> Result<Json<ExecuteTaskResponse>, (StatusCode, String)> {
    if state.exhausted() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "worker apagándose".to_string(),
        ));
    }

    let Ok(permit) = state.busy.clone().try_acquire_owned() else {
        warn!(
            "rechazo tarea {} {} de {}: ya hay una en curso",
            task.phase, task.task_number, task.job_name
        );
        return Err((StatusCode::CONFLICT, "worker ocupado".to_string()));
    };

    let resp = run_task(&state, task, permit).await;

    let served = state.served.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(max) = state.max_tasks {
        if served >= max {
            info!("atendí {} tareas (máximo {}), apagando", served, max);
            state.shutdown.notify_one();
        }
    }

    Ok(Json(resp))
}

async fn run_task(
    state: &WorkerState,
    task: TaskDescriptor,
    permit: OwnedSemaphorePermit,
) -> ExecuteTaskResponse {
    let Some(workload) = apps::lookup(&task.app) else {
        let err = TaskError::UnknownApp(task.app.clone());
        warn!("rechazo tarea {} {}: {}", task.phase, task.task_number, err);
        return ExecuteTaskResponse {
            success: false,
            error: Some(err.to_string()),
        };
    };

    info!(
        "ejecutando tarea {} {} de {} (app={})",
        task.phase, task.task_number, task.job_name, task.app
    );

    let dir = state.data_dir.clone();
    let label = format!("{} {} de {}", task.phase, task.task_number, task.job_name);

    // lectura/escritura de archivos: fuera del runtime async
    let handle = spawn_with_permit(permit, move || engine::execute_task(&dir, &task, workload));

    match handle.await {
        Ok(Ok(stats)) => {
            info!("terminé tarea {}: {:?}", label, stats);
            ExecuteTaskResponse {
                success: true,
                error: None,
            }
        }
        Ok(Err(e)) => {
            warn!("error procesando tarea {}: {}", label, e);
            ExecuteTaskResponse {
                success: false,
                error: Some(e.to_string()),
            }
        }
        Err(e) => {
            warn!("panic o join error en tarea {}: {:?}", label, e);
            ExecuteTaskResponse {
                success: false,
                error: Some(format!("la tarea abortó: {}", e)),
            }
        }
    }
}

/// Corre `f` en un hilo bloqueante. El permiso se suelta recién cuando `f`
/// termina, aunque el handler que esperaba el resultado ya no exista.
fn spawn_with_permit<F, T>(permit: OwnedSemaphorePermit, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        f()
    })
}

/* ---------------- registro contra el master ---------------- */

/// Se registra en el master; reintenta mientras el master no esté arriba.
pub async fn register(client: &Client, master_url: &str, req: &WorkerRegisterRequest) -> Result<String> {
    let url = format!("{}/api/v1/workers/register", master_url.trim_end_matches('/'));

    for attempt in 1..=REGISTER_ATTEMPTS {
        match client.post(&url).json(req).send().await {
            Ok(resp) if resp.status().is_success() => {
                let WorkerRegisterResponse { worker_id } = resp.json().await?;
                return Ok(worker_id);
            }
            Ok(resp) => {
                bail!("el master rechazó el registro: status {}", resp.status());
            }
            Err(e) => {
                warn!(
                    "no pude registrarme en {} (intento {}/{}): {}",
                    url, attempt, REGISTER_ATTEMPTS, e
                );
                sleep(REGISTER_BACKOFF).await;
            }
        }
    }

    bail!("master {} inalcanzable", master_url)
}

/// Loop principal del worker.
/// - Abre el listener del endpoint de ejecución.
/// - Se registra en el master con su dirección anunciada.
/// - Atiende tareas hasta WORKER_MAX_TASKS (o para siempre).
pub async fn run(config: WorkerConfig, hostname: String) -> Result<()> {
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.bind))?;
    info!("worker escuchando en {}", listener.local_addr()?);

    let state = WorkerState::new(config.data_dir.clone(), config.max_tasks);
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let worker_id = register(
        &Client::new(),
        &config.master_url,
        &WorkerRegisterRequest {
            hostname,
            address: config.advertise_url.clone(),
        },
    )
    .await?;
    info!(
        "worker {} registrado como {} contra {}",
        worker_id, config.advertise_url, config.master_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;

    info!("worker {} apagado", worker_id);
    Ok(())
}
