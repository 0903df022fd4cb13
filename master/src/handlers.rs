use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use common::{
    apps, paths, JobInfo, JobRequest, JobResults, JobStatus, WorkerInfo,
    WorkerRegisterRequest, WorkerRegisterResponse,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::driver::{expand_input_glob, run_job};
use crate::state::AppState;

type ApiError = (StatusCode, String);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/jobs", post(create_job))
        .route("/api/v1/jobs/:id", get(get_job))
        .route("/api/v1/jobs/:id/results", get(get_job_results))
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/workers/register", post(register_worker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn internal(msg: &str) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string())
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Crea un job nuevo (una tarea map por archivo que matchee input_glob) y lo lanza en segundo plano
async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<JobRequest>,
) -> Result<Json<JobInfo>, ApiError> {
    paths::validate_job_name(&req.name).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if apps::lookup(&req.app).is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "app desconocida {:?}; disponibles: {}",
                req.app,
                apps::names().join(", ")
            ),
        ));
    }

    if req.n_reduce == 0 {
        return Err((StatusCode::BAD_REQUEST, "n_reduce debe ser > 0".to_string()));
    }

    let input_files = expand_input_glob(&req.input_glob)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{:#}", e)))?;

    let job_id = uuid::Uuid::new_v4().to_string();
    let job_info = JobInfo::accepted(job_id.clone(), &req, input_files);

    {
        let mut jobs = state.jobs.lock().map_err(|_| internal("lock jobs"))?;

        // dos jobs activos con el mismo nombre pisarían los mismos archivos
        if jobs.values().any(|j| j.name == req.name && j.is_active()) {
            return Err((
                StatusCode::CONFLICT,
                format!("ya hay un job activo llamado {}", req.name),
            ));
        }
        jobs.insert(job_id.clone(), job_info.clone());
    }

    info!(
        "job {} ({}) aceptado: app={} M={} R={}",
        job_id,
        req.name,
        req.app,
        job_info.input_files.len(),
        req.n_reduce
    );

    tokio::spawn(run_job(state.clone(), job_id));

    Ok(Json(job_info))
}

// Devuelve info de un job
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobInfo>, StatusCode> {
    state.job(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

// Rutas de salida de un job terminado
async fn get_job_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResults>, ApiError> {
    let job = state
        .job(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("job {} no existe", id)))?;

    let Some(result_path) = job.result_path.clone().filter(|_| job.status == JobStatus::Succeeded)
    else {
        return Err((
            StatusCode::CONFLICT,
            format!("job {} todavía no tiene resultados ({:?})", id, job.status),
        ));
    };

    let reduce_outputs = (0..job.n_reduce)
        .map(|r| {
            paths::reduce_output_path(&state.config.data_dir, &job.name, r)
                .to_string_lossy()
                .to_string()
        })
        .collect();

    Ok(Json(JobResults {
        job_id: job.id,
        result_path,
        reduce_outputs,
    }))
}

// Registra un worker nuevo y lo suma al pool de endpoints
async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<WorkerRegisterRequest>,
) -> Result<Json<WorkerRegisterResponse>, ApiError> {
    if req.address.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "address vacío".to_string()));
    }

    let worker_id = uuid::Uuid::new_v4().to_string();

    {
        let mut workers = state.workers.lock().map_err(|_| internal("lock workers"))?;
        if workers.values().any(|w| w.address == req.address) {
            // un worker que reinicia con la misma dirección ya está en el pool
            warn!("worker {} se volvió a registrar", req.address);
        } else {
            state.pool.register(req.address.clone());
        }
        workers.insert(
            worker_id.clone(),
            WorkerInfo {
                worker_id: worker_id.clone(),
                hostname: req.hostname.clone(),
                address: req.address.clone(),
                registered_at: Utc::now(),
            },
        );
    }

    info!(
        "worker registrado: {} ({} en {})",
        worker_id, req.hostname, req.address
    );
    Ok(Json(WorkerRegisterResponse { worker_id }))
}

async fn list_workers(State(state): State<AppState>) -> Result<Json<Vec<WorkerInfo>>, ApiError> {
    let workers = state.workers.lock().map_err(|_| internal("lock workers"))?;
    let mut out: Vec<WorkerInfo> = workers.values().cloned().collect();
    out.sort_by_key(|w| w.registered_at);
    Ok(Json(out))
}
