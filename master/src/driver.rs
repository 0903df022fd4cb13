use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use common::{
    merge::{cleanup_intermediate, merge_outputs},
    JobId, JobInfo, JobStatus, Phase,
};
use glob::glob;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::scheduler::{schedule, JobPlan, PhaseSummary};
use crate::state::AppState;

/// Expande el glob de entrada a la lista ordenada de archivos (uno por tarea map).
pub fn expand_input_glob(pattern: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in glob(pattern).with_context(|| format!("patrón input_glob inválido: {}", pattern))? {
        match entry {
            Ok(path) if path.is_file() => files.push(path.to_string_lossy().to_string()),
            Ok(_) => {}
            Err(e) => warn!("no se pudo leer una entrada del glob {}: {}", pattern, e),
        }
    }

    files.sort();
    Ok(files)
}

/// Corre un job completo: fase map, fase reduce, merge y limpieza.
/// El progreso y el resultado quedan en la tabla de jobs.
pub async fn run_job(state: AppState, job_id: JobId) {
    let Some(job) = state.job(&job_id) else {
        warn!("run_job: job {} no existe", job_id);
        return;
    };

    state.update_job(&job_id, |j| {
        j.status = JobStatus::Running;
        j.started_at = Some(Utc::now());
    });

    info!(
        "job {} ({}) arrancando: app={} M={} R={}",
        job.id,
        job.name,
        job.app,
        job.input_files.len(),
        job.n_reduce
    );

    match drive(&state, &job).await {
        Ok(result) => {
            info!("job {} terminado, resultado en {}", job.id, result.display());
            state.update_job(&job_id, |j| {
                j.status = JobStatus::Succeeded;
                j.phase = None;
                j.result_path = Some(result.to_string_lossy().to_string());
                j.finished_at = Some(Utc::now());
            });
        }
        Err(e) => {
            warn!("job {} falló: {:#}", job.id, e);
            state.update_job(&job_id, |j| {
                j.status = JobStatus::Failed;
                j.error = Some(format!("{:#}", e));
                j.finished_at = Some(Utc::now());
            });
        }
    }
}

async fn drive(state: &AppState, job: &JobInfo) -> Result<PathBuf> {
    let plan = JobPlan {
        job_name: job.name.clone(),
        app: job.app.clone(),
        map_files: job.input_files.clone(),
        n_reduce: job.n_reduce,
    };

    for phase in [Phase::Map, Phase::Reduce] {
        state.update_job(&job.id, |j| j.phase = Some(phase));

        let summary = schedule(
            &plan,
            phase,
            &state.pool,
            state.caller.clone(),
            &state.config.scheduler,
        )
        .await
        .with_context(|| format!("fase {}", phase))?;

        record_phase(state, &job.id, &summary);
    }

    let dir = state.config.data_dir.clone();
    let name = job.name.clone();
    let n_reduce = job.n_reduce;

    // merge + limpieza son I/O bloqueante
    tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let result = merge_outputs(&dir, &name, n_reduce)?;
        cleanup_intermediate(&dir, &name).context("borrando shards intermedios")?;
        Ok(result)
    })
    .await
    .map_err(|e| anyhow!("merge abortado: {}", e))?
}

fn record_phase(state: &AppState, job_id: &str, summary: &PhaseSummary) {
    info!(
        "job {}: fase {} completa, {}/{} tareas en {} intentos",
        job_id, summary.phase, summary.completed, summary.tasks, summary.attempts
    );
    state.update_job(job_id, |j| match summary.phase {
        Phase::Map => {
            j.map_tasks_completed = summary.completed;
            j.map_attempts = summary.attempts;
        }
        Phase::Reduce => {
            j.reduce_tasks_completed = summary.completed;
            j.reduce_attempts = summary.attempts;
        }
    });
}
