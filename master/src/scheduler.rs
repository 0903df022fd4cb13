use std::sync::Arc;

use async_trait::async_trait;
use common::{Phase, TaskDescriptor};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::pool::WorkerPool;

/// Llamada remota "ejecutá esta tarea" contra un worker.
/// Devuelve `true` sólo si el worker reportó éxito; cualquier otra cosa es un intento fallido.
/// Puede recibir el mismo descriptor más de una vez.
#[async_trait]
pub trait TaskCaller: Send + Sync + 'static {
    async fn call(&self, worker: &str, task: &TaskDescriptor) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// `None`: reintentos sin límite. `Some(n)`: la fase falla cuando una
    /// tarea acumula n intentos fallidos.
    pub max_attempts: Option<u32>,
}

/// Lo que necesita el scheduler de un job para armar los descriptores de una fase.
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub job_name: String,
    pub app: String,
    /// Un archivo por tarea map (M = map_files.len())
    pub map_files: Vec<String>,
    /// R
    pub n_reduce: u32,
}

impl JobPlan {
    pub fn descriptors(&self, phase: Phase) -> Vec<TaskDescriptor> {
        let n_map = self.map_files.len() as u32;

        match phase {
            Phase::Map => self
                .map_files
                .iter()
                .enumerate()
                .map(|(i, file)| TaskDescriptor {
                    job_name: self.job_name.clone(),
                    app: self.app.clone(),
                    phase,
                    task_number: i as u32,
                    file: Some(file.clone()),
                    num_other_phase: self.n_reduce,
                })
                .collect(),
            Phase::Reduce => (0..self.n_reduce)
                .map(|r| TaskDescriptor {
                    job_name: self.job_name.clone(),
                    app: self.app.clone(),
                    phase,
                    task_number: r,
                    file: None,
                    num_other_phase: n_map,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub tasks: u32,
    /// Siempre igual a `tasks` cuando la fase termina bien
    pub completed: u32,
    /// Intentos totales, incluidos los fallidos
    pub attempts: u64,
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("la tarea {phase} {task} falló {attempts} veces, se aborta la fase")]
    TaskExhausted { phase: Phase, task: u32, attempts: u32 },

    #[error("una unidad de despacho de la fase {phase} terminó en panic: {message}")]
    DispatchPanicked { phase: Phase, message: String },
}

/// Ejecuta todas las tareas de una fase sobre los workers del pool y vuelve
/// recién cuando cada índice de tarea terminó bien una vez.
///
/// Lanza una unidad de despacho por tarea; cada una toma un lease, hace la
/// llamada, devuelve el lease y, si falló, vuelve a intentar con el próximo
/// worker libre. No mira ni vacía el pool al terminar.
pub async fn schedule(
    plan: &JobPlan,
    phase: Phase,
    pool: &WorkerPool,
    caller: Arc<dyn TaskCaller>,
    config: &SchedulerConfig,
) -> Result<PhaseSummary, SchedulerError> {
    let tasks = plan.descriptors(phase);
    let n_tasks = tasks.len() as u32;
    let n_other = match phase {
        Phase::Map => plan.n_reduce,
        Phase::Reduce => plan.map_files.len() as u32,
    };

    info!(
        "schedule: {} tareas {} del job {} ({} I/Os)",
        n_tasks, phase, plan.job_name, n_other
    );

    // el JoinSet arranca con N unidades y cada índice sale exactamente una vez
    let mut units = JoinSet::new();
    for task in tasks {
        units.spawn(dispatch(
            task,
            pool.clone(),
            caller.clone(),
            config.max_attempts,
        ));
    }

    let mut completed = 0;
    let mut attempts: u64 = 0;

    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(Ok(task_attempts)) => {
                completed += 1;
                attempts += u64::from(task_attempts);
            }
            Ok(Err(e)) => {
                units.abort_all();
                return Err(e);
            }
            Err(e) => {
                units.abort_all();
                return Err(SchedulerError::DispatchPanicked {
                    phase,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        "schedule: fase {} del job {} terminada ({} tareas, {} intentos)",
        phase, plan.job_name, completed, attempts
    );

    Ok(PhaseSummary {
        phase,
        tasks: n_tasks,
        completed,
        attempts,
    })
}

/// Reintenta un índice de tarea hasta que un worker reporte éxito.
/// Devuelve cuántos intentos hicieron falta.
async fn dispatch(
    task: TaskDescriptor,
    pool: WorkerPool,
    caller: Arc<dyn TaskCaller>,
    max_attempts: Option<u32>,
) -> Result<u32, SchedulerError> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        let lease = pool.acquire().await;
        let worker = lease.address().to_string();
        let ok = caller.call(&worker, &task).await;
        drop(lease);

        if ok {
            debug!(
                "tarea {} {} del job {} terminada en {} (intento {})",
                task.phase, task.task_number, task.job_name, worker, attempts
            );
            return Ok(attempts);
        }

        warn!(
            "tarea {} {} del job {} falló en {} (intento {}), reintentando",
            task.phase, task.task_number, task.job_name, worker, attempts
        );

        if let Some(max) = max_attempts {
            if attempts >= max {
                return Err(SchedulerError::TaskExhausted {
                    phase: task.phase,
                    task: task.task_number,
                    attempts,
                });
            }
        }
    }
}
