use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::task::Phase;

pub type JobId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Nombre del job; también es el prefijo de sus archivos en DATA_DIR
    pub name: String,

    /// Aplicación registrada en los workers, ej: "wordcount", "indexer"
    pub app: String,

    /// Patrón de archivos de entrada, ej: "/data/input/*.txt". Un archivo = una tarea map.
    pub input_glob: String,

    /// Cantidad de tareas reduce (R)
    pub n_reduce: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Accepted,
    Running,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub app: String,
    pub status: JobStatus,

    /// Fase en curso mientras el job está Running
    pub phase: Option<Phase>,

    pub input_glob: String,
    /// Archivos que matchearon el glob (M = input_files.len())
    pub input_files: Vec<String>,
    pub n_reduce: u32,

    /// -------- Métricas del job --------
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub map_tasks_completed: u32,
    pub reduce_tasks_completed: u32,
    /// Intentos totales (incluye fallidos) por fase
    pub map_attempts: u64,
    pub reduce_attempts: u64,

    /// Archivo final del merge, cuando el job terminó bien
    pub result_path: Option<String>,
    pub error: Option<String>,
}

impl JobInfo {
    /// Job recién aceptado, todavía sin arrancar.
    pub fn accepted(id: JobId, req: &JobRequest, input_files: Vec<String>) -> Self {
        Self {
            id,
            name: req.name.clone(),
            app: req.app.clone(),
            status: JobStatus::Accepted,
            phase: None,
            input_glob: req.input_glob.clone(),
            input_files,
            n_reduce: req.n_reduce,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            map_tasks_completed: 0,
            reduce_tasks_completed: 0,
            map_attempts: 0,
            reduce_attempts: 0,
            result_path: None,
            error: None,
        }
    }

    /// Accepted o Running.
    pub fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Accepted | JobStatus::Running)
    }
}
