use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

pub type WorkerId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterRequest {
    pub hostname: String,
    /// URL base donde el worker atiende tareas, ej: "http://worker-1:9090"
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterResponse {
    pub worker_id: WorkerId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub hostname: String,
    pub address: String,
    pub registered_at: DateTime<Utc>,
}
