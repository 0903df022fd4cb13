use serde::{Deserialize, Serialize};

use crate::job::JobId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    pub job_id: JobId,
    /// Archivo final con todas las claves ordenadas ("clave: valor" por línea)
    pub result_path: String,
    /// Salidas individuales de cada reduce, en orden de índice
    pub reduce_outputs: Vec<String>,
}
