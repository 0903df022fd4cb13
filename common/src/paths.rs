//! Nombres de archivo deterministas de un job.
//!
//! Layout bajo el directorio de datos compartido:
//!
//! ```text
//! <dir>/<job>/shuffle/map-<m>/part-<r>.jsonl   (shards intermedios)
//! <dir>/<job>/reduce/part-<r>.jsonl            (salida de cada reduce)
//! <dir>/<job>/result.txt                       (merge final)
//! ```

use std::path::{Path, PathBuf};

use crate::error::TaskError;

pub fn job_dir(dir: &Path, job_name: &str) -> PathBuf {
    dir.join(job_name)
}

pub fn shuffle_dir(dir: &Path, job_name: &str) -> PathBuf {
    job_dir(dir, job_name).join("shuffle")
}

/// Shard escrito por el map `map_task` para el reduce `reduce_task`.
pub fn shard_path(dir: &Path, job_name: &str, map_task: u32, reduce_task: u32) -> PathBuf {
    shuffle_dir(dir, job_name)
        .join(format!("map-{}", map_task))
        .join(format!("part-{}.jsonl", reduce_task))
}

pub fn reduce_output_path(dir: &Path, job_name: &str, reduce_task: u32) -> PathBuf {
    job_dir(dir, job_name)
        .join("reduce")
        .join(format!("part-{}.jsonl", reduce_task))
}

pub fn result_path(dir: &Path, job_name: &str) -> PathBuf {
    job_dir(dir, job_name).join("result.txt")
}

/// Los nombres de job terminan en rutas, así que sólo se aceptan
/// `[A-Za-z0-9_.-]` y nada que sea `.` o `..`.
pub fn validate_job_name(job_name: &str) -> Result<(), TaskError> {
    let ok_chars = job_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if job_name.is_empty() || !ok_chars || job_name == "." || job_name == ".." {
        return Err(TaskError::InvalidTask(format!(
            "nombre de job inválido: {:?}",
            job_name
        )));
    }
    Ok(())
}
