use std::{io, path::PathBuf};

use thiserror::Error;

/// Fallo de un intento de tarea (map o reduce).
///
/// Nunca termina el proceso: el worker lo reporta como `success = false`
/// y el scheduler del master reintenta la tarea con otro worker.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("no se pudo leer el input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no se pudo escribir {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no se pudo leer el shard {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Un shard que existe pero está corrupto. Distinto de un shard ausente.
    #[error("registro inválido en {path} (línea {line}): {source}")]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("tarea inválida: {0}")]
    InvalidTask(String),

    #[error("aplicación desconocida: {0}")]
    UnknownApp(String),
}
