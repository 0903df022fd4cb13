use std::{env, path::PathBuf};

use crate::scheduler::SchedulerConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_DATA_DIR: &str = "/data/mr";

#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// MASTER_BIND
    pub bind: String,
    /// DATA_DIR: directorio compartido con los workers (shards, salidas, resultado)
    pub data_dir: PathBuf,
    /// MAX_TASK_ATTEMPTS: si no está, los reintentos no tienen límite
    pub scheduler: SchedulerConfig,
}

impl MasterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_attempts = lookup("MAX_TASK_ATTEMPTS")
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0);

        Self {
            bind: lookup("MASTER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            scheduler: SchedulerConfig { max_attempts },
        }
    }
}
