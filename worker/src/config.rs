use std::{env, path::PathBuf};

pub const DEFAULT_MASTER_URL: &str = "http://master:8080";
pub const DEFAULT_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_DATA_DIR: &str = "/data/mr";

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// MASTER_URL
    pub master_url: String,
    /// WORKER_BIND
    pub bind: String,
    /// WORKER_ADVERTISE_URL: dirección que el master usa para llamarnos
    pub advertise_url: String,
    /// DATA_DIR: tiene que ser el mismo directorio que ve el master
    pub data_dir: PathBuf,
    /// WORKER_MAX_TASKS: después de atender tantas tareas el worker se apaga
    pub max_tasks: Option<u32>,
}

impl WorkerConfig {
    pub fn from_env(hostname: &str) -> Self {
        Self::from_lookup(hostname, |k| env::var(k).ok())
    }

    fn from_lookup<F>(hostname: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("WORKER_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());

        let advertise_url = lookup("WORKER_ADVERTISE_URL").unwrap_or_else(|| {
            let port = bind.rsplit(':').next().unwrap_or("9090");
            format!("http://{}:{}", hostname, port)
        });

        let max_tasks = lookup("WORKER_MAX_TASKS")
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0);

        Self {
            master_url: lookup("MASTER_URL").unwrap_or_else(|| DEFAULT_MASTER_URL.to_string()),
            bind,
            advertise_url,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            max_tasks,
        }
    }
}
