//! Ayudas para tests: un `TaskCaller` que ejecuta las tareas en el mismo
//! proceso con el engine de `common`, y helpers de archivos temporales.

use async_trait::async_trait;
use common::{apps, engine::execute_task, JobId, JobInfo, JobRequest, Phase, TaskDescriptor};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::scheduler::TaskCaller;
use crate::state::AppState;

pub fn temp_dir(sub: &str) -> PathBuf {
    let base = std::env::temp_dir().join("master_tests").join(sub);
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(&base).unwrap();
    base
}

pub fn write_input(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}

/// Ejecuta el descriptor localmente, como lo haría un worker.
pub struct LocalCaller {
    dir: PathBuf,
    fail_first: bool,
    seen: Mutex<HashSet<(Phase, u32)>>,
}

impl LocalCaller {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            fail_first: false,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// El primer intento de cada tarea falla sin ejecutar nada.
    pub fn failing_first(dir: PathBuf) -> Self {
        Self {
            fail_first: true,
            ..Self::new(dir)
        }
    }
}

#[async_trait]
impl TaskCaller for LocalCaller {
    async fn call(&self, _worker: &str, task: &TaskDescriptor) -> bool {
        if self.fail_first && self.seen.lock().unwrap().insert((task.phase, task.task_number)) {
            return false;
        }

        let Some(workload) = apps::lookup(&task.app) else {
            return false;
        };
        let dir = self.dir.clone();
        let task = task.clone();

        tokio::task::spawn_blocking(move || execute_task(&dir, &task, workload).is_ok())
            .await
            .unwrap_or(false)
    }
}

/// Inserta un job Accepted en la tabla y devuelve su id.
pub fn new_job(
    state: &AppState,
    name: &str,
    app: &str,
    input_files: Vec<String>,
    n_reduce: u32,
) -> JobId {
    let id = uuid::Uuid::new_v4().to_string();
    let req = JobRequest {
        name: name.to_string(),
        app: app.to_string(),
        input_glob: String::new(),
        n_reduce,
    };
    let job = JobInfo::accepted(id.clone(), &req, input_files);
    state.jobs.lock().unwrap().insert(id.clone(), job);
    id
}
