// master/src/state.rs

use common::{JobId, JobInfo, WorkerId, WorkerInfo};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::config::MasterConfig;
use crate::pool::WorkerPool;
use crate::scheduler::TaskCaller;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<Mutex<HashMap<JobId, JobInfo>>>,
    pub workers: Arc<Mutex<HashMap<WorkerId, WorkerInfo>>>,
    // endpoints de workers registrados; lo consumen los schedulers de cada fase
    pub pool: WorkerPool,
    pub caller: Arc<dyn TaskCaller>,
    pub config: Arc<MasterConfig>,
}

impl AppState {
    pub fn new(config: MasterConfig, caller: Arc<dyn TaskCaller>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            workers: Arc::new(Mutex::new(HashMap::new())),
            pool: WorkerPool::new(),
            caller,
            config: Arc::new(config),
        }
    }

    pub fn job(&self, id: &str) -> Option<JobInfo> {
        self.jobs
            .lock()
            .ok()
            .and_then(|jobs| jobs.get(id).cloned())
    }

    /// Aplica `f` al job si existe. Devuelve false si no existe (o el lock está envenenado).
    pub fn update_job<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut JobInfo),
    {
        match self.jobs.lock() {
            Ok(mut jobs) => match jobs.get_mut(id) {
                Some(job) => {
                    f(job);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}
