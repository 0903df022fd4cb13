//! Piezas compartidas entre master, worker y client:
//! tipos de la API, codec de registros, particionado y los executors de map/reduce.

pub mod apps;
pub mod engine;
pub mod error;
pub mod job;
pub mod merge;
pub mod partition;
pub mod paths;
pub mod records;
pub mod results;
pub mod task;
pub mod worker;

pub use apps::{MapFn, ReduceFn, Workload};
pub use error::TaskError;
pub use job::{JobId, JobInfo, JobRequest, JobStatus};
pub use records::KeyValue;
pub use results::JobResults;
pub use task::{ExecuteTaskResponse, Phase, TaskDescriptor};
pub use worker::{WorkerId, WorkerInfo, WorkerRegisterRequest, WorkerRegisterResponse};
