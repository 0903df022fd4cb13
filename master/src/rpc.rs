use async_trait::async_trait;
use common::{ExecuteTaskResponse, TaskDescriptor};
use reqwest::Client;
use tracing::warn;

use crate::scheduler::TaskCaller;

pub const EXECUTE_TASK_PATH: &str = "/api/v1/tasks/execute";

/// `TaskCaller` sobre HTTP: POST del descriptor al worker.
/// Sin timeout: una llamada que nunca vuelve retiene su lease.
#[derive(Clone)]
pub struct HttpTaskCaller {
    client: Client,
}

impl HttpTaskCaller {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskCaller for HttpTaskCaller {
    async fn call(&self, worker: &str, task: &TaskDescriptor) -> bool {
        let url = format!("{}{}", worker.trim_end_matches('/'), EXECUTE_TASK_PATH);

        let resp = match self.client.post(&url).json(task).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("error HTTP llamando a {}: {:?}", url, e);
                return false;
            }
        };

        if !resp.status().is_success() {
            warn!(
                "worker {} devolvió status {} para tarea {} {}",
                worker,
                resp.status(),
                task.phase,
                task.task_number
            );
            return false;
        }

        match resp.json::<ExecuteTaskResponse>().await {
            Ok(ExecuteTaskResponse { success: true, .. }) => true,
            Ok(ExecuteTaskResponse { error, .. }) => {
                warn!(
                    "worker {} reportó fallo en tarea {} {}: {}",
                    worker,
                    task.phase,
                    task.task_number,
                    error.unwrap_or_default()
                );
                false
            }
            Err(e) => {
                warn!("respuesta inválida de {}: {:?}", worker, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use common::Phase;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn task(n: u32) -> TaskDescriptor {
        TaskDescriptor {
            job_name: "job".to_string(),
            app: "wordcount".to_string(),
            phase: Phase::Reduce,
            task_number: n,
            file: None,
            num_other_phase: 1,
        }
    }

    #[tokio::test]
    async fn call_refleja_el_success_del_worker() {
        let app = Router::new().route(
            EXECUTE_TASK_PATH,
            post(|Json(t): Json<TaskDescriptor>| async move {
                Json(ExecuteTaskResponse {
                    success: t.task_number == 0,
                    error: (t.task_number != 0).then(|| "boom".to_string()),
                })
            }),
        );
        let base = serve(app).await;
        let caller = HttpTaskCaller::new(Client::new());

        assert!(caller.call(&base, &task(0)).await);
        assert!(!caller.call(&base, &task(1)).await);
        // la barra final en la dirección no molesta
        assert!(caller.call(&format!("{}/", base), &task(0)).await);
    }

    #[tokio::test]
    async fn status_de_error_es_fallo() {
        let app = Router::new().route(
            EXECUTE_TASK_PATH,
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;

        assert!(!HttpTaskCaller::new(Client::new()).call(&base, &task(0)).await);
    }

    #[tokio::test]
    async fn worker_inalcanzable_es_fallo() {
        // puerto reservado, no hay nadie escuchando
        let caller = HttpTaskCaller::new(Client::new());
        assert!(!caller.call("http://127.0.0.1:1", &task(0)).await);
    }
}
