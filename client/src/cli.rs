use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use common::{apps, engine, JobInfo, JobRequest, JobResults, WorkerInfo};
use reqwest::Client;
use std::{env, path::PathBuf};

/// Igual que en el worker:
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el master")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Envía un job nuevo
    Submit {
        #[arg(value_name = "NOMBRE")]
        name: String,

        /// Aplicación map/reduce (wordcount, indexer)
        #[arg(long, default_value = "wordcount")]
        app: String,

        /// Archivos de entrada, vistos desde el master
        #[arg(long, default_value = "/data/input/*")]
        input_glob: String,

        /// Cantidad de tareas reduce
        #[arg(long, default_value_t = 4)]
        n_reduce: u32,
    },
    /// Consulta el estado de un job
    Status {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Lista los archivos de salida de un job
    Results {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },

    Workers,

    /// Corre un job completo en este proceso, sin master ni workers
    Local {
        #[arg(value_name = "NOMBRE")]
        name: String,

        #[arg(value_name = "ARCHIVOS", required = true)]
        files: Vec<String>,

        #[arg(long, default_value = "wordcount")]
        app: String,

        #[arg(long, default_value_t = 4)]
        n_reduce: u32,

        /// Directorio para shards y salidas
        #[arg(long, default_value = "/data/mr")]
        data_dir: PathBuf,
    },
}

fn print_job(job: &JobInfo) {
    println!("Job:");
    println!("  id: {}", job.id);
    println!("  nombre: {}", job.name);
    println!("  app: {}", job.app);
    println!("  estado: {:?}", job.status);
    if let Some(phase) = job.phase {
        println!("  fase: {}", phase);
    }

    let n_map = job.input_files.len();
    println!(
        "  map: {}/{} completadas, {} intentos",
        job.map_tasks_completed, n_map, job.map_attempts
    );
    println!(
        "  reduce: {}/{} completadas, {} intentos",
        job.reduce_tasks_completed, job.n_reduce, job.reduce_attempts
    );

    println!("  input_glob: {}", job.input_glob);
    println!("  submitted_at: {}", job.submitted_at);
    if let Some(ref started) = job.started_at {
        println!("  iniciado: {}", started);
    }
    if let Some(ref done) = job.finished_at {
        println!("  finalizado: {}", done);
    }
    if let Some(ref result) = job.result_path {
        println!("  resultado: {}", result);
    }
    if let Some(ref err) = job.error {
        println!("  error: {}", err);
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Submit {
            name,
            app,
            input_glob,
            n_reduce,
        } => {
            let url = format!("{}/api/v1/jobs", base_url);
            let req = JobRequest {
                name,
                app,
                input_glob,
                n_reduce,
            };

            let resp = client.post(&url).json(&req).send().await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let msg = resp.text().await.unwrap_or_default();
                return Err(anyhow!("el master rechazó el job ({}): {}", status, msg));
            }

            let job_info: JobInfo = resp.json().await?;
            println!("Job creado:");
            println!("  id: {}", job_info.id);
            println!("  nombre: {}", job_info.name);
            println!("  estado: {:?}", job_info.status);
            println!("  archivos de entrada: {}", job_info.input_files.len());
            println!("  n_reduce: {}", job_info.n_reduce);
        }

        Commands::Status { id } => {
            let url = format!("{}/api/v1/jobs/{}", base_url, id);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let job: JobInfo = resp.json().await?;
                print_job(&job);
            } else {
                println!("Error: job no encontrado (status {})", resp.status());
            }
        }

        Commands::Results { id } => {
            let url = format!("{}/api/v1/jobs/{id}/results", base_url);
            let resp = client.get(&url).send().await?;

            if resp.status().is_success() {
                let results: JobResults = resp.json().await?;
                println!("Resultados para job {}:", results.job_id);
                println!("  resultado final: {}", results.result_path);
                println!("  salidas de reduce:");
                for f in results.reduce_outputs {
                    println!("    - {}", f);
                }
            } else {
                let status = resp.status();
                let msg = resp.text().await.unwrap_or_default();
                println!("No hay resultados para job {id} (status {status}): {msg}");
            }
        }

        Commands::Workers => {
            let url = format!("{}/api/v1/workers", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status().is_success() {
                let workers: Vec<WorkerInfo> = resp.json().await?;
                if workers.is_empty() {
                    println!("No hay workers registrados.");
                } else {
                    for w in workers {
                        println!("Worker {}", w.worker_id);
                        println!("  host       : {}", w.hostname);
                        println!("  dirección  : {}", w.address);
                        println!("  registrado : {}", w.registered_at);
                        println!();
                    }
                }
            } else {
                println!(
                    "Error consultando /api/v1/workers (status {})",
                    resp.status()
                );
            }
        }

        Commands::Local {
            name,
            files,
            app,
            n_reduce,
            data_dir,
        } => {
            let workload = apps::lookup(&app).ok_or_else(|| {
                anyhow!(
                    "app desconocida {:?}; disponibles: {}",
                    app,
                    apps::names().join(", ")
                )
            })?;

            println!("Ejecutando job {} local:", name);
            println!("  app     : {}", app);
            println!("  archivos: {}", files.len());
            println!("  n_reduce: {}", n_reduce);

            let result = tokio::task::spawn_blocking(move || {
                engine::run_sequential(&data_dir, &name, &files, n_reduce, workload)
            })
            .await??;

            println!("Job completado. Resultado: {}", result.display());
        }
    }

    Ok(())
}
