//
// web.rs
// Dicom-Deface
//
// Axum-based HTTP service that runs batch jobs on a background worker and exposes their progress and log.
//
// Thales Matheus Mendonça Santos - October 2026

use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::batch::{self, BatchConfig};
use crate::models::{JobSnapshot, JobState};
use crate::progress::{ProgressEvent, ProgressSink};

/// Oldest lines are dropped past this many.
const MAX_LOG_LINES: usize = 1000;

/// Completed or failed jobs kept for polling; older ones are forgotten.
const MAX_FINISHED_JOBS: usize = 100;

/// Shared table of batch jobs, one snapshot per job.
#[derive(Clone, Default)]
pub struct JobRegistry {
    next_id: Arc<AtomicU64>,
    jobs: Arc<Mutex<BTreeMap<u64, JobSnapshot>>>,
}

impl JobRegistry {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, JobSnapshot>> {
        // A panicking worker must not take the whole service down with it.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut jobs = self.lock();
        prune_finished(&mut jobs);
        jobs.insert(
            id,
            JobSnapshot {
                id,
                state: JobState::Queued,
                total: 0,
                processed: 0,
                percent: 0.0,
                current: "Waiting to start...".to_string(),
                log: Vec::new(),
                summary: None,
                error: None,
            },
        );
        id
    }

    pub fn snapshot(&self, id: u64) -> Option<JobSnapshot> {
        self.lock().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        self.lock().values().cloned().collect()
    }

    fn update(&self, id: u64, f: impl FnOnce(&mut JobSnapshot)) {
        if let Some(job) = self.lock().get_mut(&id) {
            f(job);
        }
    }

    pub fn fail(&self, id: u64, error: String) {
        self.update(id, |job| {
            job.state = JobState::Failed;
            job.current = "Processing failed".to_string();
            push_log(job, format!("General error: {}", error));
            job.error = Some(error);
        });
    }

    /// Progress sink that feeds job `id`.
    pub fn sink(&self, id: u64) -> JobSink {
        JobSink {
            id,
            registry: self.clone(),
        }
    }
}

fn prune_finished(jobs: &mut BTreeMap<u64, JobSnapshot>) {
    let finished: Vec<u64> = jobs
        .iter()
        .filter(|(_, job)| matches!(job.state, JobState::Completed | JobState::Failed))
        .map(|(id, _)| *id)
        .collect();
    if finished.len() > MAX_FINISHED_JOBS {
        for id in &finished[..finished.len() - MAX_FINISHED_JOBS] {
            jobs.remove(id);
        }
    }
}

fn push_log(job: &mut JobSnapshot, line: String) {
    job.log.push(line);
    if job.log.len() > MAX_LOG_LINES {
        let excess = job.log.len() - MAX_LOG_LINES;
        job.log.drain(..excess);
    }
}

pub struct JobSink {
    id: u64,
    registry: JobRegistry,
}

impl ProgressSink for JobSink {
    fn on_event(&self, event: ProgressEvent) {
        let line = event.describe();
        self.registry.update(self.id, |job| {
            match &event {
                ProgressEvent::Started { total } => {
                    job.state = JobState::Running;
                    job.total = *total;
                }
                ProgressEvent::PatientStarted { .. } => job.current = line.clone(),
                ProgressEvent::FileDone { .. } | ProgressEvent::FileFailed { .. } => {
                    job.current = line.clone();
                }
                ProgressEvent::Finished(summary) => {
                    job.state = JobState::Completed;
                    job.current = "Processing complete".to_string();
                    job.summary = Some(summary.clone());
                }
            }
            if event.completes_file() {
                job.processed += 1;
                if job.total > 0 {
                    job.percent = job.processed as f32 / job.total as f32 * 100.0;
                }
            }
            push_log(job, line);
        });
    }
}

#[derive(Clone)]
struct AppState {
    jobs: JobRegistry,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

pub fn router(jobs: JobRegistry) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/:id", get(get_job))
        .with_state(AppState { jobs })
        .layer(CorsLayer::permissive())
}

/// Bootstraps the Axum HTTP server and wires up API routes.
pub async fn start_server(host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(JobRegistry::default());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> Html<&'static str> {
    Html(include_str!("templates/index.html"))
}

async fn create_job(
    State(state): State<AppState>,
    Json(config): Json<BatchConfig>,
) -> ApiResult<Json<Value>> {
    config.validate().map_err(bad_request)?;

    let id = state.jobs.create();
    info!(id, input = ?config.input, output = ?config.output, "job queued");
    spawn_job(state.jobs.clone(), id, move |sink| {
        batch::run(&config, sink).map(|_| ())
    });

    Ok(Json(json!({ "success": true, "id": id })))
}

/// Runs `work` on the blocking pool and marks job `id` failed if it errors or panics.
fn spawn_job<F>(jobs: JobRegistry, id: u64, work: F) -> JoinHandle<()>
where
    F: FnOnce(&JobSink) -> anyhow::Result<()> + Send + 'static,
{
    let sink = jobs.sink(id);
    // The batch is blocking file I/O; keep it off the async workers.
    let worker = tokio::task::spawn_blocking(move || work(&sink));
    tokio::spawn(async move {
        let error = match worker.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{:#}", e),
            Err(e) => format!("worker stopped: {}", e),
        };
        warn!(id, error = %error, "job failed");
        jobs.fail(id, error);
    })
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSnapshot>> {
    Json(state.jobs.list())
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .jobs
        .snapshot(id)
        .map(Json)
        .ok_or_else(|| not_found(format!("No job with id {}", id)))
}

fn bad_request<E: Display>(err: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn not_found<E: Display>(err: E) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, err.to_string())
}
