//! Isolated worker execution units.
//!
//! Each worker is its own `tokio::spawn`ed task, reachable only through an
//! `mpsc` request channel; a job carries a `oneshot` reply channel so the
//! scheduler can correlate the response. If a worker panics mid-job, the
//! `oneshot` sender is dropped without a value and the scheduler observes a
//! `RecvError`, which it treats as `WORKER_LOST`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::task::{Task, TaskOutcome, TaskType};

pub struct WorkerJob {
    pub task: Task,
    pub respond_to: oneshot::Sender<TaskOutcome>,
}

/// Shared, read-only context every worker needs to execute a task. Cheap to
/// clone; never mutated after construction.
#[derive(Clone)]
pub struct WorkerContext {
    pub http_client: reqwest::Client,
    pub balance_api_key: Option<Arc<str>>,
    pub balance_api_base: String,
    pub max_heap_bytes: u64,
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            balance_api_key: None,
            balance_api_base: "https://api.etherscan.io/api".to_string(),
            max_heap_bytes: 512 * 1024 * 1024,
        }
    }
}

pub struct Worker {
    pub id: usize,
    sender: mpsc::Sender<WorkerJob>,
    handle: JoinHandle<()>,
    busy: Arc<AtomicBool>,
}

impl Worker {
    pub fn spawn(id: usize, ctx: WorkerContext) -> Self {
        let (tx, mut rx) = mpsc::channel::<WorkerJob>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let busy_task = Arc::clone(&busy);
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                busy_task.store(true, Ordering::Release);
                let outcome = execute(&job.task, &ctx).await;
                let _ = job.respond_to.send(outcome);
                busy_task.store(false, Ordering::Release);
            }
        });
        Self {
            id,
            sender: tx,
            handle,
            busy,
        }
    }

    /// `false` once the worker's task loop has ended, whether by panic or
    /// (should never happen while the scheduler holds the sender) channel
    /// closure.
    pub fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    /// `true` while the worker is executing a job, or has been reserved via
    /// `mark_busy` for a job about to be submitted. Dispatch must skip busy
    /// workers so concurrent tasks actually fan out across the pool instead
    /// of queuing behind one worker's single-slot channel.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Reserves the worker ahead of `submit`, so two concurrent dispatches
    /// can never pick the same idle worker before either job is in flight.
    pub fn mark_busy(&self) {
        self.busy.store(true, Ordering::Release);
    }

    pub async fn submit(&self, job: WorkerJob) -> Result<(), WorkerJob> {
        self.sender.send(job).await.map_err(|e| e.0)
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn execute(task: &Task, ctx: &WorkerContext) -> TaskOutcome {
    match &task.task_type {
        TaskType::WhaleBalanceCheck { address } => whale_balance_check(address, ctx).await,
        TaskType::SystemHealthCheck => system_health_check(ctx),
        TaskType::PerformanceMetrics { caller_metrics } => performance_metrics(caller_metrics),
        TaskType::ApiHealthCheck { url } => api_health_check(url, ctx, task.timeout_ms).await,
        TaskType::MemoryCleanup => memory_cleanup(),
    }
}

async fn whale_balance_check(address: &str, ctx: &WorkerContext) -> TaskOutcome {
    let Some(api_key) = &ctx.balance_api_key else {
        return TaskOutcome::Failed("no balance provider api key configured".to_string());
    };
    let url = format!(
        "{}?module=account&action=balance&address={address}&tag=latest&apikey={}",
        ctx.balance_api_base, api_key
    );
    let response = match ctx.http_client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => return TaskOutcome::Failed(format!("balance lookup request failed: {e}")),
    };
    let body: serde_json::Value = match response.json().await {
        Ok(v) => v,
        Err(e) => return TaskOutcome::Failed(format!("balance lookup response decode failed: {e}")),
    };
    let status_ok = body.get("status").and_then(|v| v.as_str()) == Some("1");
    if !status_ok {
        return TaskOutcome::Failed(format!("balance provider rejected request: {body}"));
    }
    let wei: u128 = body
        .get("result")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let native = wei as f64 / 1e18;
    TaskOutcome::Success(serde_json::json!({
        "address": address,
        "native_balance": native,
        "wei": wei.to_string(),
    }))
}

fn read_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

fn system_health_check(ctx: &WorkerContext) -> TaskOutcome {
    let rss = read_rss_bytes().unwrap_or(0);
    let ratio = if ctx.max_heap_bytes > 0 {
        rss as f64 / ctx.max_heap_bytes as f64
    } else {
        0.0
    };
    let status = if ratio > 0.95 {
        "CRITICAL"
    } else if ratio > 0.90 {
        "WARNING"
    } else {
        "HEALTHY"
    };
    TaskOutcome::Success(serde_json::json!({
        "status": status,
        "rss_bytes": rss,
        "max_heap_bytes": ctx.max_heap_bytes,
        "ratio": ratio,
        "uptime_reported_at": Utc::now().to_rfc3339(),
    }))
}

fn performance_metrics(caller_metrics: &serde_json::Value) -> TaskOutcome {
    let rss = read_rss_bytes().unwrap_or(0);
    TaskOutcome::Success(serde_json::json!({
        "process": { "rss_bytes": rss },
        "caller_metrics": caller_metrics,
        "collected_at": Utc::now().to_rfc3339(),
    }))
}

async fn api_health_check(url: &str, ctx: &WorkerContext, timeout_ms: u64) -> TaskOutcome {
    let start = std::time::Instant::now();
    let result = tokio::time::timeout(
        std::time::Duration::from_millis(timeout_ms),
        ctx.http_client.get(url).send(),
    )
    .await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Err(_) => TaskOutcome::Success(serde_json::json!({
            "url": url, "status": "UNHEALTHY", "reason": "timeout", "elapsed_ms": elapsed_ms,
        })),
        Ok(Err(e)) => TaskOutcome::Success(serde_json::json!({
            "url": url, "status": "UNHEALTHY", "reason": e.to_string(), "elapsed_ms": elapsed_ms,
        })),
        Ok(Ok(response)) => {
            let code = response.status().as_u16();
            let status = if response.status().is_success() && elapsed_ms < 2000 {
                "HEALTHY"
            } else if response.status().is_success() {
                "DEGRADED"
            } else {
                "UNHEALTHY"
            };
            TaskOutcome::Success(serde_json::json!({
                "url": url, "status": status, "http_status": code, "elapsed_ms": elapsed_ms,
            }))
        }
    }
}

fn memory_cleanup() -> TaskOutcome {
    let before = read_rss_bytes().unwrap_or(0);
    // Rust has no runtime GC to trigger; report the measurement pair anyway
    // so the task type is uniformly observable across deployments.
    let after = read_rss_bytes().unwrap_or(before);
    TaskOutcome::Success(serde_json::json!({
        "rss_before_bytes": before,
        "rss_after_bytes": after,
    }))
}
