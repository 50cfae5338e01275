//! Task and status types for the scheduler.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

/// The task kinds a worker must be able to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TaskType {
    WhaleBalanceCheck { address: String },
    SystemHealthCheck,
    PerformanceMetrics { caller_metrics: serde_json::Value },
    ApiHealthCheck { url: String },
    MemoryCleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    /// 1 (lowest) to 10 (highest); the scheduler dispatches the highest
    /// priority ready task first.
    pub priority: u8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub scheduled_at: i64,
    /// Task ids that must all be in the COMPLETED set before this one is ready.
    pub dependencies: Vec<TaskId>,
    pub status: TaskStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    /// Insertion order, assigned by the scheduler at `schedule()` time; used
    /// only as a stable secondary tiebreaker.
    pub(crate) insertion_seq: u64,
}

/// Caller-facing fields accepted by `Scheduler::schedule`.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub task_type: TaskType,
    pub priority: u8,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub scheduled_at: i64,
    pub dependencies: Vec<TaskId>,
}

impl TaskConfig {
    pub fn now(task_type: TaskType, priority: u8) -> Self {
        Self {
            task_type,
            priority: priority.clamp(1, 10),
            max_retries: 3,
            timeout_ms: 30_000,
            scheduled_at: chrono::Utc::now().timestamp_millis(),
            dependencies: Vec::new(),
        }
    }
}

impl Task {
    pub fn is_ready(&self, now: i64, completed: &std::collections::HashSet<TaskId>) -> bool {
        self.status == TaskStatus::Pending
            && now >= self.scheduled_at
            && self.dependencies.iter().all(|d| completed.contains(d))
    }
}

/// What a worker reports back for one executed task.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Success(serde_json::Value),
    Failed(String),
    TimedOut,
    WorkerLost,
}
