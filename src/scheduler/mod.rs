//! Task Scheduler + Worker Pool (component B).
//!
//! A priority + dependency-aware queue dispatched across a fixed pool of
//! isolated workers.

pub mod task;
pub mod worker;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};

pub use task::{Task, TaskConfig, TaskId, TaskOutcome, TaskStatus, TaskType};
pub use worker::{Worker, WorkerContext, WorkerJob};

const DEFAULT_MAX_QUEUE_SIZE: usize = 500;
const DEFAULT_MAX_CONCURRENT_TASKS: usize = 8;
const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("QUEUE_FULL: scheduler queue at capacity")]
    QueueFull,
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

struct ReadyEntry {
    priority: u8,
    scheduled_at: i64,
    insertion_seq: u64,
    task_id: TaskId,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.task_id == other.task_id
    }
}
impl Eq for ReadyEntry {}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by priority; on a tie, earlier `scheduled_at` wins
        // (per the scheduler-ordering testable property), then earlier
        // insertion order as a final stable tiebreaker.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.scheduled_at.cmp(&self.scheduled_at))
            .then_with(|| other.insertion_seq.cmp(&self.insertion_seq))
    }
}
impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Scheduler {
    max_queue_size: usize,
    max_concurrent_tasks: usize,
    tasks: Mutex<HashMap<TaskId, Task>>,
    completed: Mutex<HashSet<TaskId>>,
    failed: Mutex<HashSet<TaskId>>,
    workers: Mutex<Vec<Worker>>,
    worker_ctx: WorkerContext,
    running_count: AtomicUsize,
    insertion_counter: AtomicU64,
    accepting: std::sync::atomic::AtomicBool,
}

impl Scheduler {
    pub fn new(worker_count: usize, worker_ctx: WorkerContext) -> Arc<Self> {
        let workers = (0..worker_count.max(1))
            .map(|id| Worker::spawn(id, worker_ctx.clone()))
            .collect();
        Arc::new(Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            tasks: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashSet::new()),
            failed: Mutex::new(HashSet::new()),
            workers: Mutex::new(workers),
            worker_ctx,
            running_count: AtomicUsize::new(0),
            insertion_counter: AtomicU64::new(0),
            accepting: std::sync::atomic::AtomicBool::new(true),
        })
    }

    pub async fn schedule(&self, config: TaskConfig) -> Result<TaskId, SchedulerError> {
        if !self.accepting.load(AtomicOrdering::Relaxed) {
            return Err(SchedulerError::QueueFull);
        }
        let mut tasks = self.tasks.lock().await;
        if tasks.len() >= self.max_queue_size {
            return Err(SchedulerError::QueueFull);
        }
        let now = Utc::now().timestamp_millis();
        let id = uuid::Uuid::new_v4();
        let insertion_seq = self.insertion_counter.fetch_add(1, AtomicOrdering::Relaxed);
        let task = Task {
            id,
            task_type: config.task_type,
            priority: config.priority.clamp(1, 10),
            retry_count: 0,
            max_retries: config.max_retries,
            timeout_ms: config.timeout_ms,
            scheduled_at: config.scheduled_at.max(now),
            dependencies: config.dependencies,
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            insertion_seq,
        };
        tasks.insert(id, task);
        Ok(id)
    }

    /// Runs the scheduler tick loop (default cadence 1s) until `shutdown` is
    /// called. Intended to be spawned as its own task by the Engine.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if !self.accepting.load(AtomicOrdering::Relaxed)
                && self.running_count.load(AtomicOrdering::Relaxed) == 0
            {
                break;
            }
            self.tick().await;
        }
    }

    async fn ready_heap(&self) -> BinaryHeap<ReadyEntry> {
        let tasks = self.tasks.lock().await;
        let completed = self.completed.lock().await;
        let now = Utc::now().timestamp_millis();
        tasks
            .values()
            .filter(|t| t.is_ready(now, &completed))
            .map(|t| ReadyEntry {
                priority: t.priority,
                scheduled_at: t.scheduled_at,
                insertion_seq: t.insertion_seq,
                task_id: t.id,
            })
            .collect()
    }

    async fn tick(self: &Arc<Self>) {
        if !self.accepting.load(AtomicOrdering::Relaxed) {
            return;
        }
        let mut heap = self.ready_heap().await;
        while self.running_count.load(AtomicOrdering::Relaxed) < self.max_concurrent_tasks {
            let Some(entry) = heap.pop() else { break };
            let Some(worker_idx) = self.pick_worker().await else {
                break;
            };
            self.running_count.fetch_add(1, AtomicOrdering::Relaxed);
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.dispatch(entry.task_id, worker_idx).await;
                scheduler
                    .running_count
                    .fetch_sub(1, AtomicOrdering::Relaxed);
            });
        }
    }

    /// Finds an idle worker and reserves it in the same locked pass, so two
    /// concurrent `tick()` dispatches can never race onto the same worker.
    async fn pick_worker(&self) -> Option<usize> {
        let workers = self.workers.lock().await;
        let idx = workers.iter().position(|w| w.is_alive() && !w.is_busy())?;
        workers[idx].mark_busy();
        Some(idx)
    }

    async fn dispatch(self: &Arc<Self>, task_id: TaskId, worker_idx: usize) {
        let mut task = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(&task_id) else {
                return;
            };
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now().timestamp_millis());
            task.clone()
        };

        let (tx, rx) = oneshot::channel();
        let job = WorkerJob {
            task: task.clone(),
            respond_to: tx,
        };

        let submit_result = {
            let workers = self.workers.lock().await;
            match workers.get(worker_idx) {
                Some(w) => w.submit(job).await,
                None => Err(job),
            }
        };

        if submit_result.is_err() {
            self.replace_worker(worker_idx).await;
            self.complete(&mut task, TaskOutcome::WorkerLost).await;
            return;
        }

        let outcome = match tokio::time::timeout(Duration::from_millis(task.timeout_ms), rx).await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                self.replace_worker(worker_idx).await;
                TaskOutcome::WorkerLost
            }
            Err(_) => TaskOutcome::TimedOut,
        };

        self.complete(&mut task, outcome).await;
    }

    async fn replace_worker(&self, worker_idx: usize) {
        let mut workers = self.workers.lock().await;
        if let Some(slot) = workers.get_mut(worker_idx) {
            if !slot.is_alive() {
                *slot = Worker::spawn(slot.id, self.worker_ctx.clone());
            }
        }
    }

    async fn complete(&self, task: &mut Task, outcome: TaskOutcome) {
        let now = Utc::now().timestamp_millis();
        match outcome {
            TaskOutcome::Success(_) => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(now);
                self.completed.lock().await.insert(task.id);
                self.tasks.lock().await.insert(task.id, task.clone());
            }
            TaskOutcome::Failed(_) | TaskOutcome::TimedOut | TaskOutcome::WorkerLost => {
                if task.retry_count < task.max_retries {
                    task.retry_count += 1;
                    task.status = TaskStatus::Pending;
                    task.scheduled_at =
                        now + 1000 * 2i64.pow(task.retry_count.min(20));
                    self.tasks.lock().await.insert(task.id, task.clone());
                } else {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(now);
                    self.failed.lock().await.insert(task.id);
                    self.tasks.lock().await.insert(task.id, task.clone());
                }
            }
        }
    }

    /// Sequential shutdown: stop accepting new tasks, wait up to `deadline`
    /// for in-flight tasks to drain, then abort remaining workers.
    pub async fn shutdown(&self, deadline: Duration) {
        self.accepting.store(false, AtomicOrdering::Relaxed);
        let start = std::time::Instant::now();
        while self.running_count.load(AtomicOrdering::Relaxed) > 0 && start.elapsed() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let workers = self.workers.lock().await;
        for worker in workers.iter() {
            worker.abort();
        }
    }

    pub async fn completed_count(&self) -> usize {
        self.completed.lock().await.len()
    }

    pub async fn failed_count(&self) -> usize {
        self.failed.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_entry_orders_by_priority_then_scheduled_at() {
        let a = ReadyEntry {
            priority: 5,
            scheduled_at: 100,
            insertion_seq: 0,
            task_id: uuid::Uuid::new_v4(),
        };
        let b = ReadyEntry {
            priority: 5,
            scheduled_at: 50,
            insertion_seq: 1,
            task_id: uuid::Uuid::new_v4(),
        };
        let c = ReadyEntry {
            priority: 9,
            scheduled_at: 999,
            insertion_seq: 2,
            task_id: uuid::Uuid::new_v4(),
        };
        let mut heap = BinaryHeap::new();
        heap.push(a);
        heap.push(b);
        heap.push(c);
        assert_eq!(heap.pop().unwrap().priority, 9);
        let next = heap.pop().unwrap();
        assert_eq!(next.priority, 5);
        assert_eq!(next.scheduled_at, 50);
    }

    #[tokio::test]
    async fn schedule_rejects_when_queue_full() {
        let scheduler = Scheduler::new(1, WorkerContext::default());
        // Shrink effective capacity by hand for the test via repeated schedule calls.
        for _ in 0..DEFAULT_MAX_QUEUE_SIZE {
            scheduler
                .schedule(TaskConfig::now(TaskType::MemoryCleanup, 5))
                .await
                .expect("should accept while below capacity");
        }
        let result = scheduler
            .schedule(TaskConfig::now(TaskType::MemoryCleanup, 5))
            .await;
        assert!(matches!(result, Err(SchedulerError::QueueFull)));
    }

    #[tokio::test]
    async fn task_ready_requires_dependencies_completed() {
        let dep_id = uuid::Uuid::new_v4();
        let task = Task {
            id: uuid::Uuid::new_v4(),
            task_type: TaskType::MemoryCleanup,
            priority: 5,
            retry_count: 0,
            max_retries: 3,
            timeout_ms: 1000,
            scheduled_at: 0,
            dependencies: vec![dep_id],
            status: TaskStatus::Pending,
            created_at: 0,
            started_at: None,
            completed_at: None,
            insertion_seq: 0,
        };
        let empty = HashSet::new();
        assert!(!task.is_ready(1000, &empty));
        let mut done = HashSet::new();
        done.insert(dep_id);
        assert!(task.is_ready(1000, &done));
    }
}
