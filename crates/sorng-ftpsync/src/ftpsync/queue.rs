//! Sequential download queue.
//!
//! Tasks run strictly one at a time in FIFO order. Each call to
//! [`DownloadQueue::step`] performs one unit of work: a directory task or a
//! whole file transfer. A tick worker ([`DownloadQueue::spawn_worker`]) or
//! [`DownloadQueue::run_until_idle`] drives the steps.
//!
//! The FIFO lock is never held across network I/O, so `enqueue` and
//! `cancel` stay responsive while a file is streaming.

use crate::ftpsync::error::{FtpError, FtpResult};
use crate::ftpsync::events::EventSink;
use crate::ftpsync::transport::{CancelFlag, SharedTransport};
use crate::ftpsync::types::*;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What a single [`DownloadQueue::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do; the queue is not running.
    Idle,
    DirectoryReady,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Default)]
struct QueueInner {
    state: QueueState,
    tasks: VecDeque<DownloadTask>,
    /// Tasks enqueued while a cancellation is being resolved.
    deferred: Vec<DownloadTask>,
    in_flight: Option<String>,
    records: Vec<TaskRecord>,
    /// Tick workers currently alive.
    workers: usize,
}

#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<Mutex<QueueInner>>,
    /// Serialises steps so two drivers never run tasks concurrently.
    exec: Arc<tokio::sync::Mutex<()>>,
    cancel: CancelFlag,
    transport: SharedTransport,
    events: Arc<dyn EventSink>,
    config: QueueConfig,
}

impl DownloadQueue {
    pub fn new(transport: SharedTransport, events: Arc<dyn EventSink>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            exec: Arc::new(tokio::sync::Mutex::new(())),
            cancel: CancelFlag::new(),
            transport,
            events,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Enqueue ─────────────────────────────────────────────────────

    /// Append a task to the FIFO tail. An idle queue starts running.
    pub fn enqueue(&self, task: DownloadTask) {
        self.enqueue_all(std::iter::once(task));
    }

    /// Append several tasks, preserving their order.
    pub fn enqueue_all<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = DownloadTask>,
    {
        let mut inner = self.lock();
        let mut added = 0usize;
        for task in tasks {
            log::debug!("enqueue {} -> {}", task.remote_path, task.local_path.display());
            if inner.state == QueueState::Cancelling {
                inner.deferred.push(task);
            } else {
                inner.tasks.push_back(task);
            }
            added += 1;
        }
        if added > 0 && inner.state == QueueState::Idle {
            inner.state = QueueState::Running;
        }
    }

    // ─── Cancel ──────────────────────────────────────────────────────

    /// Abort the in-flight transfer and drop everything still pending.
    ///
    /// Only valid while running. With a transfer in flight the queue enters
    /// `Cancelling` until the transport notices the flag; otherwise it goes
    /// straight back to `Idle`.
    pub fn cancel(&self) -> FtpResult<()> {
        let notify = {
            let mut inner = self.lock();
            if inner.state != QueueState::Running {
                return Err(FtpError::invalid_state(format!(
                    "Cannot cancel queue in state {:?}",
                    inner.state
                )));
            }
            let dropped = inner.tasks.len();
            inner.tasks.clear();
            log::info!("cancelling download queue ({} pending tasks dropped)", dropped);
            if inner.in_flight.is_some() {
                inner.state = QueueState::Cancelling;
                self.cancel.cancel();
                false
            } else {
                inner.state = QueueState::Idle;
                true
            }
        };
        if notify {
            self.events.emit(CoreEvent::QueueCancelled);
        }
        Ok(())
    }

    // ─── Execution ───────────────────────────────────────────────────

    /// Execute the task at the head of the FIFO.
    pub async fn step(&self) -> StepOutcome {
        let _exec = self.exec.lock().await;

        let task = {
            let mut inner = self.lock();
            if inner.state != QueueState::Running {
                return StepOutcome::Idle;
            }
            match inner.tasks.pop_front() {
                Some(task) => {
                    inner.in_flight = Some(task.id.clone());
                    task
                }
                None => {
                    inner.state = QueueState::Idle;
                    drop(inner);
                    self.events.emit(CoreEvent::QueueDrained);
                    return StepOutcome::Idle;
                }
            }
        };

        let started_at = Utc::now();
        let (state, bytes, error) = if task.is_directory {
            match tokio::fs::create_dir_all(&task.local_path).await {
                Ok(()) => (TaskState::Completed, 0, None),
                Err(e) => (TaskState::Failed, 0, Some(FtpError::from(e).with_path(task.local_path.display().to_string()))),
            }
        } else {
            self.download_file(&task).await
        };

        let outcome = match (state, task.is_directory) {
            (TaskState::Completed, true) => StepOutcome::DirectoryReady,
            (TaskState::Completed, false) => StepOutcome::Completed,
            (TaskState::Failed, _) => StepOutcome::Failed,
            (TaskState::Cancelled, _) => StepOutcome::Cancelled,
        };

        self.finish(task, state, bytes, error, started_at);
        outcome
    }

    async fn download_file(&self, task: &DownloadTask) -> (TaskState, u64, Option<FtpError>) {
        let file = match tokio::fs::File::create(&task.local_path).await {
            Ok(f) => f,
            Err(e) => {
                let err = FtpError::from(e).with_path(task.local_path.display().to_string());
                return (TaskState::Failed, 0, Some(err));
            }
        };

        self.events.emit(CoreEvent::TaskStarted {
            task_id: task.id.clone(),
            display_name: task.display_name.clone(),
        });
        log::info!("downloading {} -> {}", task.remote_path, task.local_path.display());

        let events = Arc::clone(&self.events);
        let snapshot = task.clone();
        let mut forward = move |received: u64, total: u64| {
            events.emit(CoreEvent::Progress(TransferProgress::new(&snapshot, received, total)));
        };

        let mut writer = BufWriter::with_capacity(self.config.chunk_size.max(1), file);
        let result = {
            let mut transport = self.transport.lock().await;
            transport
                .retrieve_file(&task.remote_path, &mut writer, &mut forward, &self.cancel)
                .await
        };
        let result = match result {
            Ok(n) => writer.flush().await.map(|_| n).map_err(FtpError::from),
            Err(e) => Err(e),
        };
        drop(writer);

        match result {
            Ok(n) => (TaskState::Completed, n, None),
            Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                self.discard_partial(task).await;
                (TaskState::Cancelled, 0, Some(e))
            }
            Err(e) => {
                if self.config.discard_partial_on_failure {
                    self.discard_partial(task).await;
                }
                (TaskState::Failed, 0, Some(e))
            }
        }
    }

    async fn discard_partial(&self, task: &DownloadTask) {
        if let Err(e) = tokio::fs::remove_file(&task.local_path).await {
            log::warn!("could not remove partial file {}: {}", task.local_path.display(), e);
        }
    }

    /// Record the finished task and resolve drain/cancel transitions.
    fn finish(
        &self,
        task: DownloadTask,
        state: TaskState,
        bytes: u64,
        error: Option<FtpError>,
        started_at: chrono::DateTime<Utc>,
    ) {
        let mut notices = Vec::new();
        match (&error, state) {
            (None, _) if !task.is_directory => notices.push(CoreEvent::TaskCompleted {
                task_id: task.id.clone(),
                display_name: task.display_name.clone(),
                bytes,
            }),
            (Some(e), TaskState::Failed) => {
                log::warn!("{} failed: {}", task.display_name, e);
                notices.push(CoreEvent::TaskFailed {
                    task_id: task.id.clone(),
                    display_name: task.display_name.clone(),
                    error: e.to_string(),
                });
            }
            _ => {}
        }

        {
            let mut inner = self.lock();
            inner.in_flight = None;
            inner.records.push(TaskRecord {
                task,
                state,
                bytes,
                error: error.map(|e| e.to_string()),
                started_at,
                finished_at: Utc::now(),
            });

            if inner.state == QueueState::Cancelling {
                inner.tasks.clear();
                self.cancel.reset();
                let deferred = std::mem::take(&mut inner.deferred);
                inner.state = if deferred.is_empty() {
                    QueueState::Idle
                } else {
                    QueueState::Running
                };
                inner.tasks.extend(deferred);
                notices.push(CoreEvent::QueueCancelled);
            } else if inner.tasks.is_empty() {
                inner.state = QueueState::Idle;
                notices.push(CoreEvent::QueueDrained);
            }
        }

        for event in notices {
            self.events.emit(event);
        }
    }

    /// Step until the queue goes idle.
    pub async fn run_until_idle(&self) {
        while self.step().await != StepOutcome::Idle {}
    }

    /// Drive the queue from a periodic tick, one step per tick.
    ///
    /// The worker exits once the queue is idle; enqueueing afterwards needs
    /// a new worker (see [`DownloadQueue::ensure_worker`]).
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        self.lock().workers += 1;
        self.launch_worker()
    }

    /// Spawn a worker unless one is already alive.
    pub fn ensure_worker(&self) -> Option<JoinHandle<()>> {
        {
            let mut inner = self.lock();
            if inner.workers > 0 {
                return None;
            }
            inner.workers += 1;
        }
        Some(self.launch_worker())
    }

    fn launch_worker(&self) -> JoinHandle<()> {
        let queue = self.clone();
        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if queue.step().await == StepOutcome::Idle && queue.retire_worker() {
                    log::debug!("download worker stopped, queue idle");
                    break;
                }
            }
        })
    }

    /// Decided under the FIFO lock so an `enqueue` racing the worker's last
    /// idle step either keeps it alive or sees it gone.
    fn retire_worker(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == QueueState::Running {
            return false;
        }
        inner.workers = inner.workers.saturating_sub(1);
        true
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn state(&self) -> QueueState {
        self.lock().state
    }

    pub fn pending(&self) -> Vec<DownloadTask> {
        let inner = self.lock();
        inner.tasks.iter().chain(inner.deferred.iter()).cloned().collect()
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        self.lock().records.clone()
    }

    /// Drop the bookkeeping for already-executed tasks.
    pub fn clear_finished(&self) {
        self.lock().records.clear();
    }

    pub fn status(&self) -> QueueStatus {
        let inner = self.lock();
        let count = |s: TaskState| inner.records.iter().filter(|r| r.state == s).count();
        QueueStatus {
            state: inner.state,
            pending: inner.tasks.len() + inner.deferred.len(),
            completed: count(TaskState::Completed),
            failed: count(TaskState::Failed),
            cancelled: count(TaskState::Cancelled),
            bytes_downloaded: inner.records.iter().map(|r| r.bytes).sum(),
        }
    }
}
