use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;
use crate::errors::XsltProbeError;
use crate::models::StylesheetRef;
use tracing::{debug, warn};

pub type TaskId = Uuid;

/// Receives the outcome of a task. Called exactly once per task.
pub type Completion<T> = Box<dyn FnOnce(Result<T, XsltProbeError>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Initialization,
    StaticAnalysis,
    SchemaExploration,
    SchemaEvolution,
    XssCheck,
    XssFollowUp,
    ReportCompilation,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization => write!(f, "initialization"),
            Self::StaticAnalysis => write!(f, "static-analysis"),
            Self::SchemaExploration => write!(f, "schema-exploration"),
            Self::SchemaEvolution => write!(f, "schema-evolution"),
            Self::XssCheck => write!(f, "xss-check"),
            Self::XssFollowUp => write!(f, "xss-follow-up"),
            Self::ReportCompilation => write!(f, "report-compilation"),
        }
    }
}

// Given `Some(error)` the completion is invoked right away with that error
// and no future is returned.
type TaskBody = Box<dyn FnOnce(Option<XsltProbeError>) -> Option<BoxFuture<'static, ()>> + Send>;

/// A unit of work bound to its completion callback.
pub struct Task {
    pub id: TaskId,
    pub stylesheet: StylesheetRef,
    pub kind: TaskKind,
    body: TaskBody,
}

impl Task {
    pub fn new<T, F>(
        id: TaskId,
        stylesheet: StylesheetRef,
        kind: TaskKind,
        work: F,
        on_complete: Completion<T>,
    ) -> Self
    where
        T: Send + 'static,
        F: Future<Output = Result<T, XsltProbeError>> + Send + 'static,
    {
        let body: TaskBody = Box::new(move |rejection| match rejection {
            Some(error) => {
                on_complete(Err(error));
                None
            }
            None => Some(
                async move {
                    let result = match AssertUnwindSafe(work).catch_unwind().await {
                        Ok(result) => result,
                        Err(panic) => Err(XsltProbeError::Internal(format!(
                            "Task panicked: {}",
                            panic_message(panic.as_ref())
                        ))),
                    };
                    on_complete(result);
                }
                .boxed(),
            ),
        });
        Self {
            id,
            stylesheet,
            kind,
            body,
        }
    }

    /// Run the work and report its outcome.
    pub async fn run(self) {
        if let Some(work) = (self.body)(None) {
            work.await;
        }
    }

    /// Report `error` without running the work.
    pub fn reject(self, error: XsltProbeError) {
        let _ = (self.body)(Some(error));
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("stylesheet", &self.stylesheet)
            .field("kind", &self.kind)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Executes tasks concurrently. `submit` never runs a task on the caller's
/// stack, so it is safe to call while holding a lock the completion needs.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    fn submit(&self, task: Task);

    /// Wait until every submitted task, including tasks submitted while
    /// waiting, has finished.
    async fn await_completion(&self);

    /// Reject queued and future submissions. Running tasks finish.
    fn shutdown(&self);
}

/// Tokio-backed pool bounding concurrency with a semaphore.
pub struct TokioWorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    workers: usize,
}

impl TokioWorkerPool {
    /// Pool on the current runtime.
    pub fn new(workers: usize) -> Result<Self, XsltProbeError> {
        let handle = Handle::try_current()
            .map_err(|e| XsltProbeError::Pool(format!("No tokio runtime: {}", e)))?;
        Ok(Self::with_handle(handle, workers))
    }

    pub fn with_handle(handle: Handle, workers: usize) -> Self {
        let workers = workers.max(1);
        debug!(workers, "Worker pool created");
        Self {
            handle,
            permits: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Tasks submitted and not yet finished.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }
}

#[async_trait]
impl WorkerPool for TokioWorkerPool {
    fn submit(&self, task: Task) {
        if self.shutdown.is_cancelled() {
            warn!(task = %task.id, kind = %task.kind, "Submission after shutdown rejected");
            self.tracker.spawn_on(
                async move { task.reject(XsltProbeError::Pool("Worker pool is shut down".to_string())) },
                &self.handle,
            );
            return;
        }

        let permits = Arc::clone(&self.permits);
        let shutdown = self.shutdown.clone();
        self.tracker.spawn_on(
            async move {
                let permit = tokio::select! {
                    permit = permits.acquire_owned() => permit.ok(),
                    _ = shutdown.cancelled() => None,
                };
                match permit {
                    Some(_permit) => task.run().await,
                    None => task.reject(XsltProbeError::Pool(
                        "Worker pool shut down before the task started".to_string(),
                    )),
                }
            },
            &self.handle,
        );
    }

    async fn await_completion(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn sheet() -> StylesheetRef {
        StylesheetRef::new("t.xsl")
    }

    fn recording<T: Send + 'static>(log: Arc<Mutex<Vec<Result<T, String>>>>) -> Completion<T> {
        Box::new(move |r| log.lock().unwrap().push(r.map_err(|e| e.to_string())))
    }

    #[tokio::test]
    async fn test_completion_receives_result() {
        let pool = TokioWorkerPool::new(2).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        pool.submit(Task::new(Uuid::new_v4(), sheet(), TaskKind::XssCheck, async { Ok(7) }, recording(log.clone())));
        pool.submit(Task::new(
            Uuid::new_v4(),
            sheet(),
            TaskKind::XssCheck,
            async { Err::<i32, _>(XsltProbeError::Transform("bad".to_string())) },
            recording(log.clone()),
        ));
        pool.await_completion().await;
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.contains(&Ok(7)));
        assert!(log.iter().any(|r| r.is_err()));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_completion() {
        let pool = TokioWorkerPool::new(1).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        pool.submit(Task::new(
            Uuid::new_v4(),
            sheet(),
            TaskKind::SchemaExploration,
            async {
                if true {
                    panic!("exploded");
                }
                Ok(())
            },
            recording(log.clone()),
        ));
        pool.await_completion().await;
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].as_ref().unwrap_err().contains("exploded"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = TokioWorkerPool::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit(Task::new(
                Uuid::new_v4(),
                sheet(),
                TaskKind::XssCheck,
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                Box::new(|_| {}),
            ));
        }
        pool.await_completion().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn test_tasks_submitted_from_completions_are_awaited() {
        let pool = Arc::new(TokioWorkerPool::new(2).unwrap());
        let done = Arc::new(AtomicUsize::new(0));
        let inner_pool = pool.clone();
        let inner_done = done.clone();
        pool.submit(Task::new(
            Uuid::new_v4(),
            sheet(),
            TaskKind::XssCheck,
            async { Ok(()) },
            Box::new(move |_| {
                inner_pool.submit(Task::new(
                    Uuid::new_v4(),
                    sheet(),
                    TaskKind::XssFollowUp,
                    async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(())
                    },
                    Box::new(move |_| {
                        inner_done.fetch_add(1, Ordering::SeqCst);
                    }),
                ));
            }),
        ));
        pool.await_completion().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let pool = TokioWorkerPool::new(1).unwrap();
        pool.shutdown();
        let log = Arc::new(Mutex::new(Vec::new()));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_inner = ran.clone();
        pool.submit(Task::new(
            Uuid::new_v4(),
            sheet(),
            TaskKind::ReportCompilation,
            async move {
                ran_inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            recording(log.clone()),
        ));
        pool.await_completion().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].is_err());
    }

    #[test]
    fn test_reject_invokes_completion_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let task = Task::new(Uuid::new_v4(), sheet(), TaskKind::Initialization, async { Ok(()) }, recording(log.clone()));
        task.reject(XsltProbeError::Pool("closed".to_string()));
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
