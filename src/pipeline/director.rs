use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, DocumentRequest, StylesheetRef};
use crate::pool::{Completion, Task, TaskId, WorkerPool};
use crate::tasks::{FollowUpCollector, TaskFactory};
use super::events::ProcessEvent;
use super::phase::display_name;
use super::state::{DirectorSettings, DirectorStats, ProcessState, ProcessingMode};
use tracing::{debug, error, info, warn};

struct DirectorInner {
    state: ProcessState,
    /// Tasks of the current phase that have not completed yet.
    open_tasks: HashSet<TaskId>,
    failed_tasks: usize,
    collected: Vec<DocumentModifier>,
    evolution_passes: u32,
    stats: DirectorStats,
}

/// Drives one stylesheet through its processing phases.
///
/// Every completion callback runs its handler under the Director's lock, so
/// handlers see a consistent phase and task set. Tasks produced by a handler
/// are submitted after the lock is released.
pub struct ProcessDirector {
    stylesheet: StylesheetRef,
    mode: ProcessingMode,
    settings: DirectorSettings,
    pool: Arc<dyn WorkerPool>,
    factory: Arc<dyn TaskFactory>,
    inner: Mutex<DirectorInner>,
    state_tx: watch::Sender<ProcessState>,
    event_tx: Option<mpsc::UnboundedSender<ProcessEvent>>,
}

type Handler<T> = fn(&Arc<ProcessDirector>, TaskId, Result<T, XsltProbeError>);

impl ProcessDirector {
    pub fn new(
        stylesheet: StylesheetRef,
        mode: ProcessingMode,
        settings: DirectorSettings,
        pool: Arc<dyn WorkerPool>,
        factory: Arc<dyn TaskFactory>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::New);
        Self {
            stylesheet,
            mode,
            settings,
            pool,
            factory,
            inner: Mutex::new(DirectorInner {
                state: ProcessState::New,
                open_tasks: HashSet::new(),
                failed_tasks: 0,
                collected: Vec::new(),
                evolution_passes: 0,
                stats: DirectorStats::default(),
            }),
            state_tx,
            event_tx: None,
        }
    }

    /// Attach an event channel for streaming progress to a display.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn stylesheet(&self) -> &StylesheetRef {
        &self.stylesheet
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn process_state(&self) -> ProcessState {
        self.inner.lock().state
    }

    pub fn is_done(&self) -> bool {
        self.process_state() == ProcessState::Done
    }

    pub fn stats(&self) -> DirectorStats {
        self.inner.lock().stats.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.state_tx.subscribe()
    }

    /// Resolves once the Director reaches DONE.
    pub async fn wait_until_done(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == ProcessState::Done).await;
    }

    /// Start processing. Only the first call has an effect.
    pub fn initialize(self: &Arc<Self>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state != ProcessState::New {
                debug!(stylesheet = %self.stylesheet, state = %inner.state, "Already initialized");
                return;
            }
            info!(stylesheet = %self.stylesheet, mode = %self.mode, "Processing started");
            self.emit(ProcessEvent::ProcessStarted {
                stylesheet: self.stylesheet.uri(),
                mode: self.mode,
            });
            self.enter(&mut inner, ProcessState::Initialize, &mut pending);
        }
        self.submit_all(pending);
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn submit_all(&self, pending: Vec<Task>) {
        for task in pending {
            self.pool.submit(task);
        }
    }

    fn track(&self, inner: &mut DirectorInner) -> TaskId {
        let id = Uuid::new_v4();
        inner.open_tasks.insert(id);
        inner.stats.tasks_submitted += 1;
        id
    }

    fn completion<T: Send + 'static>(self: &Arc<Self>, id: TaskId, handler: Handler<T>) -> Completion<T> {
        let director = Arc::clone(self);
        Box::new(move |result| handler(&director, id, result))
    }

    fn follow_up_collector(self: &Arc<Self>) -> FollowUpCollector {
        let director = Arc::clone(self);
        Arc::new(move |request| director.submit_follow_up(request))
    }

    /// Phase that follows the schema phases for this mode.
    fn after_schema(&self) -> ProcessState {
        match self.mode {
            ProcessingMode::SchemaOnly => ProcessState::CompileReport,
            ProcessingMode::Full | ProcessingMode::XssOnly => ProcessState::CheckXss,
        }
    }

    fn enter(self: &Arc<Self>, inner: &mut DirectorInner, next: ProcessState, pending: &mut Vec<Task>) {
        let previous = inner.state;
        inner.state = next;
        inner.failed_tasks = 0;
        self.state_tx.send_replace(next);
        info!(stylesheet = %self.stylesheet, from = %previous, to = %next, "State changed");
        self.emit(ProcessEvent::StateChanged {
            stylesheet: self.stylesheet.uri(),
            from: previous,
            to: next,
            display_name: display_name(next).to_string(),
        });

        match next {
            ProcessState::New => {}
            ProcessState::Initialize => {
                let id = self.track(inner);
                let done = self.completion(id, Self::on_initialized);
                pending.push(self.factory.initialization(id, &self.stylesheet, done));
            }
            ProcessState::StaticCheck => {
                let id = self.track(inner);
                let done = self.completion(id, Self::on_static_checked);
                pending.push(self.factory.static_analysis(id, &self.stylesheet, done));
            }
            ProcessState::StaticResultProcessing => {
                let modifiers = std::mem::take(&mut inner.collected);
                let id = self.track(inner);
                let done = self.completion(id, Self::on_static_results_processed);
                pending.push(self.factory.schema_evolution(id, &self.stylesheet, modifiers, done));
            }
            ProcessState::ExploreSchema => {
                inner.collected.clear();
                let count = self.settings.exploration_document_count;
                for _ in 0..count {
                    let id = self.track(inner);
                    let done = self.completion(id, Self::on_explored);
                    pending.push(self.factory.schema_exploration(id, &self.stylesheet, done));
                }
                if count == 0 {
                    self.finish_exploration(inner, pending);
                }
            }
            ProcessState::EvolveSchema => {
                inner.evolution_passes += 1;
                inner.stats.evolution_passes = inner.evolution_passes;
                let modifiers = std::mem::take(&mut inner.collected);
                let id = self.track(inner);
                let done = self.completion(id, Self::on_evolved);
                pending.push(self.factory.schema_evolution(id, &self.stylesheet, modifiers, done));
            }
            ProcessState::CheckXss => {
                let count = self.settings.xss_initial_document_count;
                for _ in 0..count {
                    let id = self.track(inner);
                    let done = self.completion(id, Self::on_xss_checked);
                    pending.push(self.factory.xss_check(
                        id,
                        &self.stylesheet,
                        None,
                        self.follow_up_collector(),
                        done,
                    ));
                }
                if count == 0 {
                    self.enter(inner, ProcessState::CompileReport, pending);
                }
            }
            ProcessState::CompileReport => {
                let id = self.track(inner);
                let done = self.completion(id, Self::on_report_compiled);
                pending.push(self.factory.report_compilation(id, &self.stylesheet, done));
            }
            ProcessState::Done => {
                info!(
                    stylesheet = %self.stylesheet,
                    tasks = inner.stats.tasks_submitted,
                    failed = inner.stats.tasks_failed,
                    aborted = inner.stats.aborted,
                    "Processing finished"
                );
                self.emit(ProcessEvent::ProcessCompleted {
                    stylesheet: self.stylesheet.uri(),
                    aborted: inner.stats.aborted,
                    stats: inner.stats.clone(),
                });
            }
        }
    }

    /// Account for a completed task. Returns false when the task does not
    /// belong to the current phase.
    fn finish_task(
        &self,
        inner: &mut DirectorInner,
        id: TaskId,
        expected: ProcessState,
        failure: Option<&XsltProbeError>,
    ) -> bool {
        if inner.state != expected || !inner.open_tasks.remove(&id) {
            warn!(
                stylesheet = %self.stylesheet,
                task = %id,
                state = %inner.state,
                expected = %expected,
                "Ignoring completion of unknown task"
            );
            return false;
        }
        if let Some(e) = failure {
            inner.failed_tasks += 1;
            inner.stats.tasks_failed += 1;
            warn!(stylesheet = %self.stylesheet, task = %id, state = %expected, error = %e, "Task failed");
            self.emit(ProcessEvent::TaskFailed {
                stylesheet: self.stylesheet.uri(),
                task_id: id,
                state: expected,
                error: e.to_string(),
            });
        }
        true
    }

    fn on_initialized(self: &Arc<Self>, id: TaskId, result: Result<(), XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::Initialize, result.as_ref().err()) {
                return;
            }
            let next = match (&result, self.mode) {
                (Err(_), _) => {
                    error!(stylesheet = %self.stylesheet, "Initialization failed, abandoning stylesheet");
                    inner.stats.aborted = true;
                    ProcessState::Done
                }
                (Ok(()), ProcessingMode::XssOnly) => ProcessState::CheckXss,
                (Ok(()), ProcessingMode::Full | ProcessingMode::SchemaOnly) => ProcessState::StaticCheck,
            };
            self.enter(&mut inner, next, &mut pending);
        }
        self.submit_all(pending);
    }

    fn on_static_checked(self: &Arc<Self>, id: TaskId, result: Result<Vec<DocumentModifier>, XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::StaticCheck, result.as_ref().err()) {
                return;
            }
            let next = match result {
                Err(_) => {
                    error!(stylesheet = %self.stylesheet, "Static analysis failed, abandoning stylesheet");
                    inner.stats.aborted = true;
                    ProcessState::Done
                }
                Ok(modifiers) if modifiers.is_empty() => ProcessState::ExploreSchema,
                Ok(modifiers) => {
                    inner.stats.modifiers_collected += modifiers.len();
                    inner.collected = modifiers;
                    ProcessState::StaticResultProcessing
                }
            };
            self.enter(&mut inner, next, &mut pending);
        }
        self.submit_all(pending);
    }

    fn on_static_results_processed(self: &Arc<Self>, id: TaskId, result: Result<bool, XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::StaticResultProcessing, result.as_ref().err()) {
                return;
            }
            self.enter(&mut inner, ProcessState::ExploreSchema, &mut pending);
        }
        self.submit_all(pending);
    }

    fn on_explored(self: &Arc<Self>, id: TaskId, result: Result<Vec<DocumentModifier>, XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::ExploreSchema, result.as_ref().err()) {
                return;
            }
            if let Ok(modifiers) = result {
                inner.stats.modifiers_collected += modifiers.len();
                inner.collected.extend(modifiers);
            }
            if inner.open_tasks.is_empty() {
                self.finish_exploration(&mut inner, &mut pending);
            }
        }
        self.submit_all(pending);
    }

    fn finish_exploration(self: &Arc<Self>, inner: &mut DirectorInner, pending: &mut Vec<Task>) {
        let count = self.settings.exploration_document_count;
        let next = if count > 0 && inner.failed_tasks == count {
            error!(
                stylesheet = %self.stylesheet,
                documents = count,
                "Every exploration document failed, abandoning stylesheet"
            );
            inner.stats.aborted = true;
            ProcessState::Done
        } else if !inner.collected.is_empty() {
            ProcessState::EvolveSchema
        } else {
            self.after_schema()
        };
        self.enter(inner, next, pending);
    }

    fn on_evolved(self: &Arc<Self>, id: TaskId, result: Result<bool, XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::EvolveSchema, result.as_ref().err()) {
                return;
            }
            let new_version = matches!(result, Ok(true));
            let next = if new_version && inner.evolution_passes < self.settings.evolution_pass_limit {
                ProcessState::ExploreSchema
            } else {
                self.after_schema()
            };
            self.enter(&mut inner, next, &mut pending);
        }
        self.submit_all(pending);
    }

    fn submit_follow_up(self: &Arc<Self>, request: DocumentRequest) {
        let task = {
            let mut inner = self.inner.lock();
            if inner.state != ProcessState::CheckXss {
                warn!(stylesheet = %self.stylesheet, state = %inner.state, "Follow-up outside XSS check dropped");
                return;
            }
            let id = self.track(&mut inner);
            inner.stats.follow_up_tasks += 1;
            debug!(stylesheet = %self.stylesheet, task = %id, open = inner.open_tasks.len(), "Follow-up scheduled");
            self.emit(ProcessEvent::FollowUpScheduled {
                stylesheet: self.stylesheet.uri(),
                open_tasks: inner.open_tasks.len(),
            });
            let done = self.completion(id, Self::on_xss_checked);
            self.factory
                .xss_check(id, &self.stylesheet, Some(request), self.follow_up_collector(), done)
        };
        self.pool.submit(task);
    }

    fn on_xss_checked(self: &Arc<Self>, id: TaskId, result: Result<(), XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::CheckXss, result.as_ref().err()) {
                return;
            }
            if inner.open_tasks.is_empty() {
                self.enter(&mut inner, ProcessState::CompileReport, &mut pending);
            }
        }
        self.submit_all(pending);
    }

    fn on_report_compiled(self: &Arc<Self>, id: TaskId, result: Result<(), XsltProbeError>) {
        let mut pending = Vec::new();
        {
            let mut inner = self.inner.lock();
            if !self.finish_task(&mut inner, id, ProcessState::CompileReport, result.as_ref().err()) {
                return;
            }
            self.enter(&mut inner, ProcessState::Done, &mut pending);
        }
        self.submit_all(pending);
    }
}
