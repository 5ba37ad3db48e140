use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use crate::errors::XsltProbeError;
use crate::models::{DocumentModifier, DocumentRequest, ElementRule, GenerationRuleId, SchemaObjectId, StylesheetRef};
use crate::pool::{Completion, Task, TaskId, TaskKind, WorkerPool};
use crate::tasks::{FollowUpCollector, TaskFactory};

/// Queues tasks until the test drives them.
#[derive(Default)]
pub(crate) struct MockPool {
    queue: Mutex<VecDeque<Task>>,
}

impl MockPool {
    pub(crate) fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn queued_kinds(&self) -> Vec<TaskKind> {
        self.queue.lock().iter().map(|t| t.kind).collect()
    }

    pub(crate) fn take(&self) -> Option<Task> {
        self.queue.lock().pop_front()
    }

    pub(crate) async fn run_next(&self) -> bool {
        let task = self.take();
        match task {
            Some(task) => {
                task.run().await;
                true
            }
            None => false,
        }
    }

    pub(crate) async fn drain(&self) {
        while self.run_next().await {}
    }
}

#[async_trait]
impl WorkerPool for MockPool {
    fn submit(&self, task: Task) {
        self.queue.lock().push_back(task);
    }

    async fn await_completion(&self) {
        self.drain().await;
    }

    fn shutdown(&self) {}
}

/// Task factory whose tasks return scripted results.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    pub(crate) init_fails: bool,
    pub(crate) static_result: Mutex<Option<Result<Vec<DocumentModifier>, ()>>>,
    pub(crate) exploration: Mutex<VecDeque<Result<Vec<DocumentModifier>, ()>>>,
    pub(crate) evolution: Mutex<VecDeque<Result<bool, ()>>>,
    /// Follow-ups emitted by successive XSS check tasks, in creation order.
    pub(crate) follow_ups: Mutex<VecDeque<usize>>,
    pub(crate) created: Mutex<Vec<TaskKind>>,
}

pub(crate) fn modifier(value: &str) -> DocumentModifier {
    DocumentModifier::new(SchemaObjectId::new("doc"), GenerationRuleId(2), value)
}

pub(crate) fn sample_request(stylesheet: &StylesheetRef) -> DocumentRequest {
    DocumentRequest {
        stylesheet: stylesheet.clone(),
        schema_version: 1,
        root: ElementRule {
            id: GenerationRuleId(1),
            schema_object: SchemaObjectId::new("doc"),
            children: Vec::new(),
        },
        modifier: None,
    }
}

fn failure(kind: TaskKind) -> XsltProbeError {
    XsltProbeError::Transform(format!("scripted {} failure", kind))
}

impl ScriptedFactory {
    pub(crate) fn count(&self, kind: TaskKind) -> usize {
        self.created.lock().iter().filter(|k| **k == kind).count()
    }

    fn task<T: Send + 'static>(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        kind: TaskKind,
        result: Result<T, ()>,
        on_complete: Completion<T>,
    ) -> Task {
        self.created.lock().push(kind);
        let result = result.map_err(|_| failure(kind));
        Task::new(id, stylesheet.clone(), kind, async move { result }, on_complete)
    }
}

impl TaskFactory for ScriptedFactory {
    fn initialization(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<()>) -> Task {
        let result = if self.init_fails { Err(()) } else { Ok(()) };
        self.task(id, stylesheet, TaskKind::Initialization, result, on_complete)
    }

    fn static_analysis(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<Vec<DocumentModifier>>) -> Task {
        let result = self.static_result.lock().take().unwrap_or(Ok(Vec::new()));
        self.task(id, stylesheet, TaskKind::StaticAnalysis, result, on_complete)
    }

    fn schema_exploration(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<Vec<DocumentModifier>>) -> Task {
        let result = self.exploration.lock().pop_front().unwrap_or(Ok(Vec::new()));
        self.task(id, stylesheet, TaskKind::SchemaExploration, result, on_complete)
    }

    fn schema_evolution(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        _modifiers: Vec<DocumentModifier>,
        on_complete: Completion<bool>,
    ) -> Task {
        let result = self.evolution.lock().pop_front().unwrap_or(Ok(false));
        self.task(id, stylesheet, TaskKind::SchemaEvolution, result, on_complete)
    }

    fn xss_check(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        request: Option<DocumentRequest>,
        follow_ups: FollowUpCollector,
        on_complete: Completion<()>,
    ) -> Task {
        let kind = if request.is_some() { TaskKind::XssFollowUp } else { TaskKind::XssCheck };
        self.created.lock().push(kind);
        let emit = self.follow_ups.lock().pop_front().unwrap_or(0);
        let follow_up = sample_request(stylesheet);
        Task::new(
            id,
            stylesheet.clone(),
            kind,
            async move {
                for _ in 0..emit {
                    follow_ups(follow_up.clone());
                }
                Ok(())
            },
            on_complete,
        )
    }

    fn report_compilation(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<()>) -> Task {
        self.task(id, stylesheet, TaskKind::ReportCompilation, Ok(()), on_complete)
    }
}
