pub mod factory;
pub mod session;
pub mod static_check;

pub use factory::PipelineTaskFactory;
pub use session::StylesheetSession;

use std::sync::Arc;
use crate::models::{DocumentModifier, DocumentRequest, StylesheetRef};
use crate::pool::{Completion, Task, TaskId};

/// Hands a follow-up document request back to the Director that owns the
/// running task.
pub type FollowUpCollector = Arc<dyn Fn(DocumentRequest) + Send + Sync>;

/// Builds the tasks a Director submits. Ids are chosen by the Director so it
/// can track a task before it runs.
pub trait TaskFactory: Send + Sync {
    fn initialization(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<()>) -> Task;

    fn static_analysis(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        on_complete: Completion<Vec<DocumentModifier>>,
    ) -> Task;

    fn schema_exploration(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        on_complete: Completion<Vec<DocumentModifier>>,
    ) -> Task;

    /// Completes with `true` when a new schema version was stored.
    fn schema_evolution(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        modifiers: Vec<DocumentModifier>,
        on_complete: Completion<bool>,
    ) -> Task;

    /// `request` is `None` for initial checks, which build a fresh request
    /// from the latest schema.
    fn xss_check(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        request: Option<DocumentRequest>,
        follow_ups: FollowUpCollector,
        on_complete: Completion<()>,
    ) -> Task;

    fn report_compilation(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<()>) -> Task;
}
