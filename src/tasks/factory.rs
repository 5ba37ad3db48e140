use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use crate::analysis::{DocumentAnalyzer, HtmlDocumentContainer, XmlDocumentContainer};
use crate::errors::XsltProbeError;
use crate::generator::{DocumentGenerator, DocumentRequestBuilder};
use crate::models::{DocumentModifier, DocumentRequest, StylesheetRef};
use crate::pool::{Completion, Task, TaskId, TaskKind};
use crate::reporting::ReportWriter;
use crate::schema::{ConstraintRelaxingEvolver, SchemaEvolver, SchemaProvider};
use crate::xslt::XsltExecutor;
use super::session::StylesheetSession;
use super::static_check::scan_stylesheet;
use super::{FollowUpCollector, TaskFactory};
use tracing::{debug, info, warn};

/// Default number of elements nested below the root of generated documents.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Slots that reach the output are widened to at least this many characters
/// so injection payloads fit.
pub const DEFAULT_PROBE_LENGTH: usize = 64;

/// Task factory wiring generation, transformation and analysis together.
pub struct PipelineTaskFactory {
    schemas: Arc<dyn SchemaProvider>,
    evolver: Arc<dyn SchemaEvolver>,
    executor: Arc<dyn XsltExecutor>,
    analyzer: Arc<DocumentAnalyzer>,
    generator: Arc<DocumentGenerator>,
    builder: Arc<DocumentRequestBuilder>,
    writer: Option<Arc<ReportWriter>>,
    probe_length: usize,
    sessions: DashMap<StylesheetRef, Arc<StylesheetSession>>,
}

impl PipelineTaskFactory {
    pub fn new(
        schemas: Arc<dyn SchemaProvider>,
        executor: Arc<dyn XsltExecutor>,
        analyzer: Arc<DocumentAnalyzer>,
        generator: DocumentGenerator,
    ) -> Self {
        Self {
            schemas,
            evolver: Arc::new(ConstraintRelaxingEvolver),
            executor,
            analyzer,
            generator: Arc::new(generator),
            builder: Arc::new(DocumentRequestBuilder::new(DEFAULT_MAX_DEPTH)),
            writer: None,
            probe_length: DEFAULT_PROBE_LENGTH,
            sessions: DashMap::new(),
        }
    }

    pub fn with_evolver(mut self, evolver: Arc<dyn SchemaEvolver>) -> Self {
        self.evolver = evolver;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.builder = Arc::new(DocumentRequestBuilder::new(max_depth));
        self
    }

    pub fn with_probe_length(mut self, probe_length: usize) -> Self {
        self.probe_length = probe_length;
        self
    }

    /// Write reports below this writer's output directory. Without one,
    /// reports are only kept in the session.
    pub fn with_report_writer(mut self, writer: ReportWriter) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    pub fn session(&self, stylesheet: &StylesheetRef) -> Option<Arc<StylesheetSession>> {
        self.sessions.get(stylesheet).map(|s| Arc::clone(s.value()))
    }

    fn require_session(&self, stylesheet: &StylesheetRef) -> Result<Arc<StylesheetSession>, XsltProbeError> {
        self.session(stylesheet)
            .ok_or_else(|| XsltProbeError::Internal(format!("No session for {}", stylesheet)))
    }
}

/// Wrap `work` so a missing session fails the task instead of the factory.
fn with_session<T, F, Fut>(
    session: Result<Arc<StylesheetSession>, XsltProbeError>,
    work: F,
) -> impl std::future::Future<Output = Result<T, XsltProbeError>> + Send + 'static
where
    T: Send + 'static,
    F: FnOnce(Arc<StylesheetSession>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<T, XsltProbeError>> + Send + 'static,
{
    async move { work(session?).await }
}

impl TaskFactory for PipelineTaskFactory {
    fn initialization(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<()>) -> Task {
        self.sessions
            .entry(stylesheet.clone())
            .or_insert_with(|| Arc::new(StylesheetSession::new(stylesheet.clone())));
        let schemas = Arc::clone(&self.schemas);
        let target = stylesheet.clone();

        let work = async move {
            let metadata = tokio::fs::metadata(target.path()).await.map_err(|e| {
                XsltProbeError::Config(format!("Cannot read stylesheet {}: {}", target, e))
            })?;
            if !metadata.is_file() {
                return Err(XsltProbeError::Config(format!("{} is not a file", target)));
            }
            let schema = schemas.load(&target).await?;
            info!(stylesheet = %target, version = schema.version(), objects = schema.len(), "Schema loaded");
            Ok(())
        };
        Task::new(id, stylesheet.clone(), TaskKind::Initialization, work, on_complete)
    }

    fn static_analysis(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        on_complete: Completion<Vec<DocumentModifier>>,
    ) -> Task {
        let schemas = Arc::clone(&self.schemas);
        let target = stylesheet.clone();

        let work = async move {
            let source = tokio::fs::read_to_string(target.path()).await?;
            let schema = schemas.schema(&target, None)?;
            let scan = scan_stylesheet(&source, &schema)?;
            if scan.unescaped_outputs > 0 {
                warn!(
                    stylesheet = %target,
                    count = scan.unescaped_outputs,
                    "Stylesheet disables output escaping"
                );
            }
            debug!(stylesheet = %target, literals = scan.modifiers.len(), "Static analysis done");
            Ok::<_, XsltProbeError>(scan.modifiers)
        };
        Task::new(id, stylesheet.clone(), TaskKind::StaticAnalysis, work, on_complete)
    }

    fn schema_exploration(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        on_complete: Completion<Vec<DocumentModifier>>,
    ) -> Task {
        let schemas = Arc::clone(&self.schemas);
        let generator = Arc::clone(&self.generator);
        let builder = Arc::clone(&self.builder);
        let executor = Arc::clone(&self.executor);
        let probe_length = self.probe_length;
        let target = stylesheet.clone();

        let work = with_session(self.require_session(stylesheet), move |session| async move {
            let schema = schemas.schema(&target, None)?;
            let request = builder.build(&target, &schema);
            let document = generator.generate(Arc::clone(&schema), request)?;
            let xml = XmlDocumentContainer::new(document, schema)?;

            let html = match executor.transform(&target, &xml.document().xml).await {
                Ok(html) => html,
                Err(e) => {
                    session.document_failed();
                    return Err(e);
                }
            };

            let mut modifiers = Vec::new();
            for (token, descriptor) in xml.descriptors_in(&html) {
                let Some(object) = xml.schema_object(descriptor) else { continue };
                let constraints = &object.constraints;
                if !constraints.accepts_free_text() {
                    continue;
                }
                if constraints.max_length.is_some_and(|max| max < probe_length) {
                    let padding = probe_length.saturating_sub(token.chars().count());
                    let value = format!("{}{}", token, "x".repeat(padding));
                    modifiers.push(
                        DocumentModifier::new(descriptor.schema_object.clone(), descriptor.generation_rule, value)
                            .with_original_value(descriptor.value.clone()),
                    );
                }
            }
            debug!(stylesheet = %target, widened = modifiers.len(), "Exploration document transformed");
            Ok(modifiers)
        });
        Task::new(id, stylesheet.clone(), TaskKind::SchemaExploration, work, on_complete)
    }

    fn schema_evolution(
        &self,
        id: TaskId,
        stylesheet: &StylesheetRef,
        modifiers: Vec<DocumentModifier>,
        on_complete: Completion<bool>,
    ) -> Task {
        let schemas = Arc::clone(&self.schemas);
        let evolver = Arc::clone(&self.evolver);
        let target = stylesheet.clone();

        let work = async move {
            let schema = schemas.schema(&target, None)?;
            match evolver.evolve(&schema, &modifiers) {
                Some(evolved) => {
                    let version = schemas.store(&target, evolved)?;
                    info!(stylesheet = %target, version, "Schema evolved");
                    Ok::<_, XsltProbeError>(true)
                }
                None => Ok(false),
            }
        };
        Task::new(id, stylesheet.clone(), TaskKind::SchemaEvolution, work, on_complete)
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
        let schemas = Arc::clone(&self.schemas);
        let generator = Arc::clone(&self.generator);
        let builder = Arc::clone(&self.builder);
        let executor = Arc::clone(&self.executor);
        let analyzer = Arc::clone(&self.analyzer);
        let target = stylesheet.clone();

        let work = with_session(self.require_session(stylesheet), move |session| async move {
            let (schema, request) = match request {
                Some(request) => (schemas.schema(&target, Some(request.schema_version))?, request),
                None => {
                    let schema = schemas.schema(&target, None)?;
                    let request = builder.build(&target, &schema);
                    (schema, request)
                }
            };

            let document = generator.generate(Arc::clone(&schema), request)?;
            if document.modifier().is_some() && !document.modifier_applied() {
                debug!(task = %id, "Requested value rejected by the schema, skipping");
                return Ok(());
            }
            let xml = Arc::new(XmlDocumentContainer::new(document, schema)?);

            let html = match executor.transform(&target, &xml.document().xml).await {
                Ok(output) => HtmlDocumentContainer::new(output, Arc::clone(&xml)),
                Err(e) => {
                    session.document_failed();
                    return Err(e);
                }
            };

            let mut seen = HashSet::new();
            let mut proposals = Vec::new();
            let mut candidates = Vec::new();
            analyzer.analyze_document(
                id,
                &html,
                &mut |modifier: DocumentModifier| {
                    if seen.insert(modifier.normalize()) {
                        proposals.push(modifier);
                    }
                },
                &mut |candidate| candidates.push(candidate),
            )?;
            session.document_analyzed();

            for modifier in proposals {
                if !session.claim(&modifier) {
                    continue;
                }
                match xml.document().request.with_modifier(modifier) {
                    Some(next) => follow_ups(next),
                    None => warn!(task = %id, "Proposed modifier names no slot of its document"),
                }
            }
            if !candidates.is_empty() {
                info!(stylesheet = %target, count = candidates.len(), "Injection confirmed");
            }
            session.record_candidates(candidates);
            Ok(())
        });
        Task::new(id, stylesheet.clone(), kind, work, on_complete)
    }

    fn report_compilation(&self, id: TaskId, stylesheet: &StylesheetRef, on_complete: Completion<()>) -> Task {
        let schemas = Arc::clone(&self.schemas);
        let analyzer = Arc::clone(&self.analyzer);
        let writer = self.writer.clone();
        let target = stylesheet.clone();

        let work = with_session(self.require_session(stylesheet), move |session| async move {
            let schema = schemas.schema(&target, None).ok();
            let statistics = session.statistics(schema.as_ref().map(|s| s.version()).unwrap_or(0));
            let report = analyzer.consolidate_results(
                &target,
                schema.as_deref(),
                &session.candidates(),
                statistics,
            );
            if let Some(writer) = writer {
                let paths = writer.write(&target, &report).await?;
                info!(stylesheet = %target, files = paths.len(), "Report written");
            }
            session.set_report(report);
            Ok::<_, XsltProbeError>(())
        });
        Task::new(id, stylesheet.clone(), TaskKind::ReportCompilation, work, on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RuleRegistry;
    use crate::generator::{GeneratorSettings, SequentialPrefixSelector, ValueGeneratorFactory};
    use crate::models::SchemaObjectId;
    use crate::schema::{ContentType, SchemaObject, SchemaRepository, ValueConstraints, XmlSchema};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    /// Echoes the `title` text and the `link@href` value into HTML without
    /// escaping, like a careless stylesheet would.
    struct EchoExecutor;

    #[async_trait]
    impl XsltExecutor for EchoExecutor {
        async fn transform(&self, _stylesheet: &StylesheetRef, xml: &str) -> Result<String, XsltProbeError> {
            let title = between(xml, "<title>", "</title>").unwrap_or_default();
            Ok(format!("<html><body><h1>{}</h1></body></html>", decode(&title)))
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl XsltExecutor for FailingExecutor {
        async fn transform(&self, stylesheet: &StylesheetRef, _xml: &str) -> Result<String, XsltProbeError> {
            Err(XsltProbeError::Transform(format!("{} failed", stylesheet)))
        }
    }

    fn between(text: &str, start: &str, end: &str) -> Option<String> {
        let from = text.find(start)? + start.len();
        let to = text[from..].find(end)? + from;
        Some(text[from..to].to_string())
    }

    fn decode(text: &str) -> String {
        text.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"").replace("&amp;", "&")
    }

    fn schema() -> XmlSchema {
        XmlSchema::new(
            SchemaObjectId::new("page"),
            vec![
                SchemaObject::element("page", "page", ContentType::ElementOnly).with_children(&["title"]),
                SchemaObject::element("title", "title", ContentType::Text)
                    .with_constraints(ValueConstraints::string().with_max_length(12)),
            ],
        )
        .unwrap()
    }

    fn factory(executor: Arc<dyn XsltExecutor>) -> (PipelineTaskFactory, StylesheetRef, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.xsl");
        std::fs::write(&path, "<xsl:stylesheet xmlns:xsl=\"http://www.w3.org/1999/XSL/Transform\"/>").unwrap();
        let stylesheet = StylesheetRef::new(path);

        let repository = SchemaRepository::new(None);
        repository.register(&stylesheet, schema());
        let values = ValueGeneratorFactory::new(Arc::new(SequentialPrefixSelector::default()), GeneratorSettings::default())
            .with_seed(7);
        let analyzer = DocumentAnalyzer::new(RuleRegistry::all()).unwrap();
        let factory = PipelineTaskFactory::new(
            Arc::new(repository),
            executor,
            Arc::new(analyzer),
            DocumentGenerator::new(values),
        );
        (factory, stylesheet, dir)
    }

    fn completion<T: Send + 'static>() -> (Completion<T>, oneshot::Receiver<Result<T, XsltProbeError>>) {
        let (tx, rx) = oneshot::channel();
        (Box::new(move |r| { let _ = tx.send(r); }), rx)
    }

    #[tokio::test]
    async fn test_initialization_creates_session() {
        let (factory, stylesheet, _dir) = factory(Arc::new(EchoExecutor));
        let (done, rx) = completion();
        factory.initialization(TaskId::new_v4(), &stylesheet, done).run().await;
        assert!(rx.await.unwrap().is_ok());
        assert!(factory.session(&stylesheet).is_some());
    }

    #[tokio::test]
    async fn test_initialization_fails_for_missing_stylesheet() {
        let (factory, _stylesheet, dir) = factory(Arc::new(EchoExecutor));
        let missing = StylesheetRef::new(dir.path().join("missing.xsl"));
        let (done, rx) = completion();
        factory.initialization(TaskId::new_v4(), &missing, done).run().await;
        assert!(matches!(rx.await.unwrap(), Err(XsltProbeError::Config(_))));
    }

    #[tokio::test]
    async fn test_exploration_widens_short_reflected_slot() {
        let (factory, stylesheet, _dir) = factory(Arc::new(EchoExecutor));
        let (done, _rx) = completion();
        factory.initialization(TaskId::new_v4(), &stylesheet, done).run().await;

        let (done, rx) = completion();
        factory.schema_exploration(TaskId::new_v4(), &stylesheet, done).run().await;
        let modifiers = rx.await.unwrap().unwrap();
        assert_eq!(modifiers.len(), 1);
        assert_eq!(modifiers[0].schema_object.as_str(), "title");
        assert_eq!(modifiers[0].value.chars().count(), DEFAULT_PROBE_LENGTH);
    }

    #[tokio::test]
    async fn test_xss_check_schedules_follow_up_and_records_failure() {
        let (factory, stylesheet, _dir) = factory(Arc::new(EchoExecutor));
        let (done, _rx) = completion();
        factory.initialization(TaskId::new_v4(), &stylesheet, done).run().await;

        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let follow_ups: FollowUpCollector = Arc::new(move |r| sink.lock().push(r));

        // The title only holds 12 characters, so widen it first.
        let (done, rx) = completion();
        factory.schema_exploration(TaskId::new_v4(), &stylesheet, done).run().await;
        let widening = rx.await.unwrap().unwrap();
        let (done, rx) = completion();
        factory.schema_evolution(TaskId::new_v4(), &stylesheet, widening, done).run().await;
        assert!(rx.await.unwrap().unwrap());

        let (done, rx) = completion();
        factory.xss_check(TaskId::new_v4(), &stylesheet, None, follow_ups.clone(), done).run().await;
        rx.await.unwrap().unwrap();
        let requests = collected.lock().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].modifier.as_ref().and_then(|m| m.rule_id.as_deref()),
            Some("xss.element-injection")
        );

        let (done, rx) = completion();
        factory
            .xss_check(TaskId::new_v4(), &stylesheet, Some(requests[0].clone()), follow_ups, done)
            .run()
            .await;
        rx.await.unwrap().unwrap();
        let session = factory.session(&stylesheet).unwrap();
        assert_eq!(session.candidates().len(), 1);
        assert_eq!(collected.lock().len(), 1);

        let (done, rx) = completion();
        factory.report_compilation(TaskId::new_v4(), &stylesheet, done).run().await;
        rx.await.unwrap().unwrap();
        let report = session.report().unwrap();
        assert_eq!(report.finding_count(), 1);
        assert_eq!(report.statistics.schema_version, 2);
        assert_eq!(report.statistics.documents_analyzed, 2);
    }

    #[tokio::test]
    async fn test_transform_failure_counts_against_session() {
        let (factory, stylesheet, _dir) = factory(Arc::new(FailingExecutor));
        let (done, _rx) = completion();
        factory.initialization(TaskId::new_v4(), &stylesheet, done).run().await;

        let (done, rx) = completion();
        let follow_ups: FollowUpCollector = Arc::new(|_| {});
        factory.xss_check(TaskId::new_v4(), &stylesheet, None, follow_ups, done).run().await;
        assert!(matches!(rx.await.unwrap(), Err(XsltProbeError::Transform(_))));
        assert_eq!(factory.session(&stylesheet).unwrap().statistics(1).documents_failed, 1);
    }

    #[tokio::test]
    async fn test_task_without_session_fails() {
        let (factory, stylesheet, _dir) = factory(Arc::new(EchoExecutor));
        let (done, rx) = completion();
        factory.report_compilation(TaskId::new_v4(), &stylesheet, done).run().await;
        assert!(matches!(rx.await.unwrap(), Err(XsltProbeError::Internal(_))));
    }
}
