use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use crate::errors::XsltProbeError;
use crate::models::StylesheetRef;
use crate::pool::WorkerPool;
use crate::tasks::TaskFactory;
use super::director::ProcessDirector;
use super::events::ProcessEvent;
use super::state::{DirectorSettings, ProcessState, ProcessingMode};
use tracing::info;

/// Owns one Director per stylesheet file.
pub struct ProcessDirectorManager {
    pool: Arc<dyn WorkerPool>,
    factory: Arc<dyn TaskFactory>,
    settings: DirectorSettings,
    directors: DashMap<StylesheetRef, Arc<ProcessDirector>>,
    event_tx: Option<mpsc::UnboundedSender<ProcessEvent>>,
}

impl ProcessDirectorManager {
    pub fn new(pool: Arc<dyn WorkerPool>, factory: Arc<dyn TaskFactory>, settings: DirectorSettings) -> Self {
        Self {
            pool,
            factory,
            settings,
            directors: DashMap::new(),
            event_tx: None,
        }
    }

    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Create and initialize the Director for `file`. A file can be
    /// submitted once per manager.
    pub fn start_process(
        &self,
        file: StylesheetRef,
        mode: ProcessingMode,
    ) -> Result<Arc<ProcessDirector>, XsltProbeError> {
        let director = match self.directors.entry(file.clone()) {
            Entry::Occupied(_) => return Err(XsltProbeError::AlreadySubmitted(file.uri())),
            Entry::Vacant(slot) => {
                let mut director = ProcessDirector::new(
                    file.clone(),
                    mode,
                    self.settings.clone(),
                    Arc::clone(&self.pool),
                    Arc::clone(&self.factory),
                );
                if let Some(ref tx) = self.event_tx {
                    director = director.with_event_channel(tx.clone());
                }
                let director = Arc::new(director);
                slot.insert(Arc::clone(&director));
                director
            }
        };
        info!(stylesheet = %file, mode = %mode, "Stylesheet submitted");
        director.initialize();
        Ok(director)
    }

    /// True when every submitted stylesheet is DONE.
    pub fn is_completed(&self) -> bool {
        self.directors.iter().all(|d| d.is_done())
    }

    /// Resolves once every Director submitted so far is DONE.
    pub async fn await_completion(&self) {
        let directors: Vec<Arc<ProcessDirector>> =
            self.directors.iter().map(|d| Arc::clone(d.value())).collect();
        for director in directors {
            director.wait_until_done().await;
        }
    }

    pub fn process_state(&self, file: &StylesheetRef) -> Option<ProcessState> {
        self.directors.get(file).map(|d| d.process_state())
    }

    pub fn director(&self, file: &StylesheetRef) -> Option<Arc<ProcessDirector>> {
        self.directors.get(file).map(|d| Arc::clone(d.value()))
    }

    pub fn directors(&self) -> Vec<Arc<ProcessDirector>> {
        self.directors.iter().map(|d| Arc::clone(d.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.directors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{MockPool, ScriptedFactory};

    fn manager() -> (Arc<MockPool>, ProcessDirectorManager) {
        let pool = Arc::new(MockPool::default());
        let manager = ProcessDirectorManager::new(
            pool.clone(),
            Arc::new(ScriptedFactory::default()),
            DirectorSettings::default(),
        );
        (pool, manager)
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let (_pool, manager) = manager();
        let file = StylesheetRef::new("a.xsl");
        manager.start_process(file.clone(), ProcessingMode::Full).unwrap();
        let err = manager.start_process(file, ProcessingMode::XssOnly).err().unwrap();
        assert!(matches!(err, XsltProbeError::AlreadySubmitted(_)));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_start_process_initializes_director() {
        let (pool, manager) = manager();
        let file = StylesheetRef::new("a.xsl");
        manager.start_process(file.clone(), ProcessingMode::Full).unwrap();
        assert_eq!(manager.process_state(&file), Some(ProcessState::Initialize));
        assert_eq!(pool.queued(), 1);
        assert_eq!(manager.process_state(&StylesheetRef::new("other.xsl")), None);
    }

    #[tokio::test]
    async fn test_completion_tracks_every_director() {
        let (pool, manager) = manager();
        assert!(manager.is_completed());
        manager.start_process(StylesheetRef::new("a.xsl"), ProcessingMode::Full).unwrap();
        manager.start_process(StylesheetRef::new("b.xsl"), ProcessingMode::XssOnly).unwrap();
        assert!(!manager.is_completed());

        pool.drain().await;
        manager.await_completion().await;
        assert!(manager.is_completed());
        for director in manager.directors() {
            assert_eq!(director.process_state(), ProcessState::Done);
        }
    }
}
