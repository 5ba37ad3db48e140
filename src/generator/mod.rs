pub mod document;
pub mod prefix;
pub mod validation;
pub mod value;

pub use document::{DocumentGenerator, DocumentRequestBuilder, GeneratedDocument};
pub use prefix::{PrefixSelector, SequentialPrefixSelector};
pub use validation::{validate_value, ConstraintViolation};
pub use value::ValueGenerator;

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::models::StylesheetRef;
use crate::schema::XmlSchema;

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Probability of picking from an advisory discrete value set.
    pub discrete_value_selection_ratio: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            discrete_value_selection_ratio: 0.8,
        }
    }
}

/// The only way to obtain a `ValueGenerator`: one fresh instance per
/// document request.
pub struct ValueGeneratorFactory {
    prefix_selector: Arc<dyn PrefixSelector>,
    settings: GeneratorSettings,
    seed: Option<u64>,
    created: AtomicU64,
}

impl ValueGeneratorFactory {
    pub fn new(prefix_selector: Arc<dyn PrefixSelector>, settings: GeneratorSettings) -> Self {
        Self {
            prefix_selector,
            settings,
            seed: None,
            created: AtomicU64::new(0),
        }
    }

    /// Deterministic generation for reproducible runs. Each created
    /// generator still gets a distinct stream.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn create(&self, stylesheet: &StylesheetRef, schema: Arc<XmlSchema>) -> ValueGenerator {
        let n = self.created.fetch_add(1, Ordering::Relaxed);
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n)),
            None => StdRng::from_entropy(),
        };
        ValueGenerator::new(
            schema,
            stylesheet.clone(),
            Arc::clone(&self.prefix_selector),
            self.settings.clone(),
            rng,
        )
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}
