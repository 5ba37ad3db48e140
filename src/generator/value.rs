use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use crate::errors::XsltProbeError;
use crate::models::{StylesheetRef, ValueDescriptor, ValueRule, ValueSlotKind};
use crate::schema::{DataType, ValueConstraints, XmlSchema};
use super::prefix::PrefixSelector;
use super::validation::validate_value;
use super::GeneratorSettings;
use tracing::{debug, warn};

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi", "aliquip",
    "commodo",
];

/// Markup fragments for mixed content. `{value}` receives the prefixed
/// counter value so the fragment can be traced in the output.
const RAW_TEMPLATES: &[&str] = &[
    "{value} {text}",
    "<b>{value}</b> {text}",
    "<i>{value}</i> {text}",
    "<a href=\"https://example.com/{value}\">{value} {text}</a>",
    "<p>{value} {text}</p>",
    "<div>{value} {text}</div>",
];

/// Synthesizes the values of exactly one document and records where each
/// value came from. Created per document by `ValueGeneratorFactory`.
pub struct ValueGenerator {
    schema: Arc<XmlSchema>,
    stylesheet: StylesheetRef,
    prefix_selector: Arc<dyn PrefixSelector>,
    settings: GeneratorSettings,
    rng: StdRng,
    counter: u64,
    prefix: Option<(String, usize)>,
    descriptors: Vec<ValueDescriptor>,
}

impl ValueGenerator {
    pub(crate) fn new(
        schema: Arc<XmlSchema>,
        stylesheet: StylesheetRef,
        prefix_selector: Arc<dyn PrefixSelector>,
        settings: GeneratorSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            schema,
            stylesheet,
            prefix_selector,
            settings,
            rng,
            counter: 0,
            prefix: None,
            descriptors: Vec::new(),
        }
    }

    pub fn value_prefix(&mut self) -> &str {
        &self.resolve_prefix().0
    }

    pub fn value_length(&mut self) -> usize {
        self.resolve_prefix().1
    }

    fn resolve_prefix(&mut self) -> &(String, usize) {
        let selector = &self.prefix_selector;
        let stylesheet = &self.stylesheet;
        self.prefix.get_or_insert_with(|| {
            let selected = selector.select_prefix(stylesheet);
            debug!(stylesheet = %stylesheet, prefix = %selected.0, length = selected.1, "Resolved value prefix");
            selected
        })
    }

    pub fn descriptors(&self) -> &[ValueDescriptor] {
        &self.descriptors
    }

    pub fn into_descriptors(self) -> Vec<ValueDescriptor> {
        self.descriptors
    }

    /// Produce the value for one slot. A valid requested value is used
    /// verbatim; anything else is synthesized from the slot's constraints.
    pub fn generate_value(&mut self, rule: &ValueRule) -> Result<String, XsltProbeError> {
        let schema = Arc::clone(&self.schema);
        let object = schema.object(&rule.schema_object).ok_or_else(|| {
            XsltProbeError::Generation(format!(
                "Rule {} targets unknown schema object {}",
                rule.id, rule.schema_object
            ))
        })?;
        let constraints = &object.constraints;

        let (value, requested) = match self.accept_requested(rule, constraints) {
            Some(value) => (value, true),
            None => {
                let value = match rule.kind {
                    ValueSlotKind::AddRawContent => self.synthesize_raw_content(constraints),
                    ValueSlotKind::SetAttribute | ValueSlotKind::AddElementText => {
                        self.synthesize(constraints)
                    }
                };
                (value, false)
            }
        };

        self.descriptors.push(ValueDescriptor {
            schema_object: rule.schema_object.clone(),
            generation_rule: rule.id,
            value: value.clone(),
            requested,
        });
        Ok(value)
    }

    fn accept_requested(&self, rule: &ValueRule, constraints: &ValueConstraints) -> Option<String> {
        let requested = rule.requested.as_ref()?;
        match validate_value(constraints, &requested.value) {
            Ok(()) => Some(requested.value.clone()),
            Err(violation) => {
                warn!(
                    rule = %rule.id,
                    object = %rule.schema_object,
                    violation = %violation,
                    "Requested value rejected, synthesizing instead"
                );
                None
            }
        }
    }

    fn synthesize(&mut self, constraints: &ValueConstraints) -> String {
        match constraints.data_type {
            DataType::Boolean => {
                let flag = if self.rng.gen_bool(0.5) { "true" } else { "false" };
                flag.to_string()
            }
            DataType::Integer => match self.pick_discrete(constraints) {
                Some(v) => v,
                None => self.random_integer(constraints),
            },
            DataType::String => match self.pick_discrete(constraints) {
                Some(v) => v,
                None => self.random_string(constraints),
            },
        }
    }

    fn pick_discrete(&mut self, constraints: &ValueConstraints) -> Option<String> {
        let set = constraints
            .discrete_values
            .as_ref()
            .filter(|d| !d.values.is_empty())?;
        let ratio = if set.fixed {
            1.0
        } else {
            self.settings.discrete_value_selection_ratio.clamp(0.0, 1.0)
        };
        if !self.rng.gen_bool(ratio) {
            return None;
        }
        set.values.choose(&mut self.rng).cloned()
    }

    fn random_integer(&mut self, constraints: &ValueConstraints) -> String {
        let min = constraints.min_value.unwrap_or(i64::MIN);
        let max = constraints.max_value.unwrap_or(i64::MAX);
        if min > max {
            warn!(min, max, "Empty integer range, using minimum");
            return min.to_string();
        }
        self.rng.gen_range(min..=max).to_string()
    }

    fn random_string(&mut self, constraints: &ValueConstraints) -> String {
        let token = self.next_token();
        let text = self.random_words();
        truncate_chars(format!("{} {}", token, text), constraints.max_length)
    }

    fn synthesize_raw_content(&mut self, constraints: &ValueConstraints) -> String {
        let template = RAW_TEMPLATES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(RAW_TEMPLATES[0]);
        let token = self.next_token();
        let text = self.random_words();
        let markup = template.replace("{value}", &token).replace("{text}", &text);
        match constraints.max_length {
            // Cutting markup would leave it unbalanced; fall back to plain text.
            Some(max) if markup.chars().count() > max => {
                truncate_chars(format!("{} {}", token, text), Some(max))
            }
            _ => markup,
        }
    }

    /// Next `<prefix><zero-padded counter>` token. Strictly increasing.
    fn next_token(&mut self) -> String {
        self.counter += 1;
        let counter = self.counter;
        let (prefix, width) = self.resolve_prefix();
        format!("{}{:0width$}", prefix, counter, width = *width)
    }

    fn random_words(&mut self) -> String {
        let count = self.rng.gen_range(1..=4);
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(WORDS.choose(&mut self.rng).copied().unwrap_or("lorem"));
        }
        words.join(" ")
    }
}

fn truncate_chars(value: String, max_length: Option<usize>) -> String {
    match max_length {
        Some(max) if value.chars().count() > max => value.chars().take(max).collect(),
        _ => value,
    }
}
