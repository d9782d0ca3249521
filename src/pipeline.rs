//! Card Pipeline - Single Entry Point
//!
//! Intake always goes through validation before a record is previewed or
//! saved. There is no path that puts an unvalidated record in the roster.

use thiserror::Error;

use crate::config::CardConfig;
use crate::export::{ExportError, ExportedCard, Exporter};
use crate::record::{RawStudentInput, StudentRecord};
use crate::render::{render, summarize, RosterSummary, VisualComposition};
use crate::store::{ByteStore, RosterEntry, RosterError, RosterStore};
use crate::templates::TemplateVariant;
use crate::validation::{ValidationErrors, Validator};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationErrors),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Owns the roster and the current preview state.
pub struct CardPipeline<S: ByteStore> {
    config: CardConfig,
    validator: Validator,
    exporter: Exporter,
    roster: RosterStore<S>,
    current: Option<StudentRecord>,
    template: TemplateVariant,
}

impl<S: ByteStore> CardPipeline<S> {
    pub fn new(store: S, config: CardConfig) -> Self {
        let roster = RosterStore::open(store, config.roster_key.clone());
        Self {
            exporter: Exporter::new(config.export_scale),
            validator: Validator::new(),
            roster,
            current: None,
            template: TemplateVariant::default(),
            config,
        }
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    /// Validate `input` without touching any state.
    pub fn validate(&self, input: &RawStudentInput) -> Result<StudentRecord, ValidationErrors> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        self.validator.validate(input)
    }

    /// Validate, make the record the current preview, and save it.
    pub fn submit(&mut self, input: &RawStudentInput) -> Result<RosterEntry, PipelineError> {
        // Mandatory: nothing reaches the roster without passing validation.
        let record = self.validate(input)?;
        let entry = self.roster.append(record)?;
        self.current = Some(entry.record.clone());
        Ok(entry)
    }

    pub fn template(&self) -> TemplateVariant {
        self.template
    }

    pub fn set_template(&mut self, template: TemplateVariant) {
        self.template = template;
    }

    pub fn current(&self) -> Option<&StudentRecord> {
        self.current.as_ref()
    }

    /// Compose the current record under the current template.
    pub fn preview(&self) -> Option<VisualComposition> {
        self.current
            .as_ref()
            .map(|record| render(record, self.template, &self.config))
    }

    /// Export what `preview` shows right now.
    pub fn download(&self) -> Result<ExportedCard, ExportError> {
        let visual = self.preview();
        self.exporter.export(visual.as_ref())
    }

    pub fn saved(&self) -> Vec<RosterEntry> {
        self.roster.list()
    }

    pub fn saved_cards(&self) -> Vec<RosterSummary> {
        self.roster.list().iter().map(summarize).collect()
    }

    /// Bring a saved record back as the current preview.
    pub fn select_saved(&mut self, position: usize) -> Result<&StudentRecord, PipelineError> {
        let record = self.roster.select_at(position)?;
        Ok(&*self.current.insert(record))
    }

    /// Remove a saved record. The current preview is left as it is.
    pub fn delete_saved(&mut self, position: usize) -> Result<StudentRecord, PipelineError> {
        Ok(self.roster.delete_at(position)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryByteStore;

    fn input(name: &str) -> RawStudentInput {
        RawStudentInput {
            name: name.into(),
            roll_number: "42".into(),
            class_and_division: "3-A".into(),
            allergies: vec![],
            rack_number: "R-7".into(),
            bus_route_number: "Route 2: South Campus".into(),
            photo: "not-decodable".into(),
        }
    }

    #[test]
    fn test_invalid_submit_changes_nothing() {
        let mut pipeline = CardPipeline::new(MemoryByteStore::new(), CardConfig::default());
        let err = pipeline.submit(&RawStudentInput::default()).unwrap_err();
        assert!(err.to_string().contains("Validation failed"));
        assert!(pipeline.saved().is_empty());
        assert!(pipeline.preview().is_none());
    }

    #[test]
    fn test_submit_previews_and_saves() {
        let mut pipeline = CardPipeline::new(MemoryByteStore::new(), CardConfig::default());
        let entry = pipeline.submit(&input("Ada Lovelace")).unwrap();
        assert_eq!(entry.position, 0);
        assert_eq!(pipeline.current().map(|r| r.name()), Some("Ada Lovelace"));
        assert_eq!(pipeline.preview().unwrap().student_name, "Ada Lovelace");
        assert_eq!(pipeline.saved_cards()[0].bus_route, "Route 2");
    }

    #[test]
    fn test_template_switch_rerenders() {
        let mut pipeline = CardPipeline::new(MemoryByteStore::new(), CardConfig::default());
        pipeline.submit(&input("Ada Lovelace")).unwrap();
        pipeline.set_template(TemplateVariant::Green);
        let comp = pipeline.preview().unwrap();
        assert_eq!(comp.template, TemplateVariant::Green);
        assert_eq!(comp.field_value("Bus Route"), Some("Route 2: South Campus"));
    }

    #[test]
    fn test_download_before_any_record_fails() {
        let pipeline = CardPipeline::new(MemoryByteStore::new(), CardConfig::default());
        assert!(matches!(pipeline.download(), Err(ExportError::NotComposed)));
    }

    #[test]
    fn test_select_saved_replaces_current() {
        let mut pipeline = CardPipeline::new(MemoryByteStore::new(), CardConfig::default());
        pipeline.submit(&input("First Student")).unwrap();
        pipeline.submit(&input("Second Student")).unwrap();
        assert_eq!(pipeline.select_saved(0).unwrap().name(), "First Student");
        assert!(matches!(
            pipeline.select_saved(9),
            Err(PipelineError::Roster(RosterError::NotFound { position: 9, len: 2 }))
        ));
    }
}
