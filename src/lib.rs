//! Student ID Card Generator - Core Engine
//!
//! Validates student records, derives the photo-free QR payload, composes
//! the record into a card template, exports PNGs, and keeps a persisted
//! roster of generated cards.

pub mod config;
pub mod export;
pub mod hashing;
pub mod payload;
pub mod photo;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod store;
pub mod templates;
pub mod validation;

pub use config::{CardConfig, ConfigError};
pub use export::{export_filename, ExportError, ExportedCard, Exporter};
pub use hashing::{canonical_json, sha256_hex};
pub use payload::{derive_payload, payload_fingerprint, QrPayload};
pub use photo::{PhotoIntake, PhotoIntakeError};
pub use pipeline::{CardPipeline, PipelineError};
pub use record::{allergy_label, route_label, Allergy, RawStudentInput, StudentRecord};
pub use render::{render, summarize, RosterSummary, SectionKind, VisualComposition};
pub use store::{ByteStore, FileByteStore, MemoryByteStore, RosterEntry, RosterError, RosterStore};
pub use templates::TemplateVariant;
pub use validation::{FieldViolation, ValidationErrors, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
