//! Card configuration: branding text, export scale, intake limits and the
//! roster key. Every field has a default so a partial JSON file is enough.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::photo::MAX_PHOTO_BYTES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConfig {
    #[serde(default = "default_school_name")]
    pub school_name: String,
    #[serde(default = "default_card_title")]
    pub card_title: String,
    #[serde(default = "default_tagline")]
    pub tagline: String,
    #[serde(default = "default_academic_year")]
    pub academic_year: String,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_contact")]
    pub contact: String,
    #[serde(default = "default_export_scale")]
    pub export_scale: u32,
    #[serde(default = "default_max_photo_bytes")]
    pub max_photo_bytes: u64,
    #[serde(default = "default_roster_key")]
    pub roster_key: String,
}

fn default_school_name() -> String { "Unity School".to_string() }
fn default_card_title() -> String { "Student ID Card".to_string() }
fn default_tagline() -> String { "Excellence in Education".to_string() }
fn default_academic_year() -> String { "2023-2024".to_string() }
fn default_address() -> String { "Unity School, 123 Education Lane, Knowledge City".to_string() }
fn default_contact() -> String { "Contact: +1 (555) 123-4567 | www.unityschool.edu".to_string() }
fn default_export_scale() -> u32 { 2 }
fn default_max_photo_bytes() -> u64 { MAX_PHOTO_BYTES }
fn default_roster_key() -> String { "savedCards".to_string() }

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            school_name: default_school_name(),
            card_title: default_card_title(),
            tagline: default_tagline(),
            academic_year: default_academic_year(),
            address: default_address(),
            contact: default_contact(),
            export_scale: default_export_scale(),
            max_photo_bytes: default_max_photo_bytes(),
            roster_key: default_roster_key(),
        }
    }
}

impl CardConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if !(1..=8).contains(&self.export_scale) {
            return Err(ConfigError::Invalid(format!(
                "exportScale must be between 1 and 8, got {}",
                self.export_scale
            )));
        }
        if self.roster_key.trim().is_empty() {
            return Err(ConfigError::Invalid("rosterKey must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_yields_defaults() {
        assert_eq!(CardConfig::from_json("{}").unwrap(), CardConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = CardConfig::from_json(r#"{"schoolName":"Hill School","exportScale":3}"#).unwrap();
        assert_eq!(config.school_name, "Hill School");
        assert_eq!(config.export_scale, 3);
        assert_eq!(config.academic_year, "2023-2024");
    }

    #[test]
    fn test_rejects_zero_scale() {
        let err = CardConfig::from_json(r#"{"exportScale":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.json");
        std::fs::write(&path, r#"{"rosterKey":"cards"}"#).unwrap();
        assert_eq!(CardConfig::load(&path).unwrap().roster_key, "cards");
    }
}
