//! Validation System - Field Rules
//!
//! Every rule runs against the normalized input; violations are collected
//! across all rules and keyed by field name. Nothing is fail-fast.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{class_options, Allergy, RawStudentInput, StudentRecord, BUS_ROUTES};

pub const MIN_NAME_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// All violations found for one intake bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldViolation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }

    /// Distinct field names with at least one violation, in rule order.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = vec![];
        for v in &self.violations {
            if !fields.contains(&v.field.as_str()) {
                fields.push(&v.field);
            }
        }
        fields
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<_> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Field rule trait - produces violations for one field
pub trait FieldRule {
    fn field(&self) -> &'static str;
    fn check(&self, input: &RawStudentInput) -> Vec<FieldViolation>;
}

// --- Concrete Rules ---

/// Text field that must be present with a minimum character count.
pub struct RequiredText {
    field: &'static str,
    min_chars: usize,
    message: &'static str,
    get: fn(&RawStudentInput) -> &str,
}

impl FieldRule for RequiredText {
    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, input: &RawStudentInput) -> Vec<FieldViolation> {
        if (self.get)(input).chars().count() < self.min_chars {
            vec![FieldViolation::new(self.field, self.message)]
        } else {
            vec![]
        }
    }
}

/// Text field that must be one of a fixed set of options.
pub struct OneOf {
    field: &'static str,
    options: Vec<String>,
    required_message: &'static str,
    get: fn(&RawStudentInput) -> &str,
}

impl FieldRule for OneOf {
    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, input: &RawStudentInput) -> Vec<FieldViolation> {
        let value = (self.get)(input);
        if value.is_empty() {
            vec![FieldViolation::new(self.field, self.required_message)]
        } else if !self.options.iter().any(|o| o == value) {
            vec![FieldViolation::new(self.field, format!("Unknown {} \"{}\"", self.noun(), value))]
        } else {
            vec![]
        }
    }
}

impl OneOf {
    fn noun(&self) -> &'static str {
        match self.field {
            "classAndDivision" => "class",
            "busRouteNumber" => "bus route",
            other => other,
        }
    }
}

pub struct AllergyVocabulary;

impl FieldRule for AllergyVocabulary {
    fn field(&self) -> &'static str {
        "allergies"
    }

    fn check(&self, input: &RawStudentInput) -> Vec<FieldViolation> {
        input
            .allergies
            .iter()
            .filter(|code| Allergy::from_code(code).is_none())
            .map(|code| FieldViolation::new(self.field(), format!("Unknown allergy \"{code}\"")))
            .collect()
    }
}

/// Trim text fields and drop repeated allergy codes (first occurrence wins).
pub fn normalize(input: &RawStudentInput) -> RawStudentInput {
    let mut allergies: Vec<String> = vec![];
    for code in &input.allergies {
        let code = code.trim();
        if !allergies.iter().any(|a| a == code) {
            allergies.push(code.to_string());
        }
    }

    RawStudentInput {
        name: input.name.trim().to_string(),
        roll_number: input.roll_number.trim().to_string(),
        class_and_division: input.class_and_division.trim().to_string(),
        allergies,
        rack_number: input.rack_number.trim().to_string(),
        bus_route_number: input.bus_route_number.trim().to_string(),
        photo: input.photo.trim().to_string(),
    }
}

/// Validator runs every field rule and gathers the violations
pub struct Validator {
    rules: Vec<Box<dyn FieldRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredText {
                    field: "name",
                    min_chars: MIN_NAME_CHARS,
                    message: "Name is required",
                    get: |i| i.name.as_str(),
                }),
                Box::new(RequiredText {
                    field: "rollNumber",
                    min_chars: 1,
                    message: "Roll number is required",
                    get: |i| i.roll_number.as_str(),
                }),
                Box::new(OneOf {
                    field: "classAndDivision",
                    options: class_options(),
                    required_message: "Class & Division is required",
                    get: |i| i.class_and_division.as_str(),
                }),
                Box::new(AllergyVocabulary),
                Box::new(RequiredText {
                    field: "rackNumber",
                    min_chars: 1,
                    message: "Rack number is required",
                    get: |i| i.rack_number.as_str(),
                }),
                Box::new(OneOf {
                    field: "busRouteNumber",
                    options: BUS_ROUTES.iter().map(|r| r.to_string()).collect(),
                    required_message: "Bus route is required",
                    get: |i| i.bus_route_number.as_str(),
                }),
                // Size is enforced at intake; only presence is checked here.
                Box::new(RequiredText {
                    field: "photo",
                    min_chars: 1,
                    message: "Photo is required",
                    get: |i| i.photo.as_str(),
                }),
            ],
        }
    }

    pub fn validate(&self, input: &RawStudentInput) -> Result<StudentRecord, ValidationErrors> {
        let normalized = normalize(input);

        let mut violations = vec![];
        for rule in &self.rules {
            violations.extend(rule.check(&normalized));
        }

        if violations.is_empty() {
            Ok(StudentRecord::from_normalized(normalized))
        } else {
            log::debug!("rejected intake with {} violation(s)", violations.len());
            Err(ValidationErrors { violations })
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> RawStudentInput {
        RawStudentInput {
            name: "Ada Lovelace".into(),
            roll_number: "2023001".into(),
            class_and_division: "5-B".into(),
            allergies: vec!["peanuts".into()],
            rack_number: "R-101".into(),
            bus_route_number: "Route 3: East Campus".into(),
            photo: "data:image/png;base64,AAAA".into(),
        }
    }

    #[test]
    fn test_valid_input_accepted() {
        let record = Validator::new().validate(&valid_input()).unwrap();
        assert_eq!(record.name(), "Ada Lovelace");
        assert_eq!(record.allergies(), ["peanuts".to_string()]);
    }

    #[test]
    fn test_empty_input_reports_every_field() {
        let errors = Validator::new().validate(&RawStudentInput::default()).unwrap_err();
        assert_eq!(
            errors.fields(),
            vec!["name", "rollNumber", "classAndDivision", "rackNumber", "busRouteNumber", "photo"]
        );
        for v in errors.violations() {
            assert!(!v.message.is_empty());
        }
    }

    #[test]
    fn test_single_char_name_rejected() {
        let input = RawStudentInput { name: " A ".into(), ..valid_input() };
        let errors = Validator::new().validate(&input).unwrap_err();
        assert_eq!(errors.fields(), vec!["name"]);
        assert_eq!(errors.for_field("name").next().unwrap().message, "Name is required");
    }

    #[test]
    fn test_unknown_options_rejected() {
        let input = RawStudentInput {
            class_and_division: "13-C".into(),
            bus_route_number: "Route 9: Nowhere".into(),
            allergies: vec!["dairy".into(), "sesame".into()],
            ..valid_input()
        };
        let errors = Validator::new().validate(&input).unwrap_err();
        assert_eq!(errors.fields(), vec!["classAndDivision", "allergies", "busRouteNumber"]);
        assert_eq!(
            errors.for_field("allergies").next().unwrap().message,
            "Unknown allergy \"sesame\""
        );
    }

    #[test]
    fn test_empty_allergies_is_valid() {
        let input = RawStudentInput { allergies: vec![], ..valid_input() };
        let record = Validator::new().validate(&input).unwrap();
        assert!(record.allergies().is_empty());
    }

    #[test]
    fn test_normalize_trims_and_dedupes() {
        let input = RawStudentInput {
            name: "  Ada  ".into(),
            allergies: vec!["eggs".into(), "dairy".into(), "eggs".into()],
            ..valid_input()
        };
        let record = Validator::new().validate(&input).unwrap();
        assert_eq!(record.name(), "Ada");
        assert_eq!(record.allergies(), ["eggs".to_string(), "dairy".to_string()]);
    }
}
