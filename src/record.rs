//! Student Record Schema
//!
//! The raw intake bundle, the validated record, and the fixed vocabularies
//! (classes, bus routes, allergies) the validator checks against.

use serde::{Deserialize, Serialize};

/// Class & division labels offered at intake: `1-A` through `12-B`.
pub fn class_options() -> Vec<String> {
    (1..=12)
        .flat_map(|grade| ["A", "B"].map(|division| format!("{grade}-{division}")))
        .collect()
}

/// Bus route descriptors, each formatted as `"<RouteLabel>: <AreaName>"`.
pub const BUS_ROUTES: [&str; 6] = [
    "Route 1: North Campus",
    "Route 2: South Campus",
    "Route 3: East Campus",
    "Route 4: West Campus",
    "Route 5: Central Area",
    "Route 6: Suburban Area",
];

/// Route label portion of a descriptor (text before the first `:`).
pub fn route_label(descriptor: &str) -> &str {
    descriptor.split(':').next().unwrap_or(descriptor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Allergy {
    Peanuts,
    Dairy,
    Gluten,
    Eggs,
    Seafood,
}

impl Allergy {
    pub const ALL: [Allergy; 5] = [
        Allergy::Peanuts,
        Allergy::Dairy,
        Allergy::Gluten,
        Allergy::Eggs,
        Allergy::Seafood,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Allergy::Peanuts => "peanuts",
            Allergy::Dairy => "dairy",
            Allergy::Gluten => "gluten",
            Allergy::Eggs => "eggs",
            Allergy::Seafood => "seafood",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Allergy::Peanuts => "Peanuts",
            Allergy::Dairy => "Dairy",
            Allergy::Gluten => "Gluten",
            Allergy::Eggs => "Eggs",
            Allergy::Seafood => "Seafood",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.code() == code)
    }
}

/// Display label for an allergy code. Unknown codes pass through unchanged.
pub fn allergy_label(code: &str) -> &str {
    match Allergy::from_code(code) {
        Some(allergy) => allergy.label(),
        None => code,
    }
}

/// Field bundle as it arrives from the intake form, before validation.
///
/// Missing keys deserialize to empty values so the validator can report them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStudentInput {
    pub name: String,
    pub roll_number: String,
    pub class_and_division: String,
    pub allergies: Vec<String>,
    pub rack_number: String,
    pub bus_route_number: String,
    pub photo: String,
}

/// A validated student record.
///
/// Only [`crate::validation::Validator`] constructs these from intake; fields
/// are read-only. Records loaded back from the roster are trusted as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    name: String,
    roll_number: String,
    class_and_division: String,
    allergies: Vec<String>,
    rack_number: String,
    bus_route_number: String,
    photo: String,
}

impl StudentRecord {
    pub(crate) fn from_normalized(input: RawStudentInput) -> Self {
        Self {
            name: input.name,
            roll_number: input.roll_number,
            class_and_division: input.class_and_division,
            allergies: input.allergies,
            rack_number: input.rack_number,
            bus_route_number: input.bus_route_number,
            photo: input.photo,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roll_number(&self) -> &str {
        &self.roll_number
    }

    pub fn class_and_division(&self) -> &str {
        &self.class_and_division
    }

    pub fn allergies(&self) -> &[String] {
        &self.allergies
    }

    pub fn rack_number(&self) -> &str {
        &self.rack_number
    }

    pub fn bus_route_number(&self) -> &str {
        &self.bus_route_number
    }

    pub fn photo(&self) -> &str {
        &self.photo
    }

    /// Raw bundle carrying this record's values, for producing an edited copy.
    pub fn to_input(&self) -> RawStudentInput {
        RawStudentInput {
            name: self.name.clone(),
            roll_number: self.roll_number.clone(),
            class_and_division: self.class_and_division.clone(),
            allergies: self.allergies.clone(),
            rack_number: self.rack_number.clone(),
            bus_route_number: self.bus_route_number.clone(),
            photo: self.photo.clone(),
        }
    }
}
