//! Template variants and their fixed display parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [0xff, 0xff, 0xff];
pub const INK: Rgb = [0x11, 0x18, 0x27];
pub const BADGE_FILL: Rgb = [0xfe, 0xe2, 0xe2];
pub const BADGE_TEXT: Rgb = [0x99, 0x1b, 0x1b];
pub const PLACEHOLDER_FILL: Rgb = [0xe5, 0xe7, 0xeb];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateVariant {
    /// Dense landscape card: photo and code on the left, details grid on the right.
    #[default]
    Blue,
    /// Centered portrait card with a round photo.
    Green,
}

#[derive(Debug, Error)]
#[error("Template not found: {0}")]
pub struct UnknownTemplate(pub String);

impl TemplateVariant {
    pub const ALL: [TemplateVariant; 2] = [TemplateVariant::Blue, TemplateVariant::Green];

    pub fn id(self) -> &'static str {
        match self {
            TemplateVariant::Blue => "blue",
            TemplateVariant::Green => "green",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TemplateVariant::Blue => "Blue Template",
            TemplateVariant::Green => "Green Template",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            TemplateVariant::Blue => Palette {
                background: [0xef, 0xf6, 0xff],
                header: [0x25, 0x63, 0xeb],
                accent: [0x3b, 0x82, 0xf6],
                border: [0x93, 0xc5, 0xfd],
                text: [0x1e, 0x40, 0xaf],
            },
            TemplateVariant::Green => Palette {
                background: [0xf0, 0xfd, 0xf4],
                header: [0x16, 0xa3, 0x4a],
                accent: [0x22, 0xc5, 0x5e],
                border: [0x86, 0xef, 0xac],
                text: [0x16, 0x65, 0x34],
            },
        }
    }

    /// Logical canvas size before export scaling.
    pub fn canvas(self) -> [u32; 2] {
        match self {
            TemplateVariant::Blue => [480, 380],
            TemplateVariant::Green => [400, 560],
        }
    }

    /// Edge length of the scannable code, in logical pixels.
    pub fn qr_size(self) -> u32 {
        match self {
            TemplateVariant::Blue => 100,
            TemplateVariant::Green => 80,
        }
    }

    /// Whether the bus route is cut down to its label.
    pub fn shows_route_label_only(self) -> bool {
        matches!(self, TemplateVariant::Blue)
    }
}

impl fmt::Display for TemplateVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TemplateVariant {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTemplate(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: Rgb,
    pub header: Rgb,
    pub accent: Rgb,
    pub border: Rgb,
    pub text: Rgb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant() {
        assert_eq!("blue".parse::<TemplateVariant>().unwrap(), TemplateVariant::Blue);
        assert_eq!(" Green ".parse::<TemplateVariant>().unwrap(), TemplateVariant::Green);
        let err = "red".parse::<TemplateVariant>().unwrap_err();
        assert!(err.to_string().contains("Template not found"));
    }

    #[test]
    fn test_dense_variant_has_larger_code() {
        assert!(TemplateVariant::Blue.qr_size() > TemplateVariant::Green.qr_size());
    }
}
