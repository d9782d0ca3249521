//! Template Renderer
//!
//! Turns a record and a template variant into a [`VisualComposition`]: a
//! logical canvas with named sections of positioned elements. Each variant
//! owns its layout function; the only shared pieces are the record, the QR
//! payload, and the allergy section policy (present iff allergies exist).

use serde::Serialize;

use crate::config::CardConfig;
use crate::payload::{derive_payload, payload_fingerprint};
use crate::photo::DataUri;
use crate::record::{allergy_label, route_label, StudentRecord};
use crate::store::RosterEntry;
use crate::templates::{Palette, Rgb, TemplateVariant, INK, WHITE};

/// Glyph cell edge in logical pixels at text scale 1.
pub const GLYPH_SIZE: u32 = 8;

/// Scannable-code size on saved-card summaries.
pub const SUMMARY_QR_SIZE: u32 = 40;

const BADGE_HEIGHT: u32 = 16;
const BADGE_PADDING: u32 = 8;
const BADGE_GAP: u32 = 4;

pub fn text_width(content: &str, scale: u32) -> u32 {
    content.chars().count() as u32 * GLYPH_SIZE * scale
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoShape {
    Square,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    Embedded { mime: String, bytes: Vec<u8> },
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Rect {
        rect: Rect,
        color: Rgb,
    },
    /// Single line of text; `x` is the anchor for `align`.
    Text {
        x: u32,
        y: u32,
        scale: u32,
        color: Rgb,
        align: Align,
        content: String,
    },
    /// Label line over a value line.
    Field {
        rect: Rect,
        label: String,
        value: String,
        align: Align,
        background: Option<Rgb>,
    },
    Badge {
        rect: Rect,
        label: String,
    },
    Photo {
        rect: Rect,
        shape: PhotoShape,
        source: PhotoSource,
    },
    QrCode {
        rect: Rect,
        payload: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Header,
    Photo,
    Identity,
    Details,
    Allergies,
    Code,
    Footer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub elements: Vec<Element>,
}

impl Section {
    fn new(kind: SectionKind, elements: Vec<Element>) -> Self {
        Self { kind, elements }
    }
}

/// A fully laid-out card, ready for display or export.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualComposition {
    pub template: TemplateVariant,
    pub width: u32,
    pub height: u32,
    pub palette: Palette,
    pub student_name: String,
    pub payload_fingerprint: String,
    pub sections: Vec<Section>,
}

impl VisualComposition {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Elements in paint order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.sections.iter().flat_map(|s| s.elements.iter())
    }

    pub fn field_value(&self, label: &str) -> Option<&str> {
        self.elements().find_map(|e| match e {
            Element::Field { label: l, value, .. } if l == label => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn badge_labels(&self) -> Vec<&str> {
        self.elements()
            .filter_map(|e| match e {
                Element::Badge { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.elements()
            .filter_map(|e| match e {
                Element::Text { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn qr_payload(&self) -> Option<&str> {
        self.elements().find_map(|e| match e {
            Element::QrCode { payload, .. } => Some(payload.as_str()),
            _ => None,
        })
    }
}

/// Compose `record` under `template`. Never fails: an unusable photo becomes
/// a placeholder.
pub fn render(record: &StudentRecord, template: TemplateVariant, config: &CardConfig) -> VisualComposition {
    let card = CardContent::new(record, template);
    let (height, sections) = match template {
        TemplateVariant::Blue => layout_blue(&card, config),
        TemplateVariant::Green => layout_green(&card, config),
    };

    VisualComposition {
        template,
        width: template.canvas()[0],
        height,
        palette: card.palette,
        student_name: record.name().to_string(),
        payload_fingerprint: payload_fingerprint(record),
        sections,
    }
}

/// Values shared by every layout, resolved once per render.
struct CardContent<'a> {
    record: &'a StudentRecord,
    palette: Palette,
    payload: String,
    photo: PhotoSource,
    allergy_labels: Vec<String>,
    bus_route: String,
    qr_size: u32,
}

impl<'a> CardContent<'a> {
    fn new(record: &'a StudentRecord, template: TemplateVariant) -> Self {
        let bus_route = if template.shows_route_label_only() {
            route_label(record.bus_route_number())
        } else {
            record.bus_route_number()
        };

        Self {
            record,
            palette: template.palette(),
            payload: derive_payload(record),
            photo: photo_source(record),
            allergy_labels: record.allergies().iter().map(|c| allergy_label(c).to_string()).collect(),
            bus_route: bus_route.to_string(),
            qr_size: template.qr_size(),
        }
    }
}

fn photo_source(record: &StudentRecord) -> PhotoSource {
    match DataUri::parse(record.photo()) {
        Some(uri) => PhotoSource::Embedded { mime: uri.mime, bytes: uri.bytes },
        None => {
            log::debug!("photo for {:?} is not a usable data URI, using placeholder", record.name());
            PhotoSource::Placeholder
        }
    }
}

fn text(x: u32, y: u32, scale: u32, color: Rgb, align: Align, content: impl Into<String>) -> Element {
    Element::Text { x, y, scale, color, align, content: content.into() }
}

fn field(rect: Rect, label: &str, value: &str, align: Align, background: Option<Rgb>) -> Element {
    Element::Field {
        rect,
        label: label.to_string(),
        value: value.to_string(),
        align,
        background,
    }
}

/// Lay badges out in rows within `[x, x + max_w)`, starting at `y`.
/// Returns the elements and the bottom edge of the last row.
fn flow_badges(labels: &[String], x: u32, y: u32, max_w: u32, align: Align) -> (Vec<Element>, u32) {
    let mut rows: Vec<Vec<(u32, &String)>> = vec![];
    let mut row_w = 0;
    for label in labels {
        let w = text_width(label, 1) + BADGE_PADDING * 2;
        let fits = !rows.is_empty() && row_w + BADGE_GAP + w <= max_w;
        if fits {
            if let Some(row) = rows.last_mut() {
                row.push((w, label));
            }
            row_w += BADGE_GAP + w;
        } else {
            rows.push(vec![(w, label)]);
            row_w = w;
        }
    }

    let mut elements = vec![];
    let mut top = y;
    for row in &rows {
        let total: u32 = row.iter().map(|(w, _)| w).sum::<u32>() + BADGE_GAP * (row.len() as u32 - 1);
        let mut left = match align {
            Align::Center => x + max_w.saturating_sub(total) / 2,
            Align::Right => x + max_w.saturating_sub(total),
            Align::Left => x,
        };
        for (w, label) in row {
            elements.push(Element::Badge {
                rect: Rect::new(left, top, *w, BADGE_HEIGHT),
                label: (*label).clone(),
            });
            left += w + BADGE_GAP;
        }
        top += BADGE_HEIGHT + BADGE_GAP;
    }

    let bottom = if rows.is_empty() { y } else { top - BADGE_GAP };
    (elements, bottom)
}

/// Landscape card: header band, photo and code column, details grid,
/// optional allergies, contact footer.
fn layout_blue(card: &CardContent<'_>, config: &CardConfig) -> (u32, Vec<Section>) {
    let [width, base_height] = TemplateVariant::Blue.canvas();
    let palette = card.palette;
    let record = card.record;
    const FOOTER_H: u32 = 48;

    let header = Section::new(
        SectionKind::Header,
        vec![
            Element::Rect { rect: Rect::new(0, 0, width, 56), color: palette.header },
            text(16, 12, 2, WHITE, Align::Left, &config.school_name),
            text(16, 36, 1, WHITE, Align::Left, &config.card_title),
            text(width - 16, 12, 1, WHITE, Align::Right, "Academic Year"),
            text(width - 16, 26, 2, WHITE, Align::Right, &config.academic_year),
        ],
    );

    let photo = Section::new(
        SectionKind::Photo,
        vec![Element::Photo {
            rect: Rect::new(16, 72, 128, 128),
            shape: PhotoShape::Square,
            source: card.photo.clone(),
        }],
    );

    let qr_rect = Rect::new(16 + (128 - card.qr_size) / 2, 208, card.qr_size, card.qr_size);
    let code = Section::new(
        SectionKind::Code,
        vec![
            Element::QrCode { rect: qr_rect, payload: card.payload.clone() },
            text(80, qr_rect.bottom() + 4, 1, INK, Align::Center, "Scan for details"),
        ],
    );

    let identity = Section::new(
        SectionKind::Identity,
        vec![text(160, 72, 2, INK, Align::Left, record.name())],
    );

    let details = Section::new(
        SectionKind::Details,
        vec![
            field(Rect::new(160, 100, 148, 28), "Roll Number", record.roll_number(), Align::Left, None),
            field(Rect::new(312, 100, 148, 28), "Class", record.class_and_division(), Align::Left, None),
            field(Rect::new(160, 136, 148, 28), "Rack Number", record.rack_number(), Align::Left, None),
            field(Rect::new(312, 136, 148, 28), "Bus Route", &card.bus_route, Align::Left, None),
        ],
    );

    let mut sections = vec![header, photo, code, identity, details];
    let mut content_bottom = qr_rect.bottom() + 4 + GLYPH_SIZE;

    if !card.allergy_labels.is_empty() {
        let mut elements = vec![text(160, 176, 1, INK, Align::Left, "Allergies")];
        let (badges, bottom) = flow_badges(&card.allergy_labels, 160, 192, width - 176, Align::Left);
        elements.extend(badges);
        sections.push(Section::new(SectionKind::Allergies, elements));
        content_bottom = content_bottom.max(bottom);
    }

    let footer_y = (base_height - FOOTER_H).max(content_bottom + 12);
    sections.push(Section::new(
        SectionKind::Footer,
        vec![
            Element::Rect { rect: Rect::new(0, footer_y, width, FOOTER_H), color: palette.accent },
            text(width / 2, footer_y + 8, 1, WHITE, Align::Center, &config.address),
            text(width / 2, footer_y + 24, 1, WHITE, Align::Center, &config.contact),
        ],
    ));

    (footer_y + FOOTER_H, sections)
}

/// Portrait card: centered header, round photo, name and class, boxed
/// fields, optional allergies box, code, validity footer.
fn layout_green(card: &CardContent<'_>, config: &CardConfig) -> (u32, Vec<Section>) {
    let [width, base_height] = TemplateVariant::Green.canvas();
    let center = width / 2;
    let palette = card.palette;
    let record = card.record;
    const FOOTER_H: u32 = 40;

    let header = Section::new(
        SectionKind::Header,
        vec![
            Element::Rect { rect: Rect::new(0, 0, width, 72), color: palette.header },
            text(center, 18, 2, WHITE, Align::Center, &config.school_name),
            text(center, 46, 1, WHITE, Align::Center, &config.tagline),
        ],
    );

    let photo = Section::new(
        SectionKind::Photo,
        vec![Element::Photo {
            rect: Rect::new(center - 64, 88, 128, 128),
            shape: PhotoShape::Circle,
            source: card.photo.clone(),
        }],
    );

    let identity = Section::new(
        SectionKind::Identity,
        vec![
            text(center, 228, 2, INK, Align::Center, record.name()),
            text(center, 250, 1, palette.text, Align::Center, record.class_and_division()),
        ],
    );

    let boxed = Some(WHITE);
    let details = Section::new(
        SectionKind::Details,
        vec![
            field(Rect::new(16, 272, 176, 40), "Roll Number", record.roll_number(), Align::Center, boxed),
            field(Rect::new(208, 272, 176, 40), "Rack Number", record.rack_number(), Align::Center, boxed),
            field(Rect::new(16, 320, 368, 40), "Bus Route", &card.bus_route, Align::Center, boxed),
        ],
    );

    let mut sections = vec![header, photo, identity, details];
    let mut next_y = 372;

    if !card.allergy_labels.is_empty() {
        let (badges, bottom) = flow_badges(&card.allergy_labels, 16, next_y + 22, width - 32, Align::Center);
        let box_rect = Rect::new(16, next_y, width - 32, bottom + 8 - next_y);
        let mut elements = vec![
            Element::Rect { rect: box_rect, color: WHITE },
            text(center, next_y + 6, 1, INK, Align::Center, "Allergies"),
        ];
        elements.extend(badges);
        sections.push(Section::new(SectionKind::Allergies, elements));
        next_y = box_rect.bottom() + 12;
    }

    let qr_rect = Rect::new(center - card.qr_size / 2, next_y, card.qr_size, card.qr_size);
    sections.push(Section::new(
        SectionKind::Code,
        vec![Element::QrCode { rect: qr_rect, payload: card.payload.clone() }],
    ));

    let footer_y = (base_height - FOOTER_H).max(qr_rect.bottom() + 12);
    sections.push(Section::new(
        SectionKind::Footer,
        vec![
            Element::Rect { rect: Rect::new(0, footer_y, width, FOOTER_H), color: palette.accent },
            text(
                center,
                footer_y + 6,
                1,
                WHITE,
                Align::Center,
                format!("ID Card valid for Academic Year {}", config.academic_year),
            ),
            text(center, footer_y + 22, 1, WHITE, Align::Center, &config.address),
        ],
    ));

    (footer_y + FOOTER_H, sections)
}

/// Compact entry for the saved-cards listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub position: usize,
    pub name: String,
    pub class_and_division: String,
    pub roll_number: String,
    pub bus_route: String,
    pub has_photo: bool,
    pub qr_payload: String,
    pub qr_size: u32,
}

pub fn summarize(entry: &RosterEntry) -> RosterSummary {
    let record = &entry.record;
    RosterSummary {
        position: entry.position,
        name: record.name().to_string(),
        class_and_division: record.class_and_division().to_string(),
        roll_number: record.roll_number().to_string(),
        bus_route: route_label(record.bus_route_number()).to_string(),
        has_photo: DataUri::parse(record.photo()).is_some(),
        qr_payload: derive_payload(record),
        qr_size: SUMMARY_QR_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Allergy, RawStudentInput};
    use crate::validation::Validator;

    fn record(allergies: &[&str], photo: &str) -> StudentRecord {
        Validator::new()
            .validate(&RawStudentInput {
                name: "Ada Lovelace".into(),
                roll_number: "2023001".into(),
                class_and_division: "5-B".into(),
                allergies: allergies.iter().map(|a| a.to_string()).collect(),
                rack_number: "R-101".into(),
                bus_route_number: "Route 3: East Campus".into(),
                photo: photo.into(),
            })
            .unwrap()
    }

    #[test]
    fn test_bus_route_split_per_template() {
        let r = record(&[], "data:image/png;base64,AAAA");
        let config = CardConfig::default();
        assert_eq!(render(&r, TemplateVariant::Blue, &config).field_value("Bus Route"), Some("Route 3"));
        assert_eq!(
            render(&r, TemplateVariant::Green, &config).field_value("Bus Route"),
            Some("Route 3: East Campus")
        );
        assert_eq!(r.bus_route_number(), "Route 3: East Campus");
    }

    #[test]
    fn test_allergies_section_tracks_every_subset() {
        let config = CardConfig::default();
        for mask in 0u32..(1 << Allergy::ALL.len()) {
            let subset: Vec<Allergy> = Allergy::ALL
                .into_iter()
                .enumerate()
                .filter(|(i, _)| (mask >> *i) & 1 == 1)
                .map(|(_, a)| a)
                .collect();
            let codes: Vec<&str> = subset.iter().map(|a| a.code()).collect();
            let expected: Vec<&str> = subset.iter().map(|a| a.label()).collect();
            let r = record(&codes, "data:image/png;base64,AAAA");

            for template in TemplateVariant::ALL {
                let comp = render(&r, template, &config);
                assert_eq!(comp.section(SectionKind::Allergies).is_some(), !subset.is_empty());
                assert_eq!(comp.badge_labels(), expected);
            }
        }
    }

    #[test]
    fn test_unknown_allergy_code_shown_verbatim() {
        let stored = r#"{"name":"Ada","rollNumber":"1","classAndDivision":"5-B","allergies":["sesame"],"rackNumber":"R","busRouteNumber":"Route 1: North Campus","photo":""}"#;
        let r: StudentRecord = serde_json::from_str(stored).unwrap();
        let comp = render(&r, TemplateVariant::Green, &CardConfig::default());
        assert_eq!(comp.badge_labels(), vec!["sesame"]);
    }

    #[test]
    fn test_qr_code_carries_payload_at_template_size() {
        let r = record(&["eggs"], "data:image/png;base64,AAAA");
        for template in TemplateVariant::ALL {
            let comp = render(&r, template, &CardConfig::default());
            assert_eq!(comp.qr_payload(), Some(derive_payload(&r).as_str()));
            let size = comp.elements().find_map(|e| match e {
                Element::QrCode { rect, .. } => Some(rect.w),
                _ => None,
            });
            assert_eq!(size, Some(template.qr_size()));
        }
    }

    #[test]
    fn test_unusable_photo_becomes_placeholder() {
        let r = record(&[], "not-a-data-uri");
        let comp = render(&r, TemplateVariant::Blue, &CardConfig::default());
        let source = comp.elements().find_map(|e| match e {
            Element::Photo { source, .. } => Some(source.clone()),
            _ => None,
        });
        assert_eq!(source, Some(PhotoSource::Placeholder));
    }

    #[test]
    fn test_branding_comes_from_config() {
        let config = CardConfig { school_name: "Hill School".into(), ..CardConfig::default() };
        let r = record(&[], "data:image/png;base64,AAAA");
        let comp = render(&r, TemplateVariant::Green, &config);
        assert!(comp.texts().contains(&"Hill School"));
        assert!(comp.texts().contains(&"ID Card valid for Academic Year 2023-2024"));
    }

    #[test]
    fn test_layout_stays_inside_canvas() {
        let r = record(&["peanuts", "dairy", "gluten", "eggs", "seafood"], "data:image/png;base64,AAAA");
        for template in TemplateVariant::ALL {
            let comp = render(&r, template, &CardConfig::default());
            for e in comp.elements() {
                let rect = match e {
                    Element::Rect { rect, .. }
                    | Element::Field { rect, .. }
                    | Element::Badge { rect, .. }
                    | Element::Photo { rect, .. }
                    | Element::QrCode { rect, .. } => *rect,
                    Element::Text { .. } => continue,
                };
                assert!(rect.x + rect.w <= comp.width, "{template}: {rect:?}");
                assert!(rect.bottom() <= comp.height, "{template}: {rect:?}");
            }
        }
    }

    #[test]
    fn test_summary_uses_route_label() {
        let entry = RosterEntry { position: 3, record: record(&[], "data:image/png;base64,AAAA") };
        let summary = summarize(&entry);
        assert_eq!(summary.position, 3);
        assert_eq!(summary.bus_route, "Route 3");
        assert_eq!(summary.qr_size, SUMMARY_QR_SIZE);
        assert!(summary.has_photo);
    }
}
