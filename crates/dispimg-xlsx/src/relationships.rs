//! Relationship parts (`*.rels`)

use std::collections::HashMap;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

/// Relationship type of a worksheet -> drawing link
pub const REL_TYPE_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";

/// Relationship type of a drawing -> image link
pub const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One `<Relationship>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    /// Whether the target lives outside the package
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }
}

/// The relationships of one source part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    /// Parse a `.rels` part.
    ///
    /// Relationships without an `Id` or `Target` are skipped.
    pub fn parse(xml: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(xml);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut items = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut target = None;
                    let mut rel_type = None;
                    let mut target_mode = None;

                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().ok().map(|s| s.to_string());
                        match attr.key.as_ref() {
                            b"Id" => id = value,
                            b"Target" => target = value,
                            b"Type" => rel_type = value,
                            b"TargetMode" => target_mode = value,
                            _ => {}
                        }
                    }

                    if let (Some(id), Some(target)) = (id, target) {
                        items.push(Relationship {
                            id,
                            rel_type: rel_type.unwrap_or_default(),
                            target,
                            target_mode,
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { items })
    }

    /// Look up a relationship by id
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    /// Iterate over relationships in document order
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// Map of relationship id to target
    pub fn targets_by_id(&self) -> HashMap<String, String> {
        self.items
            .iter()
            .map(|r| (r.id.clone(), r.target.clone()))
            .collect()
    }

    /// First `rIdN` not used by any relationship
    pub fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        let mut n = max + 1;
        while self.get(&format!("rId{n}")).is_some() {
            n += 1;
        }
        format!("rId{n}")
    }

    /// Add a relationship to an internal target, returning its new id
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: None,
        });
        id
    }

    /// Drop every relationship of `rel_type`, returning how many went
    pub fn remove_type(&mut self, rel_type: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|r| r.rel_type != rel_type);
        before - self.items.len()
    }

    /// Serialize to `.rels` XML
    pub fn to_xml(&self) -> String {
        let mut content = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{}">"#,
            RELATIONSHIPS_NS
        );

        for rel in &self.items {
            content.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str())
            ));
            if let Some(mode) = &rel.target_mode {
                content.push_str(&format!(r#" TargetMode="{}""#, escape(mode.as_str())));
            }
            content.push_str("/>");
        }

        content.push_str("</Relationships>");
        content
    }
}
