//! Cell image registry (`xl/cellimages.xml`)
//!
//! Pictures referenced by `DISPIMG` formulas are listed in a registry part.
//! Each `<etc:cellImage>` wraps a picture whose `<xdr:cNvPr name>` is the
//! identifier used by the formula and whose `<a:blip r:embed>` names a
//! relationship in the registry's `.rels` part. The relationship target is the
//! media part holding the image bytes.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;
use crate::path::{rels_for_part, resolve_target};
use crate::relationships::Relationships;
use crate::xml::attr_value;

/// Conventional location of the cell image registry
pub const CELL_IMAGES_PART: &str = "xl/cellimages.xml";

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// One picture listed in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRegistryEntry {
    /// Identifier embedded in `DISPIMG` formulas
    pub name: String,
    /// Relationship id from `r:embed`
    pub embed: String,
}

/// Map of picture identifier to image target, built once per package.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    registry_part: String,
    targets: HashMap<String, String>,
}

impl ImageIndex {
    /// Build the index from the registry part and its relationships.
    ///
    /// Fails with [`XlsxError::NoImageMapping`] when either part is absent.
    pub fn from_package(package: &Package) -> XlsxResult<Self> {
        let registry_part = discover_registry_part(package).ok_or(XlsxError::NoImageMapping)?;
        let (Some(registry_xml), Some(rels_xml)) = (
            package.part(&registry_part),
            package.part(&rels_for_part(&registry_part)),
        ) else {
            log::warn!("Cell image registry {} or its relationships are missing", registry_part);
            return Err(XlsxError::NoImageMapping);
        };

        Self::from_parts(&registry_part, registry_xml, rels_xml)
    }

    /// Build the index from raw registry and relationships XML.
    ///
    /// Registry entries whose embed id has no relationship are dropped.
    pub fn from_parts(registry_part: &str, registry_xml: &[u8], rels_xml: &[u8]) -> XlsxResult<Self> {
        let entries = parse_registry(registry_xml)?;
        let rels = Relationships::parse(rels_xml)?.targets_by_id();

        let mut targets = HashMap::with_capacity(entries.len());
        for entry in entries {
            match rels.get(&entry.embed) {
                Some(target) => {
                    targets.insert(entry.name, target.clone());
                }
                None => log::debug!(
                    "Cell image '{}' references missing relationship {}",
                    entry.name,
                    entry.embed
                ),
            }
        }

        Ok(Self {
            registry_part: registry_part.to_string(),
            targets,
        })
    }

    /// Relationship target recorded for a picture identifier
    pub fn target(&self, name: &str) -> Option<&str> {
        self.targets.get(name).map(String::as_str)
    }

    /// Package part holding the picture's bytes
    pub fn image_part(&self, name: &str) -> Option<String> {
        self.target(name)
            .map(|target| resolve_target(&self.registry_part, target))
    }

    /// Registry part the index was built from
    pub fn registry_part(&self) -> &str {
        &self.registry_part
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over (identifier, target) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.targets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Find the registry part: a workbook relationship whose target ends with
/// `cellimages.xml`, or the conventional location.
fn discover_registry_part(package: &Package) -> Option<String> {
    if let Some(rels_xml) = package.part(&rels_for_part(WORKBOOK_PART)) {
        if let Ok(rels) = Relationships::parse(rels_xml) {
            for rel in rels.iter().filter(|r| !r.is_external()) {
                if rel.target.to_ascii_lowercase().ends_with("cellimages.xml") {
                    let candidate = resolve_target(WORKBOOK_PART, &rel.target);
                    if package.contains(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
    }

    if package.contains(CELL_IMAGES_PART) {
        Some(CELL_IMAGES_PART.to_string())
    } else {
        log::warn!("No cell image registry in package");
        None
    }
}

/// Parse registry entries. Pictures lacking a name or an embed id are skipped.
pub fn parse_registry(xml: &[u8]) -> XlsxResult<Vec<ImageRegistryEntry>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();

    let mut in_cell_image = false;
    let mut name: Option<String> = None;
    let mut embed: Option<String> = None;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellImage" => {
                in_cell_image = true;
                name = None;
                embed = None;
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if in_cell_image => {
                match e.local_name().as_ref() {
                    b"cNvPr" if name.is_none() => {
                        name = attr_value(&e, b"name");
                    }
                    b"blip" if embed.is_none() => {
                        embed = e
                            .attributes()
                            .flatten()
                            .find(|a| {
                                a.key.local_name().as_ref() == b"embed" && a.key.prefix().is_some()
                            })
                            .and_then(|a| a.unescape_value().ok().map(|s| s.to_string()));
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellImage" => {
                if let (Some(name), Some(embed)) = (name.take(), embed.take()) {
                    entries.push(ImageRegistryEntry { name, embed });
                }
                in_cell_image = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}
