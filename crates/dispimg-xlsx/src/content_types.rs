//! `[Content_Types].xml`

use std::collections::HashSet;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{attr_value, prefix_of, qualified};

/// Part name of the content types stream
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Content type registrations with pending additions.
///
/// Additions are spliced in before `</Types>`; the existing entries are kept
/// as they are.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    xml: Vec<u8>,
    root_prefix: Option<String>,
    defaults: HashSet<String>,
    overrides: HashSet<String>,
    additions: Vec<String>,
}

impl ContentTypes {
    pub fn parse(xml: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(xml);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut root_prefix = None;
        let mut seen_root = false;
        let mut defaults = HashSet::new();
        let mut overrides = HashSet::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"Types" if !seen_root => {
                        seen_root = true;
                        root_prefix = prefix_of(&e);
                    }
                    b"Default" => {
                        if let Some(ext) = attr_value(&e, b"Extension") {
                            defaults.insert(ext.to_ascii_lowercase());
                        }
                    }
                    b"Override" => {
                        if let Some(part) = attr_value(&e, b"PartName") {
                            overrides.insert(part);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(XlsxError::InvalidFormat(format!(
                "{} has no Types element",
                CONTENT_TYPES_PART
            )));
        }

        Ok(Self {
            xml: xml.to_vec(),
            root_prefix,
            defaults,
            overrides,
            additions: Vec::new(),
        })
    }

    pub fn has_default(&self, extension: &str) -> bool {
        self.defaults.contains(&extension.to_ascii_lowercase())
    }

    /// `part` is a package part name without the leading `/`
    pub fn has_override(&self, part: &str) -> bool {
        self.overrides.contains(&format!("/{}", part.trim_start_matches('/')))
    }

    /// Register a default content type for an extension unless one exists
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        if self.defaults.insert(extension.clone()) {
            self.additions.push(format!(
                r#"<{} Extension="{}" ContentType="{}"/>"#,
                qualified(self.root_prefix.as_deref(), "Default"),
                escape(&extension),
                escape(content_type)
            ));
        }
    }

    /// Register a content type for a specific part unless one exists
    pub fn ensure_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part.trim_start_matches('/'));
        if self.overrides.insert(part_name.clone()) {
            self.additions.push(format!(
                r#"<{} PartName="{}" ContentType="{}"/>"#,
                qualified(self.root_prefix.as_deref(), "Override"),
                escape(&part_name),
                escape(content_type)
            ));
        }
    }

    pub fn is_modified(&self) -> bool {
        !self.additions.is_empty()
    }

    /// Serialize with pending additions
    pub fn to_xml(&self) -> XlsxResult<Vec<u8>> {
        if self.additions.is_empty() {
            return Ok(self.xml.clone());
        }

        let additions = self.additions.concat();
        let close = format!("</{}>", qualified(self.root_prefix.as_deref(), "Types"));

        if let Some(pos) = rfind(&self.xml, close.as_bytes()) {
            let mut out = Vec::with_capacity(self.xml.len() + additions.len());
            out.extend_from_slice(&self.xml[..pos]);
            out.extend_from_slice(additions.as_bytes());
            out.extend_from_slice(&self.xml[pos..]);
            return Ok(out);
        }

        // `<Types .../>`
        if let Some(pos) = rfind(&self.xml, b"/>") {
            let mut out = Vec::with_capacity(self.xml.len() + additions.len() + close.len());
            out.extend_from_slice(&self.xml[..pos]);
            out.push(b'>');
            out.extend_from_slice(additions.as_bytes());
            out.extend_from_slice(close.as_bytes());
            out.extend_from_slice(&self.xml[pos + 2..]);
            return Ok(out);
        }

        Err(XlsxError::InvalidFormat(format!(
            "cannot extend {}",
            CONTENT_TYPES_PART
        )))
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
