//! Worksheet discovery from `xl/workbook.xml`

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;
use crate::path::{rels_for_part, resolve_target};
use crate::relationships::Relationships;

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// A worksheet and the package part holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPart {
    pub name: String,
    pub path: String,
}

impl Package {
    /// List worksheets in workbook order.
    ///
    /// Sheets whose relationship cannot be resolved to a part in the package
    /// (chartsheets, dangling ids) are left out.
    pub fn worksheets(&self) -> XlsxResult<Vec<SheetPart>> {
        let sheet_info = read_workbook_xml(self.required_part(WORKBOOK_PART)?)?;
        let rels = Relationships::parse(self.required_part(&rels_for_part(WORKBOOK_PART))?)?;

        let mut sheets = Vec::with_capacity(sheet_info.len());
        for (name, r_id) in sheet_info {
            let Some(rel) = rels.get(&r_id) else {
                log::warn!("Sheet '{}' references unknown relationship {}", name, r_id);
                continue;
            };
            if rel.is_external() || !rel.rel_type.ends_with("/worksheet") {
                continue;
            }

            let path = resolve_target(WORKBOOK_PART, &rel.target);
            if !self.contains(&path) {
                log::warn!("Sheet '{}' points at missing part {}", name, path);
                continue;
            }
            sheets.push(SheetPart { name, path });
        }

        Ok(sheets)
    }
}

/// Read sheet names and relationship ids from workbook.xml
fn read_workbook_xml(xml: &[u8]) -> XlsxResult<Vec<(String, String)>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut r_id = None;

                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"name" => {
                            name = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        // `r:id`; the prefix bound to the relationships namespace varies
                        b"id" if attr.key.prefix().is_some() => {
                            r_id = attr.unescape_value().ok().map(|s| s.to_string());
                        }
                        _ => {}
                    }
                }

                if let (Some(name), Some(r_id)) = (name, r_id) {
                    sheets.push((name, r_id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}
