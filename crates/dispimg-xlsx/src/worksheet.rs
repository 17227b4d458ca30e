//! Streaming worksheet rewrite
//!
//! Only the pieces that change are touched: repaired cells lose their
//! formula and cached value, a `<drawing>` reference is inserted when the
//! sheet gets a new drawing part, and the worksheet `<extLst>` can be dropped.
//! Everything else is copied event by event.

use std::collections::HashSet;

use dispimg_core::CellAddress;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{attr_value, prefix_of, qualified, CellCursor};

const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Worksheet children that follow `<drawing>` in CT_Worksheet
const AFTER_DRAWING: &[&[u8]] = &[
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// Changes to apply to one worksheet
#[derive(Debug, Clone, Copy)]
pub struct WorksheetEdit<'a> {
    /// Cells whose formula and value are removed
    pub cleared: &'a HashSet<CellAddress>,
    /// Relationship id of a drawing to reference from the sheet
    pub drawing_rel_id: Option<&'a str>,
    /// Drop the worksheet-level `<extLst>`
    pub strip_extension_lists: bool,
}

/// Apply `edit` to worksheet XML.
///
/// Returns `None` when the worksheet needs no change.
pub fn rewrite_worksheet(xml: &[u8], edit: &WorksheetEdit<'_>) -> XlsxResult<Option<Vec<u8>>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut depth = 0usize;
    let mut changed = false;

    let mut root_prefix: Option<String> = None;
    let mut rel_prefix: Option<String> = None;
    let mut drawing_pending = edit.drawing_rel_id.is_some();

    let mut in_sheet_data = false;
    let mut cursor = CellCursor::default();

    loop {
        buf.clear();
        let (e, is_empty) = match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && e.local_name().as_ref() == b"sheetData" {
                    in_sheet_data = false;
                }
                if depth == 0 && drawing_pending {
                    write_drawing(&mut writer, root_prefix.as_deref(), rel_prefix.as_deref(), edit)?;
                    drawing_pending = false;
                }
                writer.write_event(Event::End(e))?;
                continue;
            }
            Ok(Event::Eof) => break,
            Ok(event) => {
                writer.write_event(event)?;
                continue;
            }
            Err(e) => return Err(XlsxError::Xml(e)),
        };

        if depth == 0 {
            root_prefix = prefix_of(&e);
            rel_prefix = relationships_prefix(&e);
        }

        if depth == 1 {
            let local = e.local_name();
            let local = local.as_ref();

            if let (b"drawing", Some(rel_id)) = (local, edit.drawing_rel_id) {
                if !drawing_pending {
                    return Err(XlsxError::InvalidFormat(
                        "worksheet holds more than one drawing reference".into(),
                    ));
                }
                // A reference left behind by a drawing that no longer resolves
                let drawing = with_relationship_id(&e, rel_prefix.as_deref(), rel_id);
                drawing_pending = false;
                changed = true;
                if is_empty {
                    writer.write_event(Event::Empty(drawing))?;
                } else {
                    depth += 1;
                    writer.write_event(Event::Start(drawing))?;
                }
                continue;
            }
            if drawing_pending && local == b"AlternateContent" && !is_empty {
                let end = e.to_end().into_owned();
                let inner = &xml[xml_reader.read_to_end_into(end.name(), &mut skip_buf)?];
                skip_buf.clear();
                if wraps_after_drawing(inner)? {
                    write_drawing(&mut writer, root_prefix.as_deref(), rel_prefix.as_deref(), edit)?;
                    drawing_pending = false;
                }
                writer.write_event(Event::Start(e))?;
                writer.get_mut().extend_from_slice(inner);
                writer.write_event(Event::End(end))?;
                continue;
            }
            if drawing_pending && AFTER_DRAWING.contains(&local) {
                write_drawing(&mut writer, root_prefix.as_deref(), rel_prefix.as_deref(), edit)?;
                drawing_pending = false;
            }
            if local == b"extLst" && edit.strip_extension_lists {
                if !is_empty {
                    let end = e.to_end().into_owned();
                    xml_reader.read_to_end_into(end.name(), &mut skip_buf)?;
                    skip_buf.clear();
                }
                changed = true;
                continue;
            }
            if local == b"sheetData" && !is_empty {
                in_sheet_data = true;
            }
        }

        if in_sheet_data {
            match e.local_name().as_ref() {
                b"row" => {
                    cursor.enter_row(attr_value(&e, b"r").and_then(|s| s.parse().ok()));
                }
                b"c" => {
                    let address = cursor.enter_cell(attr_value(&e, b"r").as_deref())?;
                    if !is_empty && edit.cleared.contains(&address) {
                        writer.write_event(Event::Empty(without_type(&e)))?;
                        let end = e.to_end().into_owned();
                        xml_reader.read_to_end_into(end.name(), &mut skip_buf)?;
                        skip_buf.clear();
                        changed = true;
                        continue;
                    }
                }
                _ => {}
            }
        }

        if is_empty {
            writer.write_event(Event::Empty(e))?;
        } else {
            depth += 1;
            writer.write_event(Event::Start(e))?;
        }
    }

    if drawing_pending {
        return Err(XlsxError::InvalidFormat(
            "worksheet has no element to hold a drawing reference".into(),
        ));
    }

    if changed || edit.drawing_rel_id.is_some() {
        Ok(Some(writer.into_inner()))
    } else {
        Ok(None)
    }
}

/// Prefix the root binds to the relationships namespace, if any
fn relationships_prefix(root: &BytesStart<'_>) -> Option<String> {
    root.attributes().flatten().find_map(|attr| {
        let key = attr.key;
        let is_ns_decl = key.prefix().is_some_and(|p| p.as_ref() == b"xmlns");
        if is_ns_decl && attr.value.as_ref() == R_NS.as_bytes() {
            Some(String::from_utf8_lossy(key.local_name().as_ref()).into_owned())
        } else {
            None
        }
    })
}

/// Copy of a `<c>` start tag without its `t` attribute
fn without_type(cell: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(cell.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in cell.attributes().flatten() {
        if attr.key.as_ref() != b"t" {
            out.push_attribute(attr);
        }
    }
    out
}

fn write_drawing(
    writer: &mut Writer<Vec<u8>>,
    root_prefix: Option<&str>,
    rel_prefix: Option<&str>,
    edit: &WorksheetEdit<'_>,
) -> XlsxResult<()> {
    let Some(rel_id) = edit.drawing_rel_id else {
        return Ok(());
    };

    let mut drawing = BytesStart::new(qualified(root_prefix, "drawing"));
    push_relationship_id(&mut drawing, rel_prefix, rel_id);
    writer.write_event(Event::Empty(drawing))?;
    Ok(())
}

fn push_relationship_id(drawing: &mut BytesStart<'_>, rel_prefix: Option<&str>, rel_id: &str) {
    match rel_prefix {
        Some(prefix) => drawing.push_attribute((qualified(Some(prefix), "id").as_str(), rel_id)),
        None => {
            drawing.push_attribute(("xmlns:r", R_NS));
            drawing.push_attribute(("r:id", rel_id));
        }
    }
}

/// Copy of an existing `<drawing>` pointing at `rel_id`
fn with_relationship_id(
    drawing: &BytesStart<'_>,
    rel_prefix: Option<&str>,
    rel_id: &str,
) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(drawing.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut replaced = false;
    for attr in drawing.attributes().flatten() {
        let key = attr.key;
        if key.local_name().as_ref() == b"id" && key.prefix().is_some() {
            let key = String::from_utf8_lossy(key.as_ref()).into_owned();
            out.push_attribute((key.as_str(), rel_id));
            replaced = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !replaced {
        push_relationship_id(&mut out, rel_prefix, rel_id);
    }
    out
}

/// Whether the content of an `<mc:AlternateContent>` offers one of the
/// elements that follow `<drawing>` (form controls, OLE objects, ...)
fn wraps_after_drawing(inner: &[u8]) -> XlsxResult<bool> {
    let mut xml_reader = Reader::from_reader(inner);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if depth == 1 && AFTER_DRAWING.contains(&e.local_name().as_ref()) {
                    return Ok(true);
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if depth == 1 && AFTER_DRAWING.contains(&e.local_name().as_ref()) {
                    return Ok(true);
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => return Ok(false),
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }
}
