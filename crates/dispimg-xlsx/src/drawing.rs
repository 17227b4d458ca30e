//! Worksheet drawing parts (`xl/drawings/drawingN.xml`)

use std::collections::HashMap;

use dispimg_core::Anchor;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;
use crate::path::{extension, rels_for_part, relative_target, resolve_target};
use crate::relationships::{Relationships, REL_TYPE_IMAGE};
use crate::xml::attr_value;

/// Content type of a drawing part
pub const DRAWING_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";

const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Content type for an image extension, if it is one drawings can embed
pub fn image_content_type(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        "emf" => Some("image/x-emf"),
        "wmf" => Some("image/x-wmf"),
        _ => None,
    }
}

/// A drawing part that pictures are appended to.
///
/// Either a fresh part or an existing one that already belongs to a
/// worksheet. Existing content is kept; new anchors go before the closing
/// `</xdr:wsDr>`.
#[derive(Debug, Clone)]
pub struct DrawingPart {
    path: String,
    existing_xml: Option<Vec<u8>>,
    rels: Relationships,
    image_rel_ids: HashMap<String, String>,
    next_object_id: u32,
    anchors: Vec<String>,
}

impl DrawingPart {
    /// Start a new, empty drawing part at `path`
    pub fn create(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            existing_xml: None,
            rels: Relationships::default(),
            image_rel_ids: HashMap::new(),
            next_object_id: 1,
            anchors: Vec::new(),
        }
    }

    /// Load an existing drawing part so that pictures can be appended to it
    pub fn open(package: &Package, path: &str) -> XlsxResult<Self> {
        let xml = package.required_part(path)?.to_vec();
        let rels = match package.part(&rels_for_part(path)) {
            Some(bytes) => Relationships::parse(bytes)?,
            None => Relationships::default(),
        };

        let mut image_rel_ids = HashMap::new();
        for rel in rels.iter() {
            if rel.rel_type == REL_TYPE_IMAGE && !rel.is_external() {
                image_rel_ids
                    .entry(resolve_target(path, &rel.target))
                    .or_insert_with(|| rel.id.clone());
            }
        }

        let next_object_id = max_object_id(&xml)?.saturating_add(1);

        Ok(Self {
            path: path.to_string(),
            existing_xml: Some(xml),
            rels,
            image_rel_ids,
            next_object_id,
            anchors: Vec::new(),
        })
    }

    /// Part name of the drawing
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the part did not exist before
    pub fn is_new(&self) -> bool {
        self.existing_xml.is_none()
    }

    /// Number of pictures added so far
    pub fn added(&self) -> usize {
        self.anchors.len()
    }

    /// Place the picture stored at `image_part` according to `anchor`.
    ///
    /// Returns the drawing object id. Fails without changing the drawing
    /// when the image part has no embeddable type.
    pub fn add_picture(&mut self, anchor: &Anchor, image_part: &str, description: &str) -> XlsxResult<u32> {
        let ext = extension(image_part).unwrap_or_default();
        if image_content_type(&ext).is_none() {
            return Err(XlsxError::InvalidFormat(format!(
                "unsupported image part {}",
                image_part
            )));
        }

        let rel_id = match self.image_rel_ids.get(image_part) {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .rels
                    .add(REL_TYPE_IMAGE, &relative_target(&self.path, image_part));
                self.image_rel_ids.insert(image_part.to_string(), id.clone());
                id
            }
        };

        let object_id = self.next_object_id;
        self.next_object_id += 1;

        // Appended anchors carry their own namespace declarations since an
        // existing root may bind other prefixes.
        let declare_ns = self.existing_xml.is_some();
        self.anchors
            .push(build_anchor_xml(anchor, object_id, &rel_id, description, declare_ns));
        Ok(object_id)
    }

    /// Write the drawing and its relationships into the package
    pub fn write_into(&self, package: &mut Package) -> XlsxResult<()> {
        let xml = match &self.existing_xml {
            Some(existing) => append_anchors(existing, &self.anchors)?,
            None => {
                let mut xml = format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="{XDR_NS}" xmlns:a="{A_NS}" xmlns:r="{R_NS}">"#
                );
                for anchor in &self.anchors {
                    xml.push_str(anchor);
                }
                xml.push_str("</xdr:wsDr>");
                xml.into_bytes()
            }
        };

        package.set_part(self.path.clone(), xml);
        package.set_part(rels_for_part(&self.path), self.rels.to_xml().into_bytes());
        Ok(())
    }
}

/// Largest `cNvPr id` used in a drawing
fn max_object_id(xml: &[u8]) -> XlsxResult<u32> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut max = 0;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"cNvPr" => {
                if let Some(id) = attr_value(&e, b"id").and_then(|s| s.parse::<u32>().ok()) {
                    max = max.max(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(max)
}

/// Copy `xml` and insert `anchors` right before the root end tag
fn append_anchors(xml: &[u8], anchors: &[String]) -> XlsxResult<Vec<u8>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                writer.write_event(Event::Start(e))?;
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    for anchor in anchors {
                        writer.get_mut().extend_from_slice(anchor.as_bytes());
                    }
                }
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Empty(e)) if depth == 0 => {
                let end = e.to_end().into_owned();
                writer.write_event(Event::Start(e))?;
                for anchor in anchors {
                    writer.get_mut().extend_from_slice(anchor.as_bytes());
                }
                writer.write_event(Event::End(end))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event)?,
            Err(e) => return Err(XlsxError::Xml(e)),
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn build_anchor_xml(
    anchor: &Anchor,
    object_id: u32,
    embed_rel_id: &str,
    description: &str,
    declare_ns: bool,
) -> String {
    let ns = if declare_ns {
        format!(r#" xmlns:xdr="{XDR_NS}" xmlns:a="{A_NS}" xmlns:r="{R_NS}""#)
    } else {
        String::new()
    };
    let (cx, cy) = (anchor.ext.cx, anchor.ext.cy);

    format!(
        concat!(
            r#"<xdr:oneCellAnchor{ns}>"#,
            r#"<xdr:from><xdr:col>{col}</xdr:col><xdr:colOff>{col_off}</xdr:colOff><xdr:row>{row}</xdr:row><xdr:rowOff>{row_off}</xdr:rowOff></xdr:from>"#,
            r#"<xdr:ext cx="{cx}" cy="{cy}"/>"#,
            r#"<xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{id}" name="Picture {id}" descr="{descr}"/><xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr></xdr:nvPicPr>"#,
            r#"<xdr:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>"#,
            r#"<xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic>"#,
            r#"<xdr:clientData/></xdr:oneCellAnchor>"#,
        ),
        ns = ns,
        col = anchor.from.col,
        col_off = anchor.col_offset,
        row = anchor.from.row,
        row_off = anchor.row_offset,
        cx = cx,
        cy = cy,
        id = object_id,
        descr = escape(description),
        rel = escape(embed_rel_id),
    )
}
