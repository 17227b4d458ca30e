//! Fixture packages for E2E tests.

use std::io::{Cursor, Write};

use dispimg_core::CellAddress;
use dispimg_xlsx::Package;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// Encode a blank PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Worksheet XML holding `DISPIMG` (or other) formulas.
///
/// `cells` are `(coordinate, formula)` pairs in document order. `cols` is
/// placed before `<sheetData>` and `tail` after `</sheetData>`.
pub fn sheet_xml(cells: &[(&str, &str)], cols: &str, tail: &str) -> String {
    let mut rows = String::new();
    let mut current_row = None;
    for (coord, formula) in cells {
        let row = CellAddress::parse(coord).expect("valid coordinate").row_number();
        if current_row != Some(row) {
            if current_row.is_some() {
                rows.push_str("</row>");
            }
            rows.push_str(&format!(r#"<row r="{}">"#, row));
            current_row = Some(row);
        }
        rows.push_str(&format!(
            r#"<c r="{}" s="1" t="str"><f>{}</f><v>{}</v></c>"#,
            coord, formula, formula
        ));
    }
    if current_row.is_some() {
        rows.push_str("</row>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{cols}<sheetData>{rows}</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>{tail}</worksheet>"#
    )
}

/// Give a row an explicit height
pub fn with_row_height(xml: &str, row: u32, height: f64) -> String {
    xml.replace(
        &format!(r#"<row r="{}">"#, row),
        &format!(r#"<row r="{}" ht="{}" customHeight="1">"#, row, height),
    )
}

/// Formula as written by the spreadsheet suite
pub fn dispimg(id: &str) -> String {
    format!(r#"_xlfn.DISPIMG(&quot;{}&quot;,1)"#, id)
}

/// In-memory workbook builder
pub struct Fixture {
    sheets: Vec<(String, String)>,
    images: Vec<(String, String, Option<Vec<u8>>)>,
    registry: bool,
    parts: Vec<(String, Vec<u8>)>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            images: Vec::new(),
            registry: true,
            parts: Vec::new(),
        }
    }

    /// Add a worksheet (`xl/worksheets/sheetN.xml`)
    pub fn sheet(mut self, name: &str, xml: String) -> Self {
        self.sheets.push((name.to_string(), xml));
        self
    }

    /// Register a picture stored at `xl/media/{file}`
    pub fn image(mut self, id: &str, file: &str, bytes: Vec<u8>) -> Self {
        self.images.push((id.to_string(), file.to_string(), Some(bytes)));
        self
    }

    /// Register a picture whose media part is absent
    pub fn image_without_data(mut self, id: &str, file: &str) -> Self {
        self.images.push((id.to_string(), file.to_string(), None));
        self
    }

    pub fn without_registry(mut self) -> Self {
        self.registry = false;
        self
    }

    /// Add a raw part
    pub fn part(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.parts.push((name.to_string(), content.into()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = zip::write::SimpleFileOptions::default();
            let mut put = |name: &str, data: &[u8]| {
                zip.start_file(name, options).expect("start entry");
                zip.write_all(data).expect("write entry");
            };

            let mut overrides = String::from(
                r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
            );
            for i in 1..=self.sheets.len() {
                overrides.push_str(&format!(
                    r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
                ));
            }
            put(
                "[Content_Types].xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>{overrides}</Types>"#
                )
                .as_bytes(),
            );

            put(
                "_rels/.rels",
                br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            );

            let mut sheets = String::new();
            let mut rels = String::new();
            for (i, (name, _)) in self.sheets.iter().enumerate() {
                let n = i + 1;
                sheets.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
                ));
            }
            if self.registry {
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{}" Type="http://www.wps.cn/officeDocument/2020/cellImage" Target="cellimages.xml"/>"#,
                    self.sheets.len() + 1
                ));
            }
            put(
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheets}</sheets></workbook>"#
                )
                .as_bytes(),
            );
            put(
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
                )
                .as_bytes(),
            );

            for (i, (_, xml)) in self.sheets.iter().enumerate() {
                put(format!("xl/worksheets/sheet{}.xml", i + 1).as_str(), xml.as_bytes());
            }

            if self.registry {
                let mut entries = String::new();
                let mut image_rels = String::new();
                for (i, (id, file, _)) in self.images.iter().enumerate() {
                    let n = i + 1;
                    entries.push_str(&format!(
                        r#"<etc:cellImage><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{}" name="{id}" descr=""/><xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId{n}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill><xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="952500" cy="952500"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr></xdr:pic></etc:cellImage>"#,
                        n + 1
                    ));
                    image_rels.push_str(&format!(
                        r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/{file}"/>"#
                    ));
                }
                put(
                    "xl/cellimages.xml",
                    format!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<etc:cellImages xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:etc="http://www.wps.cn/officeDocument/2017/etCustomData">{entries}</etc:cellImages>"#
                    )
                    .as_bytes(),
                );
                put(
                    "xl/_rels/cellimages.xml.rels",
                    format!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{image_rels}</Relationships>"#
                    )
                    .as_bytes(),
                );
            }

            for (_, file, bytes) in &self.images {
                if let Some(bytes) = bytes {
                    put(format!("xl/media/{}", file).as_str(), bytes.as_slice());
                }
            }

            for (name, content) in &self.parts {
                put(name.as_str(), content.as_slice());
            }

            zip.finish().expect("finish zip");
        }
        buf
    }

    pub fn package(&self) -> Package {
        Package::read(Cursor::new(self.build())).expect("fixture package")
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Part content as text
pub fn part_text(package: &Package, name: &str) -> String {
    String::from_utf8(
        package
            .part(name)
            .unwrap_or_else(|| panic!("missing part {}", name))
            .to_vec(),
    )
    .expect("utf-8 part")
}
