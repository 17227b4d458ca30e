//! Rewriting packages: drawings, rollback and skips

use crate::common::*;
use dispimg_xlsx::relationships::Relationships;
use dispimg_xlsx::{scan_package, CellOutcome, ImageIndex, Package, PackageRewriter, XlsxError};
use pretty_assertions::assert_eq;
use std::io::Cursor;

const WIDE_COL_B: &str = r#"<cols><col min="2" max="2" width="10" customWidth="1"/></cols>"#;

fn rewrite(package: &mut Package) -> dispimg_xlsx::RewriteSummary {
    let mut scan = scan_package(package).unwrap();
    let index = ImageIndex::from_package(package).unwrap();
    PackageRewriter::new(package, &index)
        .rewrite(&mut scan, |_, _, _| {})
        .unwrap()
}

fn single_image_fixture() -> Fixture {
    let sheet = with_row_height(
        &sheet_xml(&[("B2", &dispimg("ID_PHOTO"))], WIDE_COL_B, ""),
        2,
        20.0,
    );
    Fixture::new()
        .sheet("Sheet1", sheet)
        .image("ID_PHOTO", "image1.png", png(200, 100))
}

#[test]
fn test_repair_creates_drawing() {
    let mut package = single_image_fixture().package();
    let summary = rewrite(&mut package);

    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.repaired(), 1);
    assert_eq!(summary.cells[0].coordinate(), "B2");
    assert_eq!(summary.drawings_created, vec!["xl/drawings/drawing1.xml".to_string()]);

    let sheet = part_text(&package, "xl/worksheets/sheet1.xml");
    assert!(!sheet.contains("DISPIMG"));
    assert!(sheet.contains(r#"<c r="B2" s="1"/>"#));
    assert!(sheet.contains(r#"<drawing r:id="rId1"/></worksheet>"#));

    let sheet_rels =
        Relationships::parse(package.part("xl/worksheets/_rels/sheet1.xml.rels").unwrap()).unwrap();
    assert_eq!(sheet_rels.get("rId1").unwrap().target, "../drawings/drawing1.xml");

    // 10 x 20 cell -> 120 x 120 px, 200 x 100 image -> 144 x 72 px
    let drawing = part_text(&package, "xl/drawings/drawing1.xml");
    assert!(drawing.contains("<xdr:from><xdr:col>1</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>1</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>"));
    assert!(drawing.contains(r#"<xdr:ext cx="1371600" cy="685800"/>"#));
    assert!(drawing.contains(r#"descr="ID_PHOTO""#));

    let drawing_rels =
        Relationships::parse(package.part("xl/drawings/_rels/drawing1.xml.rels").unwrap()).unwrap();
    assert_eq!(drawing_rels.get("rId1").unwrap().target, "../media/image1.png");

    let types = part_text(&package, "[Content_Types].xml");
    assert!(types.contains(
        r#"<Override PartName="/xl/drawings/drawing1.xml" ContentType="application/vnd.openxmlformats-officedocument.drawing+xml"/>"#
    ));
    assert_eq!(types.matches(r#"Extension="png""#).count(), 1);
}

#[test]
fn test_mapping_miss_leaves_formula() {
    let sheet = sheet_xml(
        &[("A1", &dispimg("ID_PHOTO")), ("A2", &dispimg("img7"))],
        "",
        "",
    );
    let mut package = Fixture::new()
        .sheet("Sheet1", sheet)
        .image("ID_PHOTO", "image1.png", png(50, 50))
        .package();

    let summary = rewrite(&mut package);
    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.repaired(), 1);
    assert_eq!(summary.cells[1].image_id, "img7");
    assert_eq!(summary.cells[1].outcome, CellOutcome::SkippedNoMapping);

    let sheet = part_text(&package, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<c r="A1" s="1"/>"#));
    assert!(sheet.contains("img7"));
}

#[test]
fn test_missing_image_data_is_skipped() {
    let sheet = sheet_xml(&[("C3", &dispimg("ID_GONE"))], "", "");
    let fixture = Fixture::new()
        .sheet("Sheet1", sheet)
        .image_without_data("ID_GONE", "image9.png");
    let mut package = fixture.package();

    let summary = rewrite(&mut package);
    assert_eq!(summary.cells[0].outcome, CellOutcome::SkippedNoImageData);
    assert!(summary.drawings_created.is_empty());
    assert!(!package.contains("xl/drawings/drawing1.xml"));
    assert!(part_text(&package, "xl/worksheets/sheet1.xml").contains("ID_GONE"));
}

#[test]
fn test_undecodable_image_is_reverted() {
    let sheet = sheet_xml(&[("A1", &dispimg("ID_BAD")), ("A2", &dispimg("ID_OK"))], "", "");
    let mut package = Fixture::new()
        .sheet("Sheet1", sheet)
        .image("ID_BAD", "image1.png", b"definitely not a png".to_vec())
        .image("ID_OK", "image2.png", png(80, 60))
        .package();

    let mut scan = scan_package(&package).unwrap();
    let index = ImageIndex::from_package(&package).unwrap();
    let summary = PackageRewriter::new(&mut package, &index)
        .rewrite(&mut scan, |_, _, _| {})
        .unwrap();

    assert!(matches!(summary.cells[0].outcome, CellOutcome::Reverted { .. }));
    assert!(summary.cells[1].outcome.is_repaired());

    // The reverted cell still holds its formula
    let bad = scan.cells().find(|c| c.image_id == "ID_BAD").unwrap();
    assert!(!bad.is_cleared());
    assert_eq!(bad.formula(), Some(r#"_xlfn.DISPIMG("ID_BAD",1)"#));

    let sheet = part_text(&package, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("ID_BAD"));
    assert!(!sheet.contains("ID_OK"));
}

#[test]
fn test_repair_is_idempotent() {
    let mut package = single_image_fixture().package();
    rewrite(&mut package);

    let mut buf = Vec::new();
    package.write(Cursor::new(&mut buf)).unwrap();
    let reopened = Package::read(Cursor::new(buf)).unwrap();

    let scan = scan_package(&reopened).unwrap();
    assert!(scan.is_empty());
    assert_eq!(scan.cell_count(), 0);
}

#[test]
fn test_sheets_get_separate_drawings() {
    let mut package = Fixture::new()
        .sheet("First", sheet_xml(&[("A1", &dispimg("ID_1"))], "", ""))
        .sheet("Empty", sheet_xml(&[], "", ""))
        .sheet("Third", sheet_xml(&[("D4", &dispimg("ID_1"))], "", ""))
        .image("ID_1", "image1.png", png(64, 64))
        .package();

    let summary = rewrite(&mut package);
    assert_eq!(summary.repaired(), 2);
    assert_eq!(
        summary.drawings_created,
        vec![
            "xl/drawings/drawing1.xml".to_string(),
            "xl/drawings/drawing2.xml".to_string()
        ]
    );
    assert!(part_text(&package, "xl/worksheets/sheet3.xml").contains(r#"<drawing r:id="rId1"/>"#));
    assert!(!part_text(&package, "xl/worksheets/sheet2.xml").contains("<drawing"));
    assert!(!package.contains("xl/worksheets/_rels/sheet2.xml.rels"));
}

#[test]
fn test_append_to_existing_drawing() {
    let sheet = sheet_xml(
        &[("B2", &dispimg("ID_1"))],
        "",
        r#"<drawing r:id="rId3"/>"#,
    );
    let sheet_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/></Relationships>"#;
    let drawing = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><xdr:absoluteAnchor><xdr:pos x="0" y="0"/><xdr:ext cx="10" cy="10"/><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="4" name="Shape"/><xdr:cNvSpPr/></xdr:nvSpPr><xdr:spPr/></xdr:sp><xdr:clientData/></xdr:absoluteAnchor></xdr:wsDr>"#;

    let mut package = Fixture::new()
        .sheet("Sheet1", sheet)
        .image("ID_1", "image1.png", png(30, 30))
        .part("xl/worksheets/_rels/sheet1.xml.rels", sheet_rels)
        .part("xl/drawings/drawing1.xml", drawing)
        .package();

    let summary = rewrite(&mut package);
    assert_eq!(summary.repaired(), 1);
    assert!(summary.drawings_created.is_empty());

    let sheet = part_text(&package, "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.matches("<drawing").count(), 1);

    let drawing = part_text(&package, "xl/drawings/drawing1.xml");
    assert!(drawing.contains(r#"<xdr:cNvPr id="4" name="Shape"/>"#));
    assert!(drawing.contains(r#"<xdr:cNvPr id="5" name="Picture 5" descr="ID_1"/>"#));
    assert!(drawing.ends_with("</xdr:oneCellAnchor></xdr:wsDr>"));

    // The worksheet relationships are not touched
    assert_eq!(
        part_text(&package, "xl/worksheets/_rels/sheet1.xml.rels"),
        sheet_rels
    );
}

#[test]
fn test_dangling_drawing_reference_is_repointed() {
    let sheet = sheet_xml(
        &[("B2", &dispimg("ID_1"))],
        "",
        r#"<drawing r:id="rId9"/>"#,
    );
    let sheet_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing5.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/></Relationships>"#;

    let mut package = Fixture::new()
        .sheet("Sheet1", sheet)
        .image("ID_1", "image1.png", png(30, 30))
        .part("xl/worksheets/_rels/sheet1.xml.rels", sheet_rels)
        .package();

    let summary = rewrite(&mut package);
    assert_eq!(summary.repaired(), 1);
    assert_eq!(summary.drawings_created, vec!["xl/drawings/drawing1.xml".to_string()]);

    let sheet = part_text(&package, "xl/worksheets/sheet1.xml");
    assert_eq!(sheet.matches("<drawing").count(), 1);
    assert!(sheet.contains(r#"<drawing r:id="rId3"/></worksheet>"#));

    let rels =
        Relationships::parse(package.part("xl/worksheets/_rels/sheet1.xml.rels").unwrap()).unwrap();
    assert!(rels.get("rId9").is_none());
    assert!(rels.get("rId2").unwrap().is_external());
    assert_eq!(rels.get("rId3").unwrap().target, "../drawings/drawing1.xml");
}

#[test]
fn test_failed_sheet_commit_restores_every_cell() {
    // Two drawing references: the sheet cannot take a new one
    let original = sheet_xml(
        &[("A1", &dispimg("ID_1")), ("B3", &dispimg("ID_2"))],
        "",
        r#"<drawing r:id="rId7"/><drawing r:id="rId8"/>"#,
    );
    let mut package = Fixture::new()
        .sheet("Sheet1", original.clone())
        .image("ID_1", "image1.png", png(40, 40))
        .image("ID_2", "image2.png", png(60, 30))
        .package();

    let mut scan = scan_package(&package).unwrap();
    assert_eq!(scan.cell_count(), 2);
    let index = ImageIndex::from_package(&package).unwrap();
    let summary = PackageRewriter::new(&mut package, &index)
        .rewrite(&mut scan, |_, _, _| {})
        .unwrap();

    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.repaired(), 0);
    assert_eq!(summary.reverted(), 2);
    assert!(summary
        .cells
        .iter()
        .all(|c| matches!(c.outcome, CellOutcome::Reverted { .. })));
    assert!(summary.drawings_created.is_empty());

    assert!(scan.cells().all(|c| !c.is_cleared()));
    assert_eq!(
        scan.cells().map(|c| c.formula()).collect::<Vec<_>>(),
        vec![
            Some(r#"_xlfn.DISPIMG("ID_1",1)"#),
            Some(r#"_xlfn.DISPIMG("ID_2",1)"#)
        ]
    );

    assert_eq!(part_text(&package, "xl/worksheets/sheet1.xml"), original);
    assert!(!package.contains("xl/drawings/drawing1.xml"));
    assert!(!package.contains("xl/worksheets/_rels/sheet1.xml.rels"));
}

#[test]
fn test_extension_lists_stripped_from_every_sheet() {
    let ext = r#"<extLst><ext uri="{78C0D931-6437-407d-A8EE-F0AAD7539E65}" xmlns:x14="http://schemas.microsoft.com/office/spreadsheetml/2009/9/main"><x14:conditionalFormattings/></ext></extLst>"#;
    let fixture = Fixture::new()
        .sheet("Pictures", sheet_xml(&[("A1", &dispimg("ID_1"))], "", ext))
        .sheet("Plain", sheet_xml(&[("A1", "SUM(1,2)")], "", ext))
        .image("ID_1", "image1.png", png(10, 10));

    let mut package = fixture.package();
    rewrite(&mut package);
    assert!(!part_text(&package, "xl/worksheets/sheet1.xml").contains("extLst"));
    assert!(!part_text(&package, "xl/worksheets/sheet2.xml").contains("extLst"));

    let mut package = fixture.package();
    let mut scan = scan_package(&package).unwrap();
    let index = ImageIndex::from_package(&package).unwrap();
    PackageRewriter::new(&mut package, &index)
        .strip_extension_lists(false)
        .rewrite(&mut scan, |_, _, _| {})
        .unwrap();
    let sheet = part_text(&package, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("extLst"));
    assert!(sheet.contains(r#"<drawing r:id="rId1"/><extLst>"#));
    assert_eq!(
        part_text(&package, "xl/worksheets/sheet2.xml"),
        sheet_xml(&[("A1", "SUM(1,2)")], "", ext)
    );
}

#[test]
fn test_progress_callback_counts_cells() {
    let sheet = sheet_xml(
        &[("A1", &dispimg("ID_1")), ("B1", &dispimg("ID_1")), ("C1", &dispimg("nope"))],
        "",
        "",
    );
    let mut package = Fixture::new()
        .sheet("Sheet1", sheet)
        .image("ID_1", "image1.png", png(10, 10))
        .package();

    let mut scan = scan_package(&package).unwrap();
    let index = ImageIndex::from_package(&package).unwrap();
    let mut seen = Vec::new();
    PackageRewriter::new(&mut package, &index)
        .rewrite(&mut scan, |done, total, report| {
            seen.push((done, total, report.coordinate()))
        })
        .unwrap();

    assert_eq!(
        seen,
        vec![
            (1, 3, "A1".to_string()),
            (2, 3, "B1".to_string()),
            (3, 3, "C1".to_string())
        ]
    );
}

#[test]
fn test_missing_registry_is_no_mapping() {
    let package = Fixture::new()
        .sheet("Sheet1", sheet_xml(&[("A1", &dispimg("ID_1"))], "", ""))
        .without_registry()
        .package();

    assert!(matches!(
        ImageIndex::from_package(&package),
        Err(XlsxError::NoImageMapping)
    ));
}

#[test]
fn test_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut package = single_image_fixture().package();
    rewrite(&mut package);

    let out = dir.path().join("book_fixed.xlsx");
    package.save(&out).unwrap();

    let reopened = Package::open(&out).unwrap();
    assert!(reopened.contains("xl/drawings/drawing1.xml"));
    assert!(reopened.contains("xl/media/image1.png"));
    assert_eq!(reopened.len(), package.len());
}
