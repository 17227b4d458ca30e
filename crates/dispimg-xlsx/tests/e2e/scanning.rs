//! Scanning workbooks and resolving the image registry

use crate::common::*;
use dispimg_xlsx::{scan_package, ImageIndex, Package};
use pretty_assertions::assert_eq;
use std::io::Cursor;

#[test]
fn test_scan_reports_cells_per_sheet() {
    let package = Fixture::new()
        .sheet(
            "Photos",
            sheet_xml(
                &[
                    ("A1", "SUM(B1:B3)"),
                    ("B2", &dispimg("ID_1")),
                    ("C2", &dispimg("ID_2")),
                ],
                "",
                "",
            ),
        )
        .sheet("Totals", sheet_xml(&[("A1", "1+1")], "", ""))
        .sheet("More", sheet_xml(&[("AA10", &dispimg("ID_3"))], "", ""))
        .package();

    let scan = scan_package(&package).unwrap();
    assert_eq!(scan.cell_count(), 3);
    assert_eq!(
        scan.sheets.iter().map(|s| s.sheet.name.as_str()).collect::<Vec<_>>(),
        vec!["Photos", "More"]
    );
    assert!(scan.sheet("Totals").is_none());

    let photos = scan.sheet("Photos").unwrap();
    assert_eq!(photos.sheet.path, "xl/worksheets/sheet1.xml");
    let found: Vec<(String, String)> = photos
        .cells
        .iter()
        .map(|c| (c.coordinate(), c.image_id.clone()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("B2".to_string(), "ID_1".to_string()),
            ("C2".to_string(), "ID_2".to_string())
        ]
    );

    let more = &scan.sheet("More").unwrap().cells[0];
    assert_eq!((more.row(), more.column()), (10, 27));
}

#[test]
fn test_broken_sheet_is_skipped() {
    let package = Fixture::new()
        .sheet("Broken", "<worksheet><sheetData><row><c r=\"A1\"><f>x</c></row>".to_string())
        .sheet("Good", sheet_xml(&[("A1", &dispimg("ID_1"))], "", ""))
        .package();

    let scan = scan_package(&package).unwrap();
    assert_eq!(scan.sheets.len(), 1);
    assert_eq!(scan.sheets[0].sheet.name, "Good");
}

#[test]
fn test_workbook_without_pictures_scans_empty() {
    let package = Fixture::new()
        .sheet("Sheet1", sheet_xml(&[("A1", "NOW()")], "", ""))
        .without_registry()
        .package();

    assert!(scan_package(&package).unwrap().is_empty());
}

#[test]
fn test_image_index_from_package() {
    let package = Fixture::new()
        .sheet("Sheet1", sheet_xml(&[], "", ""))
        .image("ID_A", "image1.png", png(4, 4))
        .image("ID_B", "image2.png", png(4, 4))
        .package();

    let index = ImageIndex::from_package(&package).unwrap();
    assert_eq!(index.len(), 2);
    assert_eq!(index.registry_part(), "xl/cellimages.xml");
    assert_eq!(index.target("ID_B"), Some("media/image2.png"));
    assert_eq!(index.image_part("ID_A").as_deref(), Some("xl/media/image1.png"));
    assert_eq!(index.image_part("ID_C"), None);
}

#[test]
fn test_package_preserves_entry_order() {
    let bytes = Fixture::new()
        .sheet("Sheet1", sheet_xml(&[], "", ""))
        .build();
    let mut package = Package::read(Cursor::new(bytes)).unwrap();
    let before: Vec<String> = package.names().map(str::to_string).collect();

    package.set_part("xl/worksheets/sheet1.xml", b"<worksheet/>".to_vec());
    package.set_part("xl/drawings/drawing1.xml", b"<wsDr/>".to_vec());

    let mut buf = Vec::new();
    package.write(Cursor::new(&mut buf)).unwrap();
    let reread = Package::read(Cursor::new(buf)).unwrap();
    let after: Vec<String> = reread.names().map(str::to_string).collect();

    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after.last().map(String::as_str), Some("xl/drawings/drawing1.xml"));
    assert_eq!(reread.part("xl/worksheets/sheet1.xml"), Some(&b"<worksheet/>"[..]));
}
