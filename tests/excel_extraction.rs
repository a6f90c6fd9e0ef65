#![cfg(feature = "excel_test_writer")]

use std::path::Path;

use datagator_importer::convert::{ConvertOptions, convert_path};
use datagator_importer::extract::excel::WorkbookTokenizer;
use datagator_importer::extract::{AtomKind, Payload, collect_atoms};
use datagator_importer::matrix::{JsonStyle, Matrix, Projection};
use datagator_importer::types::{Layout, Scalar};

fn write_people_xlsx(path: &Path) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();

    let ws1 = wb.add_worksheet();
    ws1.set_name("Sheet1").unwrap();
    ws1.write_string(0, 0, "id").unwrap();
    ws1.write_string(0, 1, "name").unwrap();
    ws1.write_string(0, 2, "score").unwrap();
    ws1.write_string(0, 3, "active").unwrap();
    ws1.write_number(1, 0, 1).unwrap();
    ws1.write_string(1, 1, "Ada").unwrap();
    ws1.write_number(1, 2, 98.5).unwrap();
    ws1.write_boolean(1, 3, true).unwrap();
    ws1.write_number(2, 0, 2).unwrap();
    ws1.write_string(2, 1, "Grace").unwrap();
    ws1.write_number(2, 2, 87.25).unwrap();
    ws1.write_boolean(2, 3, false).unwrap();

    let ws2 = wb.add_worksheet();
    ws2.set_name("Second").unwrap();
    ws2.write_string(0, 0, "12").unwrap();

    wb.save(path).unwrap();
}

#[test]
fn first_sheet_converts_with_typed_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xlsx");
    write_people_xlsx(&path);

    let opts = ConvertOptions {
        layout: Layout::new(1, 0),
        style: JsonStyle::Compact,
        ..Default::default()
    };
    let mut out = Vec::new();
    let stats = convert_path(&path, &mut out, &opts).unwrap();
    assert_eq!(stats.records, 3);

    let matrix = Matrix::from_slice(&out, Projection::Full).unwrap();
    assert_eq!(matrix.columns_count(), 4);
    assert_eq!(
        matrix.rows()[1],
        vec![
            Scalar::Integer(1),
            Scalar::from("Ada"),
            Scalar::Float(98.5),
            Scalar::from("true"),
        ]
    );
}

#[test]
fn named_sheet_keeps_strings_uninferred() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xlsx");
    write_people_xlsx(&path);

    let mut sheet = WorkbookTokenizer::from_path(&path, Some("Second")).unwrap();
    let atoms = collect_atoms(&mut sheet).unwrap();
    assert_eq!(
        atoms,
        vec![
            (AtomKind::StartRecord, Payload::None),
            (AtomKind::String, Payload::Scalar(Scalar::from("12"))),
            (AtomKind::EndRecord, Payload::Count(1)),
        ]
    );
}

#[test]
fn missing_sheet_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xlsx");
    write_people_xlsx(&path);

    assert!(WorkbookTokenizer::from_path(&path, Some("Nope")).is_err());
}
