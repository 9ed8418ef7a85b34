//! Runs the xlreport binary

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use xlreport_core::{CellValue, Workbook};
use xlreport_xlsx::{XlsxReader, XlsxWriter};

fn xlreport(args: &[&Path], extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xlreport"))
        .args(args)
        .args(extra)
        .env_remove("XLREPORT_COMPANY_NAME")
        .env_remove("XLREPORT_LICENSE")
        .output()
        .unwrap()
}

fn write_template(path: &Path) {
    let mut wb = Workbook::new();
    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value_at(0, 0, "{{.CompanyName}}").unwrap();
    ws.set_cell_value_at(1, 0, "{{range .Items}}{{.Name}}").unwrap();
    ws.set_cell_value_at(1, 1, "{{.Qty}}{{end.}}").unwrap();
    ws.set_cell_value_at(2, 0, "{{.Region}}").unwrap();
    XlsxWriter::write_file(&wb, path).unwrap();
}

#[test]
fn test_render() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("template.xlsx");
    let data = dir.path().join("data.json");
    let statics = dir.path().join("static.json");
    let output = dir.path().join("report.xlsx");
    write_template(&template);
    fs::write(&data, r#"{"Items": [{"Name": "A", "Qty": 1}, {"Name": "B", "Qty": 2}]}"#).unwrap();
    fs::write(&statics, r#"{"Region": "Kazan"}"#).unwrap();

    let out = xlreport(
        &[&template, &data, &output],
        &["--company-name", "Elephant", "--static", statics.to_str().unwrap()],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let report = XlsxReader::read_file(&output).unwrap();
    let ws = report.worksheet(0).unwrap();
    assert_eq!(ws.get_value_at(0, 0), CellValue::string("Elephant"));
    assert_eq!(ws.get_value_at(2, 0), CellValue::string("B"));
    assert_eq!(ws.get_value_at(2, 1), CellValue::Number(2.0));
    assert_eq!(ws.get_value_at(3, 0), CellValue::string("Kazan"));
}

#[test]
fn test_exit_codes() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("template.xlsx");
    let data = dir.path().join("data.json");
    let output = dir.path().join("report.xlsx");
    write_template(&template);

    // missing arguments
    let out = xlreport(&[&template], &[]);
    assert_eq!(out.status.code(), Some(1));

    // template cannot be opened
    fs::write(&data, "{}").unwrap();
    let out = xlreport(&[&dir.path().join("missing.xlsx"), &data, &output], &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing.xlsx"));

    // an unreadable template wins over a bad static file
    let statics = dir.path().join("static.json");
    fs::write(&statics, "[1, 2]").unwrap();
    let out = xlreport(
        &[&dir.path().join("missing.xlsx"), &data, &output],
        &["--static", statics.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(2));

    // a static file that is not an object fails the render
    let out = xlreport(&[&template, &data, &output], &["--static", statics.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not hold a JSON object"));

    // data is not JSON
    fs::write(&data, "not json").unwrap();
    let out = xlreport(&[&template, &data, &output], &[]);
    assert_eq!(out.status.code(), Some(3));

    // missing key fails the render unless it is allowed
    fs::write(&data, r#"{"Items": []}"#).unwrap();
    let out = xlreport(&[&template, &data, &output], &[]);
    assert_eq!(out.status.code(), Some(3));
    assert!(!output.exists());

    let out = xlreport(&[&template, &data, &output], &["--missing-key", "zero"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(output.exists());
}
