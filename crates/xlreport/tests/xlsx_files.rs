//! Templates read from and reports written to XLSX files

use std::io::Cursor;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use xlreport::{clone_sheet, RenderOptions, StaticContext, Template};
use xlreport_core::{CellRange, CellValue, NumberFormat, Workbook};
use xlreport_xlsx::{XlsxReader, XlsxWriter};

fn segment_template() -> Workbook {
    let mut wb = Workbook::new();
    let money = wb.add_cell_format(NumberFormat::from_id(2));
    let text = wb.add_cell_format(NumberFormat::from_id(49));

    let ws = wb.worksheet_mut(0).unwrap();
    ws.set_cell_value_at(0, 0, "<<{{.CompanyName}}").unwrap();
    ws.set_cell_value_at(0, 2, ">>").unwrap();
    ws.set_cell_value_at(1, 0, "Segment {{.D.Dyn0.Title}}").unwrap();
    ws.set_cell_value_at(2, 0, "{{range .D.Dyn0.Rows}}{{.Code}}").unwrap();
    ws.set_cell_style_at(2, 0, text).unwrap();
    ws.set_cell_value_at(2, 1, "{{.Name}}").unwrap();
    ws.set_cell_value_at(2, 2, "{{toRubles .Sum}}{{end.}}").unwrap();
    ws.set_cell_style_at(2, 2, money).unwrap();
    ws.set_cell_value_at(3, 0, "Total").unwrap();
    ws.set_cell_value_at(3, 2, "{{toRubles .D.Dyn0.Total}}").unwrap();
    ws.set_cell_style_at(3, 2, money).unwrap();
    wb
}

#[test]
fn test_render_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let template_path = dir.path().join("template.xlsx");
    let report_path = dir.path().join("report.xlsx");
    XlsxWriter::write_file(&segment_template(), &template_path).unwrap();

    let template = Template::open(&template_path, StaticContext::new().company_name("Elephant")).unwrap();
    let data = json!({
        "Dyn0": {
            "Title": "North",
            "Rows": [
                {"Code": "007", "Name": "Cement", "Sum": 150050},
                {"Code": "010", "Name": "Sand", "Sum": 4000}
            ],
            "Total": 154050
        }
    });
    template
        .render(&data, &RenderOptions::default())
        .unwrap()
        .save(&report_path)
        .unwrap();

    let report = XlsxReader::read_file(&report_path).unwrap();
    let ws = report.worksheet(0).unwrap();

    assert_eq!(ws.get_value_at(0, 0), CellValue::string("Elephant"));
    assert_eq!(ws.merged_regions(), &[CellRange::parse("A1:C1").unwrap()]);
    assert_eq!(ws.get_value_at(1, 0), CellValue::string("Segment North"));

    assert_eq!(ws.get_value_at(2, 0), CellValue::string("007"));
    assert_eq!(ws.get_value_at(3, 0), CellValue::string("010"));
    assert_eq!(ws.get_value_at(3, 1), CellValue::string("Sand"));
    assert_eq!(ws.get_value_at(2, 2), CellValue::Number(1500.5));
    assert_eq!(ws.get_value_at(4, 2), CellValue::Number(1540.5));

    for (row, col) in [(2, 2), (3, 2), (4, 2)] {
        let style = ws.cell_at(row, col).unwrap().style_index;
        assert_eq!(report.number_format_for(style), &NumberFormat::from_id(2));
    }
    assert!(report
        .number_format_for(ws.cell_at(3, 0).unwrap().style_index)
        .is_text_format());
}

#[test]
fn test_segment_sheets() {
    let mut wb = segment_template();
    clone_sheet(&mut wb, 0, "Segment 2", "Dyn0", "Dyn1").unwrap();

    let mut buf = Vec::new();
    XlsxWriter::write(&wb, Cursor::new(&mut buf)).unwrap();
    let template = Template::read(Cursor::new(buf), StaticContext::new().company_name("E")).unwrap();

    let data = json!({
        "Dyn0": {"Title": "North", "Rows": [], "Total": 0},
        "Dyn1": {
            "Title": "South",
            "Rows": [{"Code": "1", "Name": "Gravel", "Sum": 100}],
            "Total": 100
        }
    });
    let rendered = template.render(&data, &RenderOptions::default()).unwrap();

    let first = rendered.workbook.worksheet(0).unwrap();
    assert_eq!(first.row_count(), 3);
    assert_eq!(first.get_value_at(2, 0), CellValue::string("Total"));

    let second = rendered.workbook.worksheet(1).unwrap();
    assert_eq!(second.name(), "Segment 2");
    assert_eq!(second.get_value_at(1, 0), CellValue::string("Segment South"));
    assert_eq!(second.get_value_at(2, 1), CellValue::string("Gravel"));
    assert_eq!(second.get_value_at(3, 2), CellValue::Number(1.0));
    assert_eq!(rendered.report.merges.len(), 2);
}
