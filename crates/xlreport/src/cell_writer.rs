//! Cell writer: stores evaluated text as a typed cell value
//!
//! Coercion order:
//! 1. text format (`@`): the text, verbatim
//! 2. a finite float: a number
//! 3. an integer: a number
//! 4. a date cell: left untouched
//! 5. anything else: the text
//!
//! The cell's style index never changes, so its number format survives.
//!
//! A skipped date cell keeps its template text, placeholders included. The
//! reconciler restores that text on block rows, where placeholders are
//! cleared before lines are written.

use xlreport_core::{CellType, CellValue, Result, Workbook};

/// What [`write_cell`] stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteOutcome {
    Text,
    Number(f64),
    /// The cell is a date and the text is not a number; nothing was written
    SkippedDate,
}

/// Store `text` at `(row, col)` of a sheet
pub fn write_cell(
    workbook: &mut Workbook,
    sheet: usize,
    row: u32,
    col: u16,
    text: &str,
) -> Result<WriteOutcome> {
    let (format, declared) = {
        let ws = workbook.sheet(sheet)?;
        let style = match ws.cell_at(row, col) {
            Some(cell) => cell.style_index,
            None => ws.row(row).and_then(|r| r.style_index).unwrap_or(0),
        };
        let format = workbook.number_format_for(style).clone();
        let declared = ws
            .cell_at(row, col)
            .map(|cell| cell.value.cell_type(&format))
            .unwrap_or(CellType::Empty);
        (format, declared)
    };

    let (value, outcome) = if format.is_text_format() {
        (CellValue::string(text), WriteOutcome::Text)
    } else if let Some(n) = text.parse::<f64>().ok().filter(|n| n.is_finite()) {
        (CellValue::Number(n), WriteOutcome::Number(n))
    } else if let Ok(n) = text.parse::<i64>() {
        (CellValue::from(n), WriteOutcome::Number(n as f64))
    } else if declared == CellType::Date || format.is_date_format() {
        log::warn!(
            "sheet {} row {} col {}: date cells only take numbers, keeping {:?} out",
            sheet,
            row + 1,
            col + 1,
            text
        );
        return Ok(WriteOutcome::SkippedDate);
    } else {
        (CellValue::string(text), WriteOutcome::Text)
    };

    workbook.sheet_mut(sheet)?.cell_or_insert(row, col)?.value = value;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xlreport_core::NumberFormat;

    fn workbook() -> (Workbook, u32, u32, u32) {
        let mut wb = Workbook::new();
        let two_places = wb.add_cell_format(NumberFormat::from_string("0.00"));
        let text = wb.add_cell_format(NumberFormat::from_id(49));
        let date = wb.add_cell_format(NumberFormat::from_id(14));
        (wb, two_places, text, date)
    }

    #[test]
    fn test_number_keeps_format() {
        let (mut wb, two_places, _, _) = workbook();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{.Price}}").unwrap();
        ws.set_cell_style_at(0, 0, two_places).unwrap();

        let outcome = write_cell(&mut wb, 0, 0, 0, "12").unwrap();
        assert_eq!(outcome, WriteOutcome::Number(12.0));
        let cell = wb.worksheet(0).unwrap().cell_at(0, 0).unwrap();
        assert_eq!(cell.value, CellValue::Number(12.0));
        assert_eq!(cell.style_index, two_places);
    }

    #[test]
    fn test_text_format_is_never_numeric() {
        let (mut wb, _, text, _) = workbook();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_style_at(0, 0, text)
            .unwrap();
        assert_eq!(write_cell(&mut wb, 0, 0, 0, "007").unwrap(), WriteOutcome::Text);
        assert_eq!(
            wb.worksheet(0).unwrap().get_value_at(0, 0),
            CellValue::string("007")
        );
    }

    #[test]
    fn test_coercions() {
        let (mut wb, _, _, _) = workbook();
        assert_eq!(write_cell(&mut wb, 0, 0, 0, "007").unwrap(), WriteOutcome::Number(7.0));
        assert_eq!(write_cell(&mut wb, 0, 0, 1, "-1.5e3").unwrap(), WriteOutcome::Number(-1500.0));
        assert_eq!(write_cell(&mut wb, 0, 0, 2, "12 kg").unwrap(), WriteOutcome::Text);
        assert_eq!(write_cell(&mut wb, 0, 0, 3, "NaN").unwrap(), WriteOutcome::Text);
        assert_eq!(write_cell(&mut wb, 0, 0, 4, "").unwrap(), WriteOutcome::Text);

        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.get_value_at(0, 2), CellValue::string("12 kg"));
        assert_eq!(ws.get_value_at(0, 3), CellValue::string("NaN"));
    }

    #[test]
    fn test_date_cells() {
        let (mut wb, _, _, date) = workbook();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value_at(0, 0, "{{.When}}").unwrap();
        ws.set_cell_style_at(0, 0, date).unwrap();
        ws.set_cell_value_at(0, 1, 45000.0).unwrap();
        ws.set_cell_style_at(0, 1, date).unwrap();

        assert_eq!(
            write_cell(&mut wb, 0, 0, 0, "01.03.2024").unwrap(),
            WriteOutcome::SkippedDate
        );
        assert_eq!(
            write_cell(&mut wb, 0, 0, 1, "45001").unwrap(),
            WriteOutcome::Number(45001.0)
        );
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.get_value_at(0, 0), CellValue::string("{{.When}}"));
        assert_eq!(ws.cell_at(0, 1).unwrap().style_index, date);
    }

    #[test]
    fn test_missing_cell_takes_row_style() {
        let (mut wb, two_places, _, _) = workbook();
        wb.worksheet_mut(0).unwrap().ensure_row(3).unwrap().style_index = Some(two_places);
        write_cell(&mut wb, 0, 3, 5, "1").unwrap();
        let cell = wb.worksheet(0).unwrap().cell_at(3, 5).unwrap();
        assert_eq!(cell.style_index, two_places);
        assert!(write_cell(&mut wb, 9, 0, 0, "1").is_err());
    }
}
