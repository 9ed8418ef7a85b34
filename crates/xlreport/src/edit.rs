//! Structural grid edits made while reconciling range blocks

use std::fmt;

use xlreport_core::{CellData, Result, Workbook};

use crate::scanner::{is_candidate, is_control_only};

/// One structural change to a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEdit {
    /// Fold the `rows` rows below `row` into `row`, then remove them
    ///
    /// Only the end row's cells up to `end_col` are folded. With `keep_tail`
    /// the end row stays below `row`, holding just its cells right of
    /// `end_col`.
    Collapse {
        sheet: usize,
        row: u32,
        rows: u32,
        end_col: u16,
        keep_tail: bool,
    },
    /// Remove `row`
    DeleteRow { sheet: usize, row: u32 },
    /// Insert `count` copies of `row` directly below it
    InsertCopies { sheet: usize, row: u32, count: u32 },
}

impl GridEdit {
    /// Collapse of a block spanning `row..=row + rows` whose range-end cell
    /// sits in column `end_col`
    ///
    /// The end row is kept when it has content right of `end_col`.
    pub fn collapse(
        workbook: &Workbook,
        sheet: usize,
        row: u32,
        rows: u32,
        end_col: u16,
    ) -> Result<Self> {
        let keep_tail = workbook.sheet(sheet)?.row(row + rows).map_or(false, |end| {
            end.iter()
                .any(|(col, cell)| col > end_col && !cell.value.is_empty())
        });
        Ok(GridEdit::Collapse {
            sheet,
            row,
            rows,
            end_col,
            keep_tail,
        })
    }

    /// Net change in the sheet's row count
    pub fn row_delta(&self) -> i64 {
        match self {
            GridEdit::Collapse {
                rows, keep_tail, ..
            } => *keep_tail as i64 - *rows as i64,
            GridEdit::DeleteRow { .. } => -1,
            GridEdit::InsertCopies { count, .. } => *count as i64,
        }
    }
}

impl fmt::Display for GridEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridEdit::Collapse {
                sheet,
                row,
                rows,
                keep_tail,
                ..
            } => {
                write!(
                    f,
                    "sheet {}: collapse rows {}..={} into row {}",
                    sheet,
                    row + 2,
                    row + 1 + rows,
                    row + 1
                )?;
                if *keep_tail {
                    write!(f, ", keeping the tail of row {}", row + 1 + rows)?;
                }
                Ok(())
            }
            GridEdit::DeleteRow { sheet, row } => write!(f, "sheet {}: delete row {}", sheet, row + 1),
            GridEdit::InsertCopies { sheet, row, count } => write!(
                f,
                "sheet {}: insert {} copies of row {}",
                sheet,
                count,
                row + 1
            ),
        }
    }
}

/// Apply an edit to the workbook
pub fn apply(workbook: &mut Workbook, edit: &GridEdit) -> Result<()> {
    match *edit {
        GridEdit::Collapse {
            sheet,
            row,
            rows,
            end_col,
            keep_tail,
        } => {
            let ws = workbook.sheet_mut(sheet)?;
            let end = row + rows;
            let mut overlay: Vec<(u16, CellData)> = Vec::new();
            for r in row + 1..=end {
                if let Some(source) = ws.row(r) {
                    overlay.extend(
                        source
                            .iter()
                            .filter(|(col, cell)| {
                                (r < end || *col <= end_col) && keeps_content(cell)
                            })
                            .map(|(col, cell)| (col, cell.clone())),
                    );
                }
            }
            let target = ws.ensure_row(row)?;
            for (col, cell) in overlay {
                target.cells.insert(col, cell);
            }

            if !keep_tail {
                return ws.remove_rows(row + 1, rows);
            }
            if let Some(tail) = ws.row_mut(end) {
                tail.cells.retain(|col, _| *col > end_col);
            }
            ws.remove_rows(row + 1, rows - 1)
        }
        GridEdit::DeleteRow { sheet, row } => workbook.sheet_mut(sheet)?.remove_row(row),
        GridEdit::InsertCopies { sheet, row, count } => {
            workbook.sheet_mut(sheet)?.insert_row_copies(row, count)
        }
    }
}

/// Whether a cell of a folded row overlays the block's first row
fn keeps_content(cell: &CellData) -> bool {
    if cell.value.is_empty() {
        return false;
    }
    match cell.text() {
        Some(text) if is_candidate(text) => !is_control_only(text),
        _ => true,
    }
}
