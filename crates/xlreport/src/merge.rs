//! Merge builder
//!
//! Rendered cells can ask for a merged region: a string cell starting with
//! `<<` opens the region, and the next cell (in row-major order) whose text
//! contains `>>` closes it. Both markers are removed from the cell text.

use xlreport_core::{CellAddress, CellRange, CellValue, Error, Workbook};

use crate::error::RenderResult;

const OPEN: &str = "<<";
const CLOSE: &str = ">>";

/// A region created by [`build_merges`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRegion {
    pub sheet: usize,
    pub range: CellRange,
}

/// Find every `<<`/`>>` pair and merge the rectangle between them
pub fn build_merges(workbook: &mut Workbook) -> RenderResult<Vec<MergedRegion>> {
    let mut created = Vec::new();

    for (sheet, ws) in workbook.worksheets_mut().enumerate() {
        let mut pending: Option<CellAddress> = None;
        let mut ranges = Vec::new();

        for row in 0..ws.row_count() {
            let Some(cells) = ws.row_mut(row) else {
                continue;
            };
            for (&col, cell) in cells.cells.iter_mut() {
                let CellValue::String(text) = &mut cell.value else {
                    continue;
                };

                if let Some(start) = pending {
                    if let Some(at) = text.find(CLOSE) {
                        text.replace_range(at..at + CLOSE.len(), "");
                        ranges.push(CellRange::new(start, CellAddress::new(row, col)));
                        pending = None;
                        continue;
                    }
                }

                if let Some(rest) = text.strip_prefix(OPEN) {
                    *text = rest.to_string();
                    let at = CellAddress::new(row, col);
                    if let Some(previous) = pending.replace(at) {
                        log::debug!(
                            "sheet {}: merge opened at {} replaced by {}",
                            sheet,
                            previous,
                            at
                        );
                    }
                }
            }
        }

        if let Some(start) = pending {
            log::debug!("sheet {}: merge opened at {} is never closed", sheet, start);
        }

        for range in ranges {
            match ws.merge_cells(range) {
                Ok(()) => created.push(MergedRegion { sheet, range }),
                Err(Error::MergedCellConflict(r)) => {
                    log::warn!(
                        "sheet '{}': {} overlaps an existing merged region, skipped",
                        ws.name(),
                        r
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(created)
}
