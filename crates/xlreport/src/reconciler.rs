//! Row reconciler
//!
//! Turns the evaluated output of the range pass back into rows. Each block
//! becomes exactly as many physical rows as it generated lines:
//!
//! - a multi-row template is first folded into its first row; cells right of
//!   the `{{end.}}` cell keep their own row below the block
//! - zero lines delete the template row
//! - `n` lines keep the template row and insert `n - 1` copies below it
//!
//! A date cell the cell writer skips keeps its template text, as it does
//! outside blocks.
//!
//! Every edit shifts later rows of the same sheet, so block rows are
//! translated through a per-sheet [`OffsetMap`] before they touch the grid.
//! Outputs are consumed in one left-to-right pass.

use std::collections::{BTreeMap, HashMap};

use xlreport_core::{CellValue, Workbook};
use xlreport_expr::Output;

use crate::cell_writer::{write_cell, WriteOutcome};
use crate::edit::{self, GridEdit};
use crate::error::{Location, RenderError, RenderResult};
use crate::scanner::{is_candidate, locate, Marker};

/// Accumulated row shift of each sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    offsets: HashMap<usize, i64>,
}

impl OffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sheet: usize) -> i64 {
        self.offsets.get(&sheet).copied().unwrap_or(0)
    }

    pub fn shift(&mut self, sheet: usize, delta: i64) {
        *self.offsets.entry(sheet).or_insert(0) += delta;
    }

    /// Current position of a template row
    pub fn live_row(&self, sheet: usize, row: u32) -> Option<u32> {
        u32::try_from(row as i64 + self.get(sheet)).ok()
    }
}

/// Column values of one generated line
pub type Line = BTreeMap<u16, String>;

/// How one block was reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    pub sheet: usize,
    /// Row of the range-begin cell in the template
    pub template_row: u32,
    /// Row the block's first line landed on
    pub live_row: u32,
    /// Lines generated (rows the block now occupies)
    pub lines: usize,
}

/// Result of a reconcile pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub blocks: Vec<BlockOutcome>,
    pub edits: Vec<GridEdit>,
    /// Date cells left untouched by the cell writer
    pub skipped_dates: Vec<Location>,
}

struct PendingBlock {
    sheet: usize,
    row: u32,
    last_row: u32,
    end_col: u16,
    lines: Vec<Line>,
    line: Line,
    text: String,
}

impl PendingBlock {
    /// Assign the text since the previous marker to `col`
    ///
    /// A later non-empty value for the same column wins over an earlier one.
    fn assign(&mut self, col: u16) {
        let text = std::mem::take(&mut self.text);
        if text.is_empty() {
            self.line.entry(col).or_default();
        } else {
            self.line.insert(col, text);
        }
    }

    fn finish_line(&mut self, trace: bool) {
        if trace && !self.text.is_empty() {
            log::debug!("dropping text without a column: {:?}", self.text);
        }
        self.text.clear();
        self.lines.push(std::mem::take(&mut self.line));
    }
}

/// Apply the range-pass output to the grid
pub fn reconcile(
    workbook: &mut Workbook,
    outputs: &[Output<Marker>],
    trace: bool,
) -> RenderResult<Reconciled> {
    let mut offsets = OffsetMap::new();
    let mut result = Reconciled::default();
    let mut pending: Option<PendingBlock> = None;

    for output in outputs {
        if let Output::Marker(Marker::BlockClose) = output {
            match pending.take() {
                Some(block) => apply_block(workbook, block, &mut offsets, &mut result, trace)?,
                None => {
                    return Err(RenderError::malformed(0, 0, "block close without a block open"))
                }
            }
            continue;
        }

        match (output, pending.as_mut()) {
            (Output::Marker(Marker::BlockOpen { sheet, row, .. }), Some(open)) => {
                return Err(RenderError::malformed(
                    *sheet,
                    *row,
                    format!(
                        "block opened while the block at row {} is still open",
                        open.row + 1
                    ),
                ));
            }
            (
                Output::Marker(Marker::BlockOpen {
                    sheet,
                    row,
                    last_row,
                    end_col,
                }),
                None,
            ) => {
                if trace {
                    log::debug!("block open: sheet {} rows {}..={}", sheet, row + 1, last_row + 1);
                }
                pending = Some(PendingBlock {
                    sheet: *sheet,
                    row: *row,
                    last_row: *last_row,
                    end_col: *end_col,
                    lines: Vec::new(),
                    line: Line::new(),
                    text: String::new(),
                });
            }
            (Output::Text(text), Some(open)) => open.text.push_str(text),
            (Output::Text(text), None) => {
                if trace {
                    log::debug!("ignoring text outside blocks: {:?}", text);
                }
            }
            (Output::Marker(Marker::Column(col)), Some(open)) => open.assign(*col),
            (Output::Marker(Marker::LineBreak), Some(open)) => {
                open.finish_line(trace);
                if trace {
                    if let Some(line) = open.lines.last() {
                        log::debug!("line {}: {:?}", open.lines.len(), line);
                    }
                }
            }
            (Output::Marker(Marker::BlockClose), Some(_)) => {}
            (Output::Marker(marker), None) => {
                return Err(RenderError::malformed(
                    0,
                    0,
                    format!("{:?} outside of a range block", marker),
                ));
            }
        }
    }

    if let Some(open) = pending {
        return Err(RenderError::malformed(
            open.sheet,
            open.row,
            "range block output is not closed",
        ));
    }

    Ok(result)
}

fn apply_block(
    workbook: &mut Workbook,
    block: PendingBlock,
    offsets: &mut OffsetMap,
    result: &mut Reconciled,
    trace: bool,
) -> RenderResult<()> {
    let sheet = block.sheet;
    let live = offsets.live_row(sheet, block.row).ok_or_else(|| {
        RenderError::malformed(sheet, block.row, "block row shifted before the sheet start")
    })?;

    let mut edit = |workbook: &mut Workbook, e: GridEdit| -> RenderResult<()> {
        if trace {
            log::debug!("{}", e);
        }
        edit::apply(workbook, &e)?;
        offsets.shift(sheet, e.row_delta());
        result.edits.push(e);
        Ok(())
    };

    if block.last_row > block.row {
        let rows = block.last_row - block.row;
        let collapse = GridEdit::collapse(workbook, sheet, live, rows, block.end_col)?;
        edit(workbook, collapse)?;
    }

    let count = block.lines.len();
    let cleared = if count == 0 {
        edit(workbook, GridEdit::DeleteRow { sheet, row: live })?;
        BTreeMap::new()
    } else {
        let cleared = clear_placeholders(workbook, sheet, live)?;
        if count > 1 {
            edit(
                workbook,
                GridEdit::InsertCopies {
                    sheet,
                    row: live,
                    count: (count - 1) as u32,
                },
            )?;
        }
        cleared
    };

    for (i, line) in block.lines.iter().enumerate() {
        let row = live + i as u32;
        for (col, text) in line {
            if text.is_empty() {
                continue;
            }
            if write_cell(workbook, sheet, row, *col, text)? != WriteOutcome::SkippedDate {
                continue;
            }
            if let (Some(template), Some(cell)) = (
                cleared.get(col),
                workbook.sheet_mut(sheet)?.cell_at_mut(row, *col),
            ) {
                cell.value = template.clone();
            }
            result.skipped_dates.push(locate(workbook, sheet, row, *col));
        }
    }

    result.blocks.push(BlockOutcome {
        sheet,
        template_row: block.row,
        live_row: live,
        lines: count,
    });
    Ok(())
}

/// Empty every placeholder cell of a row, keeping its style
///
/// Returns the cleared values by column.
fn clear_placeholders(
    workbook: &mut Workbook,
    sheet: usize,
    row: u32,
) -> RenderResult<BTreeMap<u16, CellValue>> {
    let mut cleared = BTreeMap::new();
    if let Some(cells) = workbook.sheet_mut(sheet)?.row_mut(row) {
        for (col, cell) in cells.cells.iter_mut() {
            if cell.text().map_or(false, is_candidate) {
                cleared.insert(*col, std::mem::take(&mut cell.value));
            }
        }
    }
    Ok(cleared)
}
