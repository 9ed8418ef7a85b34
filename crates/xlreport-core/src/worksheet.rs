//! Worksheet type

use crate::cell::{CellData, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::package::SheetSource;
use crate::row::Row;
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
///
/// Rows are stored densely: `rows[i]` is row `i` (0-based). Rows past the end of
/// the vector are empty.
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Rows in order
    rows: Vec<Row>,
    /// Merged cell regions
    merged_regions: Vec<CellRange>,
    /// Raw XML of the part the sheet was read from
    source: Option<SheetSource>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Rows ===

    /// Number of rows stored (one past the last row index)
    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Get a row by index
    pub fn row(&self, row: u32) -> Option<&Row> {
        self.rows.get(row as usize)
    }

    /// Get a mutable row by index
    pub fn row_mut(&mut self, row: u32) -> Option<&mut Row> {
        self.rows.get_mut(row as usize)
    }

    /// Get a row, extending the sheet with empty rows if needed
    pub fn ensure_row(&mut self, row: u32) -> Result<&mut Row> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        let idx = row as usize;
        if idx >= self.rows.len() {
            self.rows.resize_with(idx + 1, Row::default);
        }
        Ok(&mut self.rows[idx])
    }

    /// Iterate over `(row index, row)` pairs
    pub fn rows(&self) -> impl Iterator<Item = (u32, &Row)> {
        self.rows.iter().enumerate().map(|(i, r)| (i as u32, r))
    }

    // === Cell Access ===

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.row(row).and_then(|r| r.cell(col))
    }

    /// Get a mutable cell by row and column indices
    pub fn cell_at_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.row_mut(row).and_then(|r| r.cell_mut(col))
    }

    /// Get a cell, creating it if missing
    ///
    /// A new cell takes the row's style when the row has one.
    pub fn cell_or_insert(&mut self, row: u32, col: u16) -> Result<&mut CellData> {
        check_col(col)?;
        Ok(self.ensure_row(row)?.cell_or_insert(col))
    }

    /// Get the value of a cell (Empty for missing cells)
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cell_at(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Set a cell value, keeping the cell's style
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        self.cell_or_insert(row, col)?.value = value.into();
        Ok(())
    }

    /// Set the style index of a cell
    pub fn set_cell_style_at(&mut self, row: u32, col: u16, style_index: u32) -> Result<()> {
        self.cell_or_insert(row, col)?.style_index = style_index;
        Ok(())
    }

    // === Row insertion / deletion ===

    /// Insert `count` copies of row `at` directly below it
    ///
    /// Copies carry values, styles and row metadata. Merged regions below `at`
    /// move down, regions spanning past `at` grow, and single-row regions on
    /// `at` are repeated on every copy.
    pub fn insert_row_copies(&mut self, at: u32, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let new_len = at.max(self.row_count().saturating_sub(1)) as u64 + 1 + count as u64;
        if new_len > MAX_ROWS as u64 {
            return Err(Error::RowOutOfBounds(
                new_len.min(u32::MAX as u64) as u32,
                MAX_ROWS - 1,
            ));
        }

        let template = self.ensure_row(at)?.clone();
        let idx = at as usize + 1;
        self.rows
            .splice(idx..idx, std::iter::repeat(template).take(count as usize));

        let mut copies = Vec::new();
        for region in &mut self.merged_regions {
            if region.start.row > at {
                region.start.row += count;
                region.end.row += count;
            } else if region.end.row > at {
                region.end.row += count;
            } else if region.is_single_row() && region.start.row == at {
                for i in 1..=count {
                    copies.push(CellRange::from_indices(
                        at + i,
                        region.start.col,
                        at + i,
                        region.end.col,
                    ));
                }
            }
        }
        self.merged_regions.extend(copies);
        Ok(())
    }

    /// Remove a row, shifting the rows below it up
    ///
    /// Merged regions lying only on the row are dropped; regions spanning it
    /// shrink by one.
    pub fn remove_row(&mut self, at: u32) -> Result<()> {
        if at >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(at, MAX_ROWS - 1));
        }
        if (at as usize) < self.rows.len() {
            self.rows.remove(at as usize);
        }

        self.merged_regions
            .retain(|r| !(r.is_single_row() && r.start.row == at));
        for region in &mut self.merged_regions {
            if region.start.row > at {
                region.start.row -= 1;
                region.end.row -= 1;
            } else if region.end.row >= at {
                region.end.row -= 1;
            }
        }
        self.merged_regions.retain(|r| r.start != r.end);
        Ok(())
    }

    /// Remove `count` rows starting at `start`
    pub fn remove_rows(&mut self, start: u32, count: u32) -> Result<()> {
        for _ in 0..count {
            self.remove_row(start)?;
        }
        Ok(())
    }

    // === Merged Cells ===

    /// Get all merged regions
    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged_regions
    }

    /// Merge a range of cells
    ///
    /// Fails if the range is a single cell or overlaps an existing region.
    pub fn merge_cells(&mut self, range: CellRange) -> Result<()> {
        if range.start == range.end {
            return Err(Error::InvalidRange(format!(
                "{} is a single cell",
                range
            )));
        }
        check_col(range.end.col)?;
        if range.end.row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(range.end.row, MAX_ROWS - 1));
        }
        if self.merged_regions.iter().any(|r| r.overlaps(&range)) {
            return Err(Error::MergedCellConflict(range.to_string()));
        }
        self.merged_regions.push(range);
        Ok(())
    }

    /// Find the merged region containing a cell
    pub fn merged_region_at(&self, row: u32, col: u16) -> Option<&CellRange> {
        self.merged_regions.iter().find(|r| r.contains(row, col))
    }

    // === Source ===

    /// Raw XML of the part this sheet was read from
    pub fn source(&self) -> Option<&SheetSource> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Option<SheetSource>) {
        self.source = source;
    }
}

fn check_col(col: u16) -> Result<()> {
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok(())
}
