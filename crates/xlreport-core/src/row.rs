//! Row types

use std::collections::BTreeMap;

use crate::cell::{CellData, CellValue};

/// A row of a worksheet: metadata plus its cells keyed by column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Custom height in points (None = default)
    pub height: Option<f64>,
    /// Height was set explicitly
    pub custom_height: bool,
    /// Row is hidden
    pub hidden: bool,
    /// Outline/grouping level (0-7)
    pub outline_level: u8,
    /// Row is collapsed (in outline)
    pub collapsed: bool,
    /// Row-level style index (None = no row style)
    pub style_index: Option<u32>,
    /// Cells by column index
    pub cells: BTreeMap<u16, CellData>,
}

impl Row {
    /// Create an empty row with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if this row has any custom settings
    pub fn has_custom_settings(&self) -> bool {
        self.height.is_some()
            || self.hidden
            || self.outline_level > 0
            || self.style_index.is_some()
            || self.collapsed
    }

    /// Check if the row has neither settings nor cells worth writing
    pub fn is_blank(&self) -> bool {
        !self.has_custom_settings() && self.cells.values().all(CellData::is_empty)
    }

    /// Get a cell by column index
    pub fn cell(&self, col: u16) -> Option<&CellData> {
        self.cells.get(&col)
    }

    /// Get a mutable cell by column index
    pub fn cell_mut(&mut self, col: u16) -> Option<&mut CellData> {
        self.cells.get_mut(&col)
    }

    /// Get a cell, creating it with the row's style (or the default style) if missing
    pub fn cell_or_insert(&mut self, col: u16) -> &mut CellData {
        let style = self.style_index.unwrap_or(0);
        self.cells
            .entry(col)
            .or_insert_with(|| CellData::with_style(CellValue::Empty, style))
    }

    /// Number of cells stored in the row
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Iterate over `(column, cell)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &CellData)> {
        self.cells.iter().map(|(c, d)| (*c, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_or_insert_uses_row_style() {
        let mut row = Row::new();
        row.style_index = Some(7);
        row.cell_or_insert(3).value = CellValue::Number(1.0);
        assert_eq!(row.cell(3).map(|c| c.style_index), Some(7));

        let mut plain = Row::new();
        assert_eq!(plain.cell_or_insert(0).style_index, 0);
    }

    #[test]
    fn test_is_blank() {
        let mut row = Row::new();
        assert!(row.is_blank());
        row.cells.insert(0, CellData::default());
        assert!(row.is_blank());
        row.cells.insert(1, CellData::with_style(CellValue::Empty, 2));
        assert!(!row.is_blank());
    }
}
