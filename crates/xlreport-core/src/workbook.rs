//! Workbook type - the main document structure

use crate::error::{Error, Result};
use crate::number_format::NumberFormat;
use crate::package::RawParts;
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook (spreadsheet document)
///
/// Holds the worksheets in order, the cell format table (`cellXfs` index →
/// number format) and the package parts of the file it was read from.
#[derive(Debug, Clone)]
pub struct Workbook {
    /// Worksheets in the workbook
    worksheets: Vec<Worksheet>,
    /// Number format of each cell style, by style index
    formats: Vec<NumberFormat>,
    /// Package parts carried through unchanged
    parts: RawParts,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new workbook with one worksheet named "Sheet1"
    pub fn new() -> Self {
        let mut wb = Self::empty();
        wb.worksheets.push(Worksheet::new("Sheet1"));
        wb
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            formats: vec![NumberFormat::General],
            parts: RawParts::new(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Check if the workbook has no worksheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by index or fail with [`Error::SheetOutOfBounds`]
    pub fn sheet(&self, index: usize) -> Result<&Worksheet> {
        let count = self.worksheets.len();
        self.worksheets
            .get(index)
            .ok_or(Error::SheetOutOfBounds(index, count))
    }

    /// Mutable variant of [`Workbook::sheet`]
    pub fn sheet_mut(&mut self, index: usize) -> Result<&mut Worksheet> {
        let count = self.worksheets.len();
        self.worksheets
            .get_mut(index)
            .ok_or(Error::SheetOutOfBounds(index, count))
    }

    /// Get a worksheet by name
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.iter().find(|ws| ws.name() == name)
    }

    /// Get the index of a worksheet by name
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets.iter().position(|ws| ws.name() == name)
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Iterate over all worksheets mutably
    pub fn worksheets_mut(&mut self) -> impl Iterator<Item = &mut Worksheet> {
        self.worksheets.iter_mut()
    }

    /// Add a new worksheet with specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.add_existing_worksheet(Worksheet::new(name))
    }

    /// Add an existing worksheet to the workbook
    pub fn add_existing_worksheet(&mut self, worksheet: Worksheet) -> Result<usize> {
        self.validate_sheet_name(worksheet.name())?;
        let index = self.worksheets.len();
        self.worksheets.push(worksheet);
        Ok(index)
    }

    /// Append a copy of a worksheet under a new name
    ///
    /// The copy keeps cells, styles, row metadata and merged regions. Parts
    /// linked from the original sheet (drawings, tables, comments...) are not
    /// copied.
    pub fn clone_worksheet(&mut self, index: usize, name: &str) -> Result<usize> {
        self.validate_sheet_name(name)?;
        let mut copy = self.sheet(index)?.clone();
        copy.set_name(name);
        let source = copy.source().map(|s| s.for_copy());
        copy.set_source(source);

        let new_index = self.worksheets.len();
        self.worksheets.push(copy);
        Ok(new_index)
    }

    /// Remove a worksheet by index
    pub fn remove_worksheet(&mut self, index: usize) -> Result<Worksheet> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        Ok(self.worksheets.remove(index))
    }

    // ==================== Formats ====================

    /// Number format of a cell style (General for unknown styles)
    pub fn number_format_for(&self, style_index: u32) -> &NumberFormat {
        const GENERAL: NumberFormat = NumberFormat::General;
        self.formats.get(style_index as usize).unwrap_or(&GENERAL)
    }

    /// All cell styles' number formats, by style index
    pub fn formats(&self) -> &[NumberFormat] {
        &self.formats
    }

    /// Replace the format table
    ///
    /// Style 0 always exists; an empty table is replaced by `[General]`.
    pub fn set_formats(&mut self, formats: Vec<NumberFormat>) {
        self.formats = if formats.is_empty() {
            vec![NumberFormat::General]
        } else {
            formats
        };
    }

    /// Get a style index displaying `format`, adding one if none exists
    pub fn add_cell_format(&mut self, format: NumberFormat) -> u32 {
        if let Some(i) = self.formats.iter().position(|f| *f == format) {
            return i as u32;
        }
        self.formats.push(format);
        (self.formats.len() - 1) as u32
    }

    // ==================== Package ====================

    /// Package parts carried through from the source file
    pub fn parts(&self) -> &RawParts {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut RawParts {
        &mut self.parts
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        // Excel compares sheet names case-insensitively
        let name_lower = name.to_lowercase();
        if self
            .worksheets
            .iter()
            .any(|ws| ws.name().to_lowercase() == name_lower)
        {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellRange, CellValue};
    use crate::package::SheetSource;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
        assert!(Workbook::empty().is_empty());
    }

    #[test]
    fn test_sheet_names() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_worksheet_with_name("sheet1"),
            Err(Error::DuplicateSheetName(_))
        ));
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("a/b").is_err());
        assert!(wb.add_worksheet_with_name(&"x".repeat(32)).is_err());
        assert_eq!(wb.add_worksheet_with_name("Сводка").unwrap(), 1);
        assert_eq!(wb.sheet_index("Сводка"), Some(1));
    }

    #[test]
    fn test_clone_worksheet() {
        let mut wb = Workbook::new();
        {
            let sheet = wb.worksheet_mut(0).unwrap();
            sheet.set_cell_value_at(0, 0, "{{.Dyn0.Name}}").unwrap();
            sheet.merge_cells(CellRange::parse("A2:C2").unwrap()).unwrap();
            sheet.set_source(Some(SheetSource {
                part_name: "xl/worksheets/sheet1.xml".into(),
                rel_id: "rId1".into(),
                sheet_id: 1,
                ..SheetSource::default()
            }));
        }

        let idx = wb.clone_worksheet(0, "Copy").unwrap();
        let copy = wb.worksheet(idx).unwrap();
        assert_eq!(copy.name(), "Copy");
        assert_eq!(copy.get_value_at(0, 0), CellValue::string("{{.Dyn0.Name}}"));
        assert_eq!(copy.merged_regions().len(), 1);
        assert!(!copy.source().unwrap().is_stored());

        assert!(wb.clone_worksheet(5, "Other").is_err());
        assert!(wb.clone_worksheet(0, "copy").is_err());
    }

    #[test]
    fn test_formats() {
        let mut wb = Workbook::new();
        assert_eq!(wb.number_format_for(0), &NumberFormat::General);
        assert_eq!(wb.number_format_for(99), &NumberFormat::General);

        let text = wb.add_cell_format(NumberFormat::BuiltIn(49));
        assert_eq!(text, 1);
        assert_eq!(wb.add_cell_format(NumberFormat::BuiltIn(49)), 1);
        assert!(wb.number_format_for(text).is_text_format());
    }
}
