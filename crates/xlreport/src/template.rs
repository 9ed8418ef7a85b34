//! Report templates and rendering

use std::io::{Read, Seek, Write};
use std::path::Path;

use serde_json::Value;
use xlreport_core::Workbook;
use xlreport_expr::{ExecOptions, ExprError, MissingKey, Template as ExprTemplate};
use xlreport_xlsx::{XlsxReader, XlsxWriter};

use crate::cell_writer::{write_cell, WriteOutcome};
use crate::context::StaticContext;
use crate::edit::GridEdit;
use crate::error::{Location, RenderError, RenderResult};
use crate::merge::{build_merges, MergedRegion};
use crate::reconciler::{reconcile, BlockOutcome};
use crate::scanner::{locate, scan, Marker, ScanPlan};

/// Render settings
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Log every scanned tag, record and grid edit at debug level
    pub trace: bool,
    /// Lookup of a key the data does not have
    pub missing_key: MissingKey,
    /// Run the merge builder after reconciling
    pub merge: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            trace: false,
            missing_key: MissingKey::Error,
            merge: true,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }

    fn exec_options(&self) -> ExecOptions {
        ExecOptions::default().with_missing_key(self.missing_key)
    }
}

/// What a render did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    /// Static tags rendered
    pub statics: usize,
    pub blocks: Vec<BlockOutcome>,
    pub edits: Vec<GridEdit>,
    pub merges: Vec<MergedRegion>,
    /// Date cells the writer left untouched
    pub skipped_dates: Vec<Location>,
}

/// A rendered report
#[derive(Debug, Clone)]
pub struct Rendered {
    pub workbook: Workbook,
    pub report: RenderReport,
}

impl Rendered {
    /// Save the report as an XLSX file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RenderResult<()> {
        XlsxWriter::write_file(&self.workbook, path)?;
        Ok(())
    }

    /// Write the report as XLSX to any seekable writer
    pub fn write<W: Write + Seek>(&self, writer: W) -> RenderResult<()> {
        XlsxWriter::write(&self.workbook, writer)?;
        Ok(())
    }
}

/// A report template: a workbook with placeholders plus the report constants
///
/// Rendering never touches the template itself, so one template can produce
/// any number of reports.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use xlreport::{RenderOptions, StaticContext, Template};
/// use xlreport_core::{CellValue, Workbook};
///
/// let mut workbook = Workbook::new();
/// let sheet = workbook.worksheet_mut(0).unwrap();
/// sheet.set_cell_value_at(0, 0, "{{.CompanyName}}").unwrap();
/// sheet.set_cell_value_at(1, 0, "{{range .Items}}{{.Name}}").unwrap();
/// sheet.set_cell_value_at(1, 1, "{{.Qty}}{{end.}}").unwrap();
///
/// let template = Template::new(workbook, StaticContext::new().company_name("Elephant Soft"));
/// let data = json!({"Items": [{"Name": "Bolt", "Qty": 3}, {"Name": "Nut", "Qty": 10}]});
/// let rendered = template.render(&data, &RenderOptions::default()).unwrap();
///
/// let sheet = rendered.workbook.worksheet(0).unwrap();
/// assert_eq!(sheet.get_value_at(0, 0), CellValue::string("Elephant Soft"));
/// assert_eq!(sheet.get_value_at(2, 0), CellValue::string("Nut"));
/// assert_eq!(sheet.get_value_at(2, 1), CellValue::Number(10.0));
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    workbook: Workbook,
    statics: StaticContext,
}

impl Template {
    pub fn new(workbook: Workbook, statics: StaticContext) -> Self {
        Self { workbook, statics }
    }

    /// Open an XLSX template file
    pub fn open<P: AsRef<Path>>(path: P, statics: StaticContext) -> RenderResult<Self> {
        let workbook = XlsxReader::read_file(path)?;
        Ok(Self::new(workbook, statics))
    }

    /// Read an XLSX template from any seekable reader
    pub fn read<R: Read + Seek>(reader: R, statics: StaticContext) -> RenderResult<Self> {
        let workbook = XlsxReader::read(reader)?;
        Ok(Self::new(workbook, statics))
    }

    /// Replace the report constants
    pub fn with_statics(mut self, statics: StaticContext) -> Self {
        self.statics = statics;
        self
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn statics(&self) -> &StaticContext {
        &self.statics
    }

    /// Render the template against a data tree
    ///
    /// Static tags are filled first, then every range block is evaluated in
    /// one pass and reconciled into rows, then `<<`/`>>` merges are built.
    pub fn render(&self, data: &Value, options: &RenderOptions) -> RenderResult<Rendered> {
        if self.workbook.is_empty() {
            return Err(RenderError::EmptyDocument);
        }

        let mut workbook = self.workbook.clone();
        let root = self.statics.root(data);
        let exec = options.exec_options();

        let plan = scan(&workbook)?;
        if options.trace {
            trace_plan(&plan);
        }

        let mut report = RenderReport::default();
        render_statics(&mut workbook, &plan, &root, &exec, &mut report)?;

        if !plan.blocks.is_empty() {
            let outputs = evaluate_blocks(&workbook, &plan, &root, &exec)?;
            let reconciled = reconcile(&mut workbook, &outputs, options.trace)?;
            report.blocks = reconciled.blocks;
            report.edits = reconciled.edits;
            report.skipped_dates.extend(reconciled.skipped_dates);
        }

        if options.merge {
            report.merges = build_merges(&mut workbook)?;
        }

        log::debug!(
            "rendered {} static tags, {} blocks, {} merges",
            report.statics,
            report.blocks.len(),
            report.merges.len()
        );
        Ok(Rendered { workbook, report })
    }
}

fn render_statics(
    workbook: &mut Workbook,
    plan: &ScanPlan,
    root: &Value,
    exec: &ExecOptions,
    report: &mut RenderReport,
) -> RenderResult<()> {
    for tag in &plan.statics {
        let at = |source: ExprError| RenderError::Evaluation {
            location: locate(workbook, tag.sheet, tag.row, tag.col),
            source,
        };
        let text = ExprTemplate::parse(&tag.text)
            .and_then(|t| t.render(root, exec))
            .map_err(at)?;

        if write_cell(workbook, tag.sheet, tag.row, tag.col, &text)? == WriteOutcome::SkippedDate {
            report
                .skipped_dates
                .push(locate(workbook, tag.sheet, tag.row, tag.col));
        }
        report.statics += 1;
    }
    Ok(())
}

fn evaluate_blocks(
    workbook: &Workbook,
    plan: &ScanPlan,
    root: &Value,
    exec: &ExecOptions,
) -> RenderResult<Vec<xlreport_expr::Output<Marker>>> {
    let encoded = plan.encode();
    let at = |source: ExprError| {
        let (sheet, row, col) = source
            .fragment()
            .and_then(|f| encoded.origin(f))
            .or_else(|| encoded.first_origin())
            .unwrap_or((0, 0, 0));
        RenderError::Evaluation {
            location: locate(workbook, sheet, row, col),
            source,
        }
    };

    let template = ExprTemplate::from_fragments(encoded.fragments.iter().cloned()).map_err(at)?;
    template.execute(root, exec).map_err(at)
}

fn trace_plan(plan: &ScanPlan) {
    for tag in &plan.statics {
        log::debug!("static {} (sheet {}): {:?}", tag.address(), tag.sheet, tag.text);
    }
    for block in &plan.blocks {
        log::debug!(
            "block sheet {} rows {}..={}",
            block.sheet,
            block.first_row + 1,
            block.last_row + 1
        );
        for tag in &block.tags {
            log::debug!("  {:?} {}: {:?}", tag.kind, tag.address(), tag.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use xlreport_core::CellValue;

    fn template(cells: &[(u32, u16, &str)]) -> Template {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, col, text) in cells {
            ws.set_cell_value_at(*row, *col, *text).unwrap();
        }
        Template::new(wb, StaticContext::new())
    }

    #[test]
    fn test_render_leaves_template_untouched() {
        let t = template(&[(0, 0, "{{.Title}}"), (1, 0, "{{range .Items}}{{.}}{{end.}}")]);
        let rendered = t
            .render(&json!({"Title": "T", "Items": [1, 2]}), &RenderOptions::default())
            .unwrap();

        assert_eq!(rendered.report.statics, 1);
        assert_eq!(rendered.workbook.worksheet(0).unwrap().row_count(), 3);
        assert_eq!(
            t.workbook().worksheet(0).unwrap().get_value_at(0, 0),
            CellValue::string("{{.Title}}")
        );
    }

    #[test]
    fn test_with_statics() {
        let t = template(&[(0, 0, "{{.CompanyName}}")])
            .with_statics(StaticContext::new().company_name("Elephant"));
        let rendered = t.render(&json!({}), &RenderOptions::default()).unwrap();
        assert_eq!(
            rendered.workbook.worksheet(0).unwrap().get_value_at(0, 0),
            CellValue::string("Elephant")
        );
    }

    #[test]
    fn test_static_error_location() {
        let t = template(&[(2, 1, "{{.Nope}}")]);
        let err = t.render(&json!({}), &RenderOptions::default()).unwrap_err();
        match err {
            RenderError::Evaluation { location, .. } => {
                assert_eq!(location.to_string(), "'Sheet1'!B3");
            }
            other => panic!("unexpected error: {other}"),
        }

        let lenient = RenderOptions::new().with_missing_key(MissingKey::Zero);
        let rendered = t.render(&json!({}), &lenient).unwrap();
        assert_eq!(
            rendered.workbook.worksheet(0).unwrap().get_value_at(2, 1),
            CellValue::string("")
        );
    }

    #[test]
    fn test_block_error_location() {
        let t = template(&[
            (0, 0, "{{range .Items}}{{.Name}}"),
            (0, 1, "{{.Qty | bogus}}{{end.}}"),
        ]);
        let err = t
            .render(&json!({"Items": [{"Name": "a", "Qty": 1}]}), &RenderOptions::default())
            .unwrap_err();
        match err {
            RenderError::Evaluation { location, .. } => assert_eq!(location.address().to_string(), "B1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_merge_option() {
        let t = template(&[(0, 0, "<<{{.A}}"), (0, 1, "x>>")]);
        let data = json!({"A": "a"});

        let merged = t.render(&data, &RenderOptions::default()).unwrap();
        assert_eq!(merged.report.merges.len(), 1);

        let plain = t.render(&data, &RenderOptions::new().with_merge(false)).unwrap();
        assert!(plain.report.merges.is_empty());
        assert_eq!(
            plain.workbook.worksheet(0).unwrap().get_value_at(0, 0),
            CellValue::string("<<a")
        );
    }
}
