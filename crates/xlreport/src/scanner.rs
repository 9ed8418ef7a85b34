//! Tag scanner
//!
//! One pass over every sheet, row and column (in that order) classifies the
//! cells holding placeholders:
//!
//! - a cell with a `{{range ...}}` action opens a block on its row
//! - a cell with `{{end.}}` closes the open block; the rest of that row is
//!   outside the block
//! - any other placeholder cell inside an open block belongs to the block
//! - placeholder cells outside blocks are static tags
//!
//! Blocks are then encoded as a [`Record`] stream and from there as evaluator
//! fragments, with [`Marker`]s standing in for block boundaries, target
//! columns and line ends.

use lazy_regex::{regex, regex_is_match};
use xlreport_core::{CellAddress, Workbook};
use xlreport_expr::Fragment;

use crate::error::{Location, RenderError, RenderResult};

/// Explicit end-of-block marker written in templates
pub const END_MARKER: &str = "{{end.}}";

/// Loop close emitted after the last column of a block
const LOOP_CLOSE: &str = "{{end}}";

/// What a tag does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Single-cell substitution outside any block
    Static,
    /// Opens a block
    RangeBegin,
    /// Closes a block (also used for a cell that opens and closes one)
    RangeEnd,
    /// Any other cell inside a block
    RangeBody,
}

/// One scanned placeholder cell
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
    pub text: String,
    pub kind: TagKind,
}

/// A repeating-row block: the tags from `{{range}}` to `{{end.}}`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPlan {
    pub sheet: usize,
    /// Row of the range-begin cell
    pub first_row: u32,
    /// Row of the range-end cell
    pub last_row: u32,
    /// Column of the range-end cell
    pub end_col: u16,
    pub tags: Vec<Tag>,
}

/// Everything a render needs to know about a template's placeholders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPlan {
    pub statics: Vec<Tag>,
    pub blocks: Vec<BlockPlan>,
}

/// Structural items passed through the evaluator untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Start of a block's output; `end_col` is the range-end cell's column
    BlockOpen {
        sheet: usize,
        row: u32,
        last_row: u32,
        end_col: u16,
    },
    /// The text since the previous marker belongs to this column
    Column(u16),
    /// One generated line is complete
    LineBreak,
    /// End of a block's output
    BlockClose,
}

/// Typed scan record
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    BlockOpen {
        sheet: usize,
        row: u32,
        last_row: u32,
        end_col: u16,
    },
    /// Template text of the cell at `(sheet, row, col)`, assigned to `col`
    Source {
        sheet: usize,
        row: u32,
        col: u16,
        text: String,
    },
    LineBreak,
    /// The loop close, attributed to the range-end cell
    Close { sheet: usize, row: u32, col: u16 },
    BlockClose,
}

/// Evaluator input for the range pass
#[derive(Debug, Clone, Default)]
pub struct Encoded {
    pub fragments: Vec<Fragment<Marker>>,
    /// Index into the record list of each fragment
    record_of: Vec<usize>,
    records: Vec<Record>,
}

impl Encoded {
    /// Template cell a fragment came from
    ///
    /// Marker fragments resolve to the closest source cell before them.
    pub fn origin(&self, fragment: usize) -> Option<(usize, u32, u16)> {
        let record = *self.record_of.get(fragment)?;
        self.records[..=record].iter().rev().find_map(|r| match r {
            Record::Source { sheet, row, col, .. } | Record::Close { sheet, row, col } => {
                Some((*sheet, *row, *col))
            }
            _ => None,
        })
    }

    /// Source cell of the first block, for errors without a fragment
    pub fn first_origin(&self) -> Option<(usize, u32, u16)> {
        (0..self.fragments.len()).find_map(|i| self.origin(i))
    }
}

/// A cell is a tag candidate when it holds both placeholder delimiters
pub fn is_candidate(text: &str) -> bool {
    text.contains("{{") && text.contains("}}")
}

/// Whether a placeholder opens a range block (`{{range`, `{{- range`)
pub fn is_range_begin(text: &str) -> bool {
    regex_is_match!(r"\{\{-?\s*range\b", text)
}

/// Whether a cell holds nothing but block control (`{{range ...}}`, `{{end.}}`)
pub fn is_control_only(text: &str) -> bool {
    let stripped = regex!(r"\{\{-?\s*range\b.*?\}\}").replace_all(text, "");
    stripped.replace(END_MARKER, "").trim().is_empty()
}

struct OpenBlock {
    row: u32,
    tags: Vec<Tag>,
}

/// Scan a workbook for static tags and range blocks
pub fn scan(workbook: &Workbook) -> RenderResult<ScanPlan> {
    if workbook.is_empty() {
        return Err(RenderError::EmptyDocument);
    }

    let mut plan = ScanPlan::default();
    for (sheet, worksheet) in workbook.worksheets().enumerate() {
        let mut open: Option<OpenBlock> = None;

        for (row, cells) in worksheet.rows() {
            // Set once a block closes on this row
            let mut closed_here = false;

            for (col, cell) in cells.iter() {
                let text = match cell.text() {
                    Some(t) if is_candidate(t) => t,
                    _ => continue,
                };
                let mut tag = Tag {
                    sheet,
                    row,
                    col,
                    text: text.to_string(),
                    kind: TagKind::Static,
                };

                if is_range_begin(text) {
                    if let Some(block) = &open {
                        return Err(RenderError::malformed(
                            sheet,
                            row,
                            format!(
                                "range block opened at row {} is not closed before a new one",
                                block.row + 1
                            ),
                        ));
                    }
                    if closed_here {
                        return Err(RenderError::malformed(
                            sheet,
                            row,
                            "a range block cannot open on the row another one closed on",
                        ));
                    }
                    open = Some(OpenBlock {
                        row,
                        tags: Vec::new(),
                    });
                    tag.kind = TagKind::RangeBegin;
                }

                match open.take() {
                    Some(mut block) => {
                        if text.contains(END_MARKER) {
                            tag.kind = TagKind::RangeEnd;
                            block.tags.push(tag);
                            plan.blocks.push(BlockPlan {
                                sheet,
                                first_row: block.row,
                                last_row: row,
                                end_col: col,
                                tags: block.tags,
                            });
                            closed_here = true;
                        } else {
                            if tag.kind == TagKind::Static {
                                tag.kind = TagKind::RangeBody;
                            }
                            block.tags.push(tag);
                            open = Some(block);
                        }
                    }
                    None if text.contains(END_MARKER) => {
                        return Err(RenderError::malformed(
                            sheet,
                            row,
                            format!("{} without a range block", END_MARKER),
                        ));
                    }
                    None => plan.statics.push(tag),
                }
            }
        }

        if let Some(block) = open {
            return Err(RenderError::malformed(
                sheet,
                block.row,
                format!("range block is not closed with {}", END_MARKER),
            ));
        }
    }

    Ok(plan)
}

impl BlockPlan {
    /// Typed records of this block
    pub fn records(&self) -> Vec<Record> {
        let mut records = vec![Record::BlockOpen {
            sheet: self.sheet,
            row: self.first_row,
            last_row: self.last_row,
            end_col: self.end_col,
        }];

        for tag in &self.tags {
            if tag.kind != TagKind::RangeEnd {
                records.push(Record::Source {
                    sheet: tag.sheet,
                    row: tag.row,
                    col: tag.col,
                    text: tag.text.clone(),
                });
                continue;
            }

            let residual = tag.text.replacen(END_MARKER, "", 1);
            if !residual.is_empty() {
                records.push(Record::Source {
                    sheet: tag.sheet,
                    row: tag.row,
                    col: tag.col,
                    text: residual,
                });
            }
            records.push(Record::LineBreak);
            records.push(Record::Close {
                sheet: tag.sheet,
                row: tag.row,
                col: tag.col,
            });
        }

        records.push(Record::BlockClose);
        records
    }
}

impl ScanPlan {
    /// Records of every block, in scan order
    pub fn records(&self) -> Vec<Record> {
        self.blocks.iter().flat_map(BlockPlan::records).collect()
    }

    /// Evaluator fragments of every block
    pub fn encode(&self) -> Encoded {
        let records = self.records();
        let mut fragments = Vec::with_capacity(records.len() * 2);
        let mut record_of = Vec::with_capacity(records.len() * 2);

        for (i, record) in records.iter().enumerate() {
            match record {
                Record::BlockOpen {
                    sheet,
                    row,
                    last_row,
                    end_col,
                } => fragments.push(Fragment::Marker(Marker::BlockOpen {
                    sheet: *sheet,
                    row: *row,
                    last_row: *last_row,
                    end_col: *end_col,
                })),
                Record::Source { col, text, .. } => {
                    fragments.push(Fragment::Text(text.clone()));
                    record_of.push(i);
                    fragments.push(Fragment::Marker(Marker::Column(*col)));
                }
                Record::LineBreak => fragments.push(Fragment::Marker(Marker::LineBreak)),
                Record::Close { .. } => fragments.push(Fragment::Text(LOOP_CLOSE.to_string())),
                Record::BlockClose => fragments.push(Fragment::Marker(Marker::BlockClose)),
            }
            record_of.push(i);
        }

        Encoded {
            fragments,
            record_of,
            records,
        }
    }
}

/// Location of a template cell
pub fn locate(workbook: &Workbook, sheet: usize, row: u32, col: u16) -> Location {
    Location {
        sheet,
        sheet_name: workbook
            .worksheet(sheet)
            .map(|ws| ws.name().to_string())
            .unwrap_or_default(),
        row,
        col,
    }
}

impl Tag {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook(cells: &[(u32, u16, &str)]) -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        for (row, col, text) in cells {
            sheet.set_cell_value_at(*row, *col, *text).unwrap();
        }
        wb
    }

    #[test]
    fn test_range_detection() {
        assert!(is_range_begin("{{range .Items}}"));
        assert!(is_range_begin("x {{- range $i, $e := .Items}}"));
        assert!(!is_range_begin("{{.Arrangement}}"));
        assert!(!is_range_begin("{{.ranged}}"));
        assert!(!is_range_begin("{{.D.range}}"));
    }

    #[test]
    fn test_control_only() {
        assert!(is_control_only("{{range .Items}}"));
        assert!(is_control_only(" {{end.}} "));
        assert!(is_control_only("{{- range $i, $e := .Items -}}{{end.}}"));
        assert!(!is_control_only("{{range .Items}}{{.Name}}"));
        assert!(!is_control_only("Total {{end.}}"));
    }

    #[test]
    fn test_empty_workbook() {
        assert!(matches!(
            scan(&Workbook::empty()),
            Err(RenderError::EmptyDocument)
        ));
    }

    #[test]
    fn test_statics_and_single_row_block() {
        let wb = workbook(&[
            (0, 0, "{{.Title}}"),
            (0, 1, "plain"),
            (2, 0, "{{range .Items}}{{.Name}}"),
            (2, 1, "{{.Qty}}"),
            (2, 2, "{{.Sum}}{{end.}}"),
            (2, 3, "{{.After}}"),
            (4, 0, "{{.Footer}}"),
        ]);
        let plan = scan(&wb).unwrap();

        let statics: Vec<(u32, u16)> = plan.statics.iter().map(|t| (t.row, t.col)).collect();
        assert_eq!(statics, vec![(0, 0), (2, 3), (4, 0)]);

        assert_eq!(plan.blocks.len(), 1);
        let block = &plan.blocks[0];
        assert_eq!((block.first_row, block.last_row, block.end_col), (2, 2, 2));
        let kinds: Vec<TagKind> = block.tags.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TagKind::RangeBegin, TagKind::RangeBody, TagKind::RangeEnd]
        );
    }

    #[test]
    fn test_records_of_multi_row_block() {
        let wb = workbook(&[
            (4, 0, "{{range .Items}}"),
            (5, 0, "{{.Name}}"),
            (5, 1, "{{.Qty}}"),
            (6, 0, "{{end.}}"),
        ]);
        let plan = scan(&wb).unwrap();
        assert_eq!(
            plan.records(),
            vec![
                Record::BlockOpen {
                    sheet: 0,
                    row: 4,
                    last_row: 6,
                    end_col: 0
                },
                Record::Source {
                    sheet: 0,
                    row: 4,
                    col: 0,
                    text: "{{range .Items}}".into()
                },
                Record::Source {
                    sheet: 0,
                    row: 5,
                    col: 0,
                    text: "{{.Name}}".into()
                },
                Record::Source {
                    sheet: 0,
                    row: 5,
                    col: 1,
                    text: "{{.Qty}}".into()
                },
                Record::LineBreak,
                Record::Close {
                    sheet: 0,
                    row: 6,
                    col: 0
                },
                Record::BlockClose,
            ]
        );
    }

    #[test]
    fn test_residual_end_text_and_encoding() {
        let wb = workbook(&[(1, 0, "{{range .Items}}{{.A}}"), (1, 1, "{{.B}} kg{{end.}}")]);
        let encoded = scan(&wb).unwrap().encode();
        assert_eq!(
            encoded.fragments,
            vec![
                Fragment::Marker(Marker::BlockOpen {
                    sheet: 0,
                    row: 1,
                    last_row: 1,
                    end_col: 1
                }),
                Fragment::Text("{{range .Items}}{{.A}}".into()),
                Fragment::Marker(Marker::Column(0)),
                Fragment::Text("{{.B}} kg".into()),
                Fragment::Marker(Marker::Column(1)),
                Fragment::Marker(Marker::LineBreak),
                Fragment::Text("{{end}}".into()),
                Fragment::Marker(Marker::BlockClose),
            ]
        );
        assert_eq!(encoded.origin(0), None);
        assert_eq!(encoded.origin(1), Some((0, 1, 0)));
        assert_eq!(encoded.origin(3), Some((0, 1, 1)));
        assert_eq!(encoded.origin(6), Some((0, 1, 1)));
        assert_eq!(encoded.first_origin(), Some((0, 1, 0)));
    }

    #[test]
    fn test_single_cell_block() {
        let wb = workbook(&[(0, 2, "{{range .Items}}{{.}}{{end.}}")]);
        let plan = scan(&wb).unwrap();
        assert_eq!(plan.blocks[0].tags[0].kind, TagKind::RangeEnd);
        assert_eq!(plan.blocks[0].records().len(), 5);
    }

    #[test]
    fn test_malformed_blocks() {
        let unclosed = workbook(&[(3, 0, "{{range .Items}}"), (4, 0, "{{.Name}}")]);
        assert!(matches!(
            scan(&unclosed),
            Err(RenderError::MalformedTemplate { sheet: 0, row: 3, .. })
        ));

        let nested = workbook(&[(0, 0, "{{range .A}}"), (1, 0, "{{range .B}}")]);
        assert!(matches!(
            scan(&nested),
            Err(RenderError::MalformedTemplate { row: 1, .. })
        ));

        let stray = workbook(&[(0, 0, "x{{end.}}")]);
        assert!(scan(&stray).is_err());
    }

    #[test]
    fn test_blocks_do_not_span_sheets() {
        let mut wb = workbook(&[(0, 0, "{{range .A}}")]);
        let second = wb.add_worksheet_with_name("Second").unwrap();
        wb.worksheet_mut(second)
            .unwrap()
            .set_cell_value_at(0, 0, "{{end.}}")
            .unwrap();
        assert!(matches!(
            scan(&wb),
            Err(RenderError::MalformedTemplate { sheet: 0, .. })
        ));
    }
}
