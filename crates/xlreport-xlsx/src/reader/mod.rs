//! XLSX reader

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::{
    find_element, find_start_tag, read_relationships, resolve_target, CALC_CHAIN, CONTENT_TYPES,
    SHARED_STRINGS, STYLES, WORKBOOK, WORKBOOK_RELS,
};
use crate::styles::read_number_formats;
use xlreport_core::{
    CellAddress, CellData, CellRange, CellValue, NumberFormat, RawParts, SheetSource, Workbook,
    Worksheet,
};

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format for characters XML cannot carry, e.g. `_x0001_`,
/// and `_x005F_` for a literal underscore that would otherwise start an escape.
fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// A `<sheet>` entry of `workbook.xml`
#[derive(Debug)]
struct SheetEntry {
    name: String,
    sheet_id: u32,
    rel_id: String,
    state: Option<String>,
}

/// Elements that follow `<mergeCells>` in a worksheet, in schema order
const AFTER_MERGE_CELLS: &[&str] = &[
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Workbook> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a workbook from a reader
    ///
    /// Worksheets are parsed into the grid; all other parts are kept raw on
    /// the workbook so the writer can copy them back. `calcChain.xml` is
    /// dropped since row edits invalidate it.
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Workbook> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Self::read_parts(&mut archive)?;

        // Verify this is an XLSX file
        if !parts.contains(CONTENT_TYPES) {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = match parts.get(SHARED_STRINGS) {
            Some(xml) => Self::read_shared_strings(xml)?,
            None => Vec::new(),
        };

        let formats = match parts.get(STYLES) {
            Some(xml) => read_number_formats(xml)?,
            None => vec![NumberFormat::General],
        };

        let entries = Self::read_workbook_xml(
            parts
                .get(WORKBOOK)
                .ok_or_else(|| XlsxError::MissingPart(WORKBOOK.into()))?,
        )?;
        let rels = read_relationships(
            parts
                .get(WORKBOOK_RELS)
                .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_RELS.into()))?,
        )?;

        let mut workbook = Workbook::empty();
        workbook.set_formats(formats);

        let mut sheet_paths = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(rel) = rels
                .iter()
                .find(|r| r.id == entry.rel_id && r.is_worksheet())
            else {
                log::warn!(
                    "sheet '{}' is not a worksheet (relationship {}), skipped",
                    entry.name,
                    entry.rel_id
                );
                continue;
            };

            let path = resolve_target("xl", &rel.target);
            let xml = parts
                .get(&path)
                .ok_or_else(|| XlsxError::MissingPart(path.clone()))?;
            let xml = std::str::from_utf8(xml)
                .map_err(|e| XlsxError::Parse(format!("{} is not UTF-8: {}", path, e)))?;

            let mut worksheet = Worksheet::new(entry.name.as_str());
            Self::read_worksheet(xml, &mut worksheet, &shared_strings)?;

            let (head, tail_before_merges, tail_after_merges) = split_sheet_xml(xml)?;
            worksheet.set_source(Some(SheetSource {
                part_name: path.clone(),
                rel_id: entry.rel_id,
                sheet_id: entry.sheet_id,
                state: entry.state,
                head,
                tail_before_merges,
                tail_after_merges,
            }));

            log::debug!(
                "read sheet '{}' from {} ({} rows, {} merged regions)",
                worksheet.name(),
                path,
                worksheet.row_count(),
                worksheet.merged_regions().len()
            );
            workbook.add_existing_worksheet(worksheet)?;
            sheet_paths.push(path);
        }

        // Worksheets are regenerated on write
        for path in &sheet_paths {
            parts.remove(path);
        }
        parts.remove(CALC_CHAIN);
        *workbook.parts_mut() = parts;

        Ok(workbook)
    }

    /// Load every file of the archive
    fn read_parts<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> XlsxResult<RawParts> {
        let mut parts = RawParts::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.insert(name, data);
        }
        Ok(parts)
    }

    /// Read the shared strings table
    ///
    /// Rich text runs are concatenated; phonetic runs (`rPh`) are skipped.
    fn read_shared_strings(xml: &[u8]) -> XlsxResult<Vec<String>> {
        let mut xml_reader = Reader::from_reader(xml);

        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    current_string.push_str(&e.unescape()?);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get the sheet list
    fn read_workbook_xml(xml: &[u8]) -> XlsxResult<Vec<SheetEntry>> {
        let mut xml_reader = Reader::from_reader(xml);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"sheet" => {
                    let mut name = None;
                    let mut sheet_id = 0;
                    let mut rel_id = None;
                    let mut state = None;

                    for attr in e.attributes().flatten() {
                        let key = attr.key;
                        match key.local_name().as_ref() {
                            b"name" if key.prefix().is_none() => {
                                name = attr.unescape_value().ok().map(|s| s.to_string());
                            }
                            b"sheetId" => {
                                sheet_id = attr
                                    .unescape_value()
                                    .ok()
                                    .and_then(|s| s.parse().ok())
                                    .unwrap_or(0);
                            }
                            b"id" if key.prefix().is_some() => {
                                rel_id = attr.unescape_value().ok().map(|s| s.to_string());
                            }
                            b"state" => {
                                state = attr
                                    .unescape_value()
                                    .ok()
                                    .map(|s| s.to_string())
                                    .filter(|s| s != "visible");
                            }
                            _ => {}
                        }
                    }

                    match (name, rel_id) {
                        (Some(name), Some(rel_id)) => sheets.push(SheetEntry {
                            name,
                            sheet_id,
                            rel_id,
                            state,
                        }),
                        _ => {
                            return Err(XlsxError::Parse(
                                "sheet entry without name or r:id in workbook.xml".into(),
                            ))
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// Read rows, cells and merged regions of a worksheet
    fn read_worksheet(
        xml: &str,
        worksheet: &mut Worksheet,
        shared_strings: &[String],
    ) -> XlsxResult<()> {
        let mut xml_reader = Reader::from_str(xml);

        let mut buf = Vec::new();

        let mut current_row: u32 = 0;
        let mut next_row: u32 = 0;
        let mut next_col: u16 = 0;

        // Current cell state
        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_str = false;
        let mut in_inline_text = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"row" => {
                        current_row = Self::read_row_attrs(&e, next_row, worksheet)?;
                        next_row = current_row + 1;
                        next_col = 0;
                    }
                    b"c" => {
                        let pending = PendingCell::from_attrs(&e, current_row, next_col)?;
                        next_col = pending.addr.col.saturating_add(1);
                        cell = Some(pending);
                    }
                    b"v" if cell.is_some() => in_value = true,
                    b"f" if cell.is_some() => in_formula = true,
                    b"is" if cell.is_some() => in_inline_str = true,
                    b"rPh" if in_inline_str => in_phonetic = true,
                    b"t" if in_inline_str && !in_phonetic => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"row" => {
                        current_row = Self::read_row_attrs(&e, next_row, worksheet)?;
                        next_row = current_row + 1;
                        next_col = 0;
                    }
                    b"c" => {
                        let pending = PendingCell::from_attrs(&e, current_row, next_col)?;
                        next_col = pending.addr.col.saturating_add(1);
                        pending.finish(worksheet, shared_strings)?;
                    }
                    b"mergeCell" => {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"ref" {
                                let ref_str = attr.unescape_value()?;
                                let range = CellRange::parse(&ref_str).map_err(|e| {
                                    XlsxError::Parse(format!(
                                        "Invalid merge range '{}': {}",
                                        ref_str, e
                                    ))
                                })?;
                                if let Err(e) = worksheet.merge_cells(range) {
                                    log::warn!(
                                        "sheet '{}': ignoring merged region {}: {}",
                                        worksheet.name(),
                                        range,
                                        e
                                    );
                                }
                            }
                        }
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(pending) = cell.as_mut() {
                        if in_value || in_inline_text {
                            pending.value.push_str(&e.unescape()?);
                        } else if in_formula {
                            pending.formula.push_str(&e.unescape()?);
                        }
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            pending.finish(worksheet, shared_strings)?;
                        }
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"is" => in_inline_str = false,
                    b"rPh" => in_phonetic = false,
                    b"t" => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(())
    }

    /// Apply `<row>` attributes, returning the 0-based row index
    fn read_row_attrs(
        e: &BytesStart<'_>,
        default_row: u32,
        worksheet: &mut Worksheet,
    ) -> XlsxResult<u32> {
        let mut row_num: Option<u32> = None;
        let mut ht: Option<f64> = None;
        let mut custom_height = false;
        let mut hidden = false;
        let mut style: Option<u32> = None;
        let mut custom_format = false;
        let mut outline_level: u8 = 0;
        let mut collapsed = false;

        for attr in e.attributes().flatten() {
            let value = attr.unescape_value()?;
            let flag = value.as_ref() == "1" || value.as_ref() == "true";
            match attr.key.as_ref() {
                b"r" => row_num = value.parse::<u32>().ok(),
                b"ht" => ht = value.parse::<f64>().ok(),
                b"customHeight" => custom_height = flag,
                b"hidden" => hidden = flag,
                b"s" => style = value.parse::<u32>().ok(),
                b"customFormat" => custom_format = flag,
                b"outlineLevel" => outline_level = value.parse::<u8>().unwrap_or(0),
                b"collapsed" => collapsed = flag,
                _ => {}
            }
        }

        // 1-based to 0-based
        let index = row_num.map(|r| r.saturating_sub(1)).unwrap_or(default_row);
        let row = worksheet.ensure_row(index)?;
        row.height = ht;
        row.custom_height = custom_height;
        row.hidden = hidden;
        row.outline_level = outline_level;
        row.collapsed = collapsed;
        row.style_index = if custom_format { style } else { None };

        Ok(index)
    }
}

/// A `<c>` element being read
struct PendingCell {
    addr: CellAddress,
    cell_type: Option<String>,
    style: u32,
    value: String,
    formula: String,
}

impl PendingCell {
    fn from_attrs(e: &BytesStart<'_>, row: u32, default_col: u16) -> XlsxResult<Self> {
        let mut addr = CellAddress::new(row, default_col);
        let mut cell_type = None;
        let mut style = 0;

        for attr in e.attributes().flatten() {
            let value = attr.unescape_value()?;
            match attr.key.as_ref() {
                b"r" => {
                    addr = CellAddress::parse(&value).map_err(|e| {
                        XlsxError::Parse(format!("Invalid cell reference '{}': {}", value, e))
                    })?;
                }
                b"t" => cell_type = Some(value.to_string()),
                b"s" => style = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        Ok(Self {
            addr,
            cell_type,
            style,
            value: String::new(),
            formula: String::new(),
        })
    }

    fn finish(self, worksheet: &mut Worksheet, shared_strings: &[String]) -> XlsxResult<()> {
        let raw = if self.value.is_empty() {
            None
        } else {
            Some(self.value.as_str())
        };
        let value = Self::typed_value(self.cell_type.as_deref(), raw, shared_strings)?;

        let value = if self.formula.is_empty() {
            value
        } else {
            CellValue::Formula {
                text: self.formula.trim_start_matches('=').to_string(),
                cached: (!value.is_empty()).then(|| Box::new(value)),
            }
        };

        if value.is_empty() && self.style == 0 {
            return Ok(());
        }
        worksheet
            .ensure_row(self.addr.row)?
            .cells
            .insert(self.addr.col, CellData::with_style(value, self.style));
        Ok(())
    }

    fn typed_value(
        cell_type: Option<&str>,
        value: Option<&str>,
        shared_strings: &[String],
    ) -> XlsxResult<CellValue> {
        let Some(value) = value else {
            // `<is>` with empty text is still an (empty) string
            return Ok(match cell_type {
                Some("inlineStr") | Some("str") => CellValue::String(String::new()),
                _ => CellValue::Empty,
            });
        };

        Ok(match cell_type {
            // Shared string
            Some("s") => {
                let idx: usize = value.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                CellValue::String(s.clone())
            }

            Some("b") => CellValue::Boolean(value == "1" || value.eq_ignore_ascii_case("true")),

            Some("e") => CellValue::Error(value.to_string()),

            Some("inlineStr") | Some("str") => CellValue::String(decode_excel_escapes(value)),

            // ISO 8601 date
            Some("d") => CellValue::Date(value.to_string()),

            // Number (default type or explicit "n")
            None | Some("n") => match value.trim().parse::<f64>() {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::String(value.to_string()),
            },

            Some(other) => {
                log::debug!("unknown cell type '{}', reading as string", other);
                CellValue::String(value.to_string())
            }
        })
    }
}

/// Split worksheet XML around its cell data
///
/// Returns the XML before `<sheetData>` (without `<dimension>`), the XML between
/// `</sheetData>` and the merge cells position, and the rest.
pub(crate) fn split_sheet_xml(xml: &str) -> XlsxResult<(String, String, String)> {
    let (data_start, data_end) = find_element(xml, "sheetData")
        .ok_or_else(|| XlsxError::InvalidFormat("worksheet has no sheetData".into()))?;

    let mut head = xml[..data_start].to_string();
    if let Some((s, e)) = find_element(&head, "dimension") {
        head.replace_range(s..e, "");
    }

    let rest = &xml[data_end..];
    let (before, after) = match find_element(rest, "mergeCells") {
        Some((s, e)) => (&rest[..s], &rest[e..]),
        None => {
            let at = AFTER_MERGE_CELLS
                .iter()
                .filter_map(|name| find_start_tag(rest, name))
                .min()
                .or_else(|| rest.find("</worksheet>"))
                .unwrap_or(rest.len());
            (&rest[..at], &rest[at..])
        }
    };

    Ok((head, before.to_string(), after.to_string()))
}
