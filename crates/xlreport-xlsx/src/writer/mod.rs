//! XLSX writer

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::error::{XlsxError, XlsxResult};
use crate::package::{
    escape_xml, find_element, read_relationships, write_relationships, ContentTypes,
    Relationship, CALC_CHAIN, CONTENT_TYPES, CT_RELS, CT_STYLES, CT_WORKBOOK, CT_WORKSHEET,
    NS_MAIN, NS_REL, REL_OFFICE_DOCUMENT, REL_STYLES, REL_WORKSHEET, ROOT_RELS, STYLES, WORKBOOK,
    WORKBOOK_RELS, XML_DECL,
};
use crate::styles::{append_cell_formats, generate_styles_xml};
use xlreport_core::{CellAddress, CellData, CellValue, RawParts, Row, Workbook, Worksheet};

/// Where a worksheet is stored in the written package
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    part_name: String,
    rel_id: String,
    sheet_id: u32,
}

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a workbook to a file path
    pub fn write_file<P: AsRef<Path>>(workbook: &Workbook, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write(workbook, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write a workbook to a writer
    ///
    /// Worksheets are regenerated from the grid. Raw parts read with the
    /// workbook are copied back, with the sheet list, workbook relationships,
    /// content types and (if formats were added) `styles.xml` patched to match.
    /// A workbook without raw parts gets a minimal generated package.
    pub fn write<W: Write + Seek>(workbook: &Workbook, writer: W) -> XlsxResult<()> {
        let mut parts = if workbook.parts().is_empty() {
            Self::base_package(workbook)
        } else {
            workbook.parts().clone()
        };

        let placements = Self::place_sheets(workbook, &parts)?;
        Self::patch_workbook_xml(&mut parts, workbook, &placements)?;
        Self::patch_workbook_rels(&mut parts, &placements)?;
        Self::patch_content_types(&mut parts, &placements)?;
        Self::patch_styles(&mut parts, workbook)?;

        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default();

        if let Some(data) = parts.get(CONTENT_TYPES) {
            zip.start_file(CONTENT_TYPES, options)?;
            zip.write_all(data)?;
        }
        for (name, data) in parts.iter().filter(|(name, _)| *name != CONTENT_TYPES) {
            zip.start_file(name, options)?;
            zip.write_all(data)?;
        }

        for (sheet, placement) in workbook.worksheets().zip(&placements) {
            zip.start_file(placement.part_name.as_str(), options)?;
            zip.write_all(Self::worksheet_xml(sheet).as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Package skeleton for a workbook built in memory
    fn base_package(workbook: &Workbook) -> RawParts {
        let mut parts = RawParts::new();

        let content_types = ContentTypes {
            defaults: vec![
                ("rels".into(), CT_RELS.into()),
                ("xml".into(), "application/xml".into()),
            ],
            overrides: vec![
                (format!("/{}", WORKBOOK), CT_WORKBOOK.into()),
                (format!("/{}", STYLES), CT_STYLES.into()),
            ],
        };
        parts.insert(CONTENT_TYPES, content_types.to_xml().into_bytes());

        let root_rels = [Relationship {
            id: "rId1".into(),
            rel_type: REL_OFFICE_DOCUMENT.into(),
            target: WORKBOOK.into(),
            target_mode: None,
        }];
        parts.insert(ROOT_RELS, write_relationships(&root_rels).into_bytes());

        parts.insert(
            WORKBOOK,
            format!(
                "{}\n<workbook xmlns=\"{}\" xmlns:r=\"{}\"><sheets/></workbook>",
                XML_DECL, NS_MAIN, NS_REL
            )
            .into_bytes(),
        );

        let workbook_rels = [Relationship {
            id: "rId1".into(),
            rel_type: REL_STYLES.into(),
            target: "styles.xml".into(),
            target_mode: None,
        }];
        parts.insert(WORKBOOK_RELS, write_relationships(&workbook_rels).into_bytes());

        parts.insert(STYLES, generate_styles_xml(workbook.formats()).into_bytes());
        parts
    }

    /// Decide the part, relationship id and sheet id of every worksheet
    ///
    /// Sheets read from the package keep theirs; copies and new sheets get
    /// fresh ones that collide with nothing in the package.
    fn place_sheets(workbook: &Workbook, parts: &RawParts) -> XlsxResult<Vec<Placement>> {
        let rels = read_relationships(required(parts, WORKBOOK_RELS)?)?;

        let mut used_rel_ids: HashSet<String> = rels
            .iter()
            .filter(|r| !r.is_worksheet())
            .map(|r| r.id.clone())
            .collect();
        let mut used_parts: HashSet<String> = parts.iter().map(|(n, _)| n.to_string()).collect();
        let mut used_sheet_ids: HashSet<u32> = HashSet::new();

        let mut placements: Vec<Option<Placement>> = Vec::with_capacity(workbook.sheet_count());
        for sheet in workbook.worksheets() {
            let kept = sheet.source().filter(|s| s.is_stored()).and_then(|s| {
                let free = !used_parts.contains(&s.part_name)
                    && !used_rel_ids.contains(&s.rel_id)
                    && !used_sheet_ids.contains(&s.sheet_id);
                free.then(|| Placement {
                    part_name: s.part_name.clone(),
                    rel_id: s.rel_id.clone(),
                    sheet_id: s.sheet_id,
                })
            });
            if let Some(p) = &kept {
                used_parts.insert(p.part_name.clone());
                used_rel_ids.insert(p.rel_id.clone());
                used_sheet_ids.insert(p.sheet_id);
            }
            placements.push(kept);
        }

        let mut next_sheet_id = used_sheet_ids.iter().copied().max().unwrap_or(0) + 1;
        let mut result = Vec::with_capacity(placements.len());
        for (placement, sheet) in placements.into_iter().zip(workbook.worksheets()) {
            let placement = match placement {
                Some(p) => p,
                None => {
                    let part_name = (1..)
                        .map(|n| format!("xl/worksheets/sheet{}.xml", n))
                        .find(|name| {
                            !used_parts.contains(name)
                                && !used_parts.contains(&sheet_rels_path(name))
                        })
                        .unwrap_or_default();
                    let rel_id = (1..)
                        .map(|n| format!("rId{}", n))
                        .find(|id| !used_rel_ids.contains(id))
                        .unwrap_or_default();
                    used_parts.insert(part_name.clone());
                    used_rel_ids.insert(rel_id.clone());

                    let sheet_id = next_sheet_id;
                    next_sheet_id += 1;
                    log::debug!(
                        "placing new sheet '{}' at {} ({})",
                        sheet.name(),
                        part_name,
                        rel_id
                    );
                    Placement {
                        part_name,
                        rel_id,
                        sheet_id,
                    }
                }
            };
            result.push(placement);
        }
        Ok(result)
    }

    /// Rewrite the `<sheets>` element of workbook.xml
    fn patch_workbook_xml(
        parts: &mut RawParts,
        workbook: &Workbook,
        placements: &[Placement],
    ) -> XlsxResult<()> {
        let xml = required_str(parts, WORKBOOK)?;
        let (start, end) = find_element(xml, "sheets")
            .ok_or_else(|| XlsxError::InvalidFormat("workbook.xml has no sheets".into()))?;

        let declared = xml.contains(&format!("xmlns:r=\"{}\"", NS_REL));
        let mut sheets = if declared {
            String::from("<sheets>")
        } else {
            format!("<sheets xmlns:r=\"{}\">", NS_REL)
        };
        for (sheet, placement) in workbook.worksheets().zip(placements) {
            sheets.push_str(&format!(
                "<sheet name=\"{}\" sheetId=\"{}\"",
                escape_xml(sheet.name()),
                placement.sheet_id
            ));
            if let Some(state) = sheet.source().and_then(|s| s.state.as_deref()) {
                sheets.push_str(&format!(" state=\"{}\"", escape_xml(state)));
            }
            sheets.push_str(&format!(" r:id=\"{}\"/>", escape_xml(&placement.rel_id)));
        }
        sheets.push_str("</sheets>");

        let patched = format!("{}{}{}", &xml[..start], sheets, &xml[end..]);
        parts.insert(WORKBOOK, patched.into_bytes());
        Ok(())
    }

    /// Replace worksheet relationships and drop the calculation chain
    fn patch_workbook_rels(parts: &mut RawParts, placements: &[Placement]) -> XlsxResult<()> {
        let rels = read_relationships(required(parts, WORKBOOK_RELS)?)?;

        let mut patched: Vec<Relationship> = placements
            .iter()
            .map(|p| Relationship {
                id: p.rel_id.clone(),
                rel_type: REL_WORKSHEET.into(),
                target: relative_to_xl(&p.part_name),
                target_mode: None,
            })
            .collect();
        patched.extend(
            rels.into_iter()
                .filter(|r| !r.is_worksheet() && !r.is_calc_chain()),
        );

        parts.insert(WORKBOOK_RELS, write_relationships(&patched).into_bytes());
        Ok(())
    }

    fn patch_content_types(parts: &mut RawParts, placements: &[Placement]) -> XlsxResult<()> {
        let mut types = ContentTypes::parse(required(parts, CONTENT_TYPES)?)?;
        let calc_chain = format!("/{}", CALC_CHAIN);

        types
            .overrides
            .retain(|(part, ct)| ct != CT_WORKSHEET && *part != calc_chain);
        for p in placements {
            types
                .overrides
                .push((format!("/{}", p.part_name), CT_WORKSHEET.into()));
        }

        parts.insert(CONTENT_TYPES, types.to_xml().into_bytes());
        Ok(())
    }

    /// Append cell formats added since the workbook was read
    fn patch_styles(parts: &mut RawParts, workbook: &Workbook) -> XlsxResult<()> {
        let Some(xml) = parts.get(STYLES) else {
            if workbook.formats().len() > 1 {
                log::warn!("package has no styles.xml; cell number formats are not written");
            }
            return Ok(());
        };
        let xml = std::str::from_utf8(xml)
            .map_err(|e| XlsxError::Parse(format!("styles.xml is not UTF-8: {}", e)))?;

        if let Some(patched) = append_cell_formats(xml, workbook.formats())? {
            parts.insert(STYLES, patched.into_bytes());
        }
        Ok(())
    }

    fn worksheet_xml(sheet: &Worksheet) -> String {
        let default_head = format!(
            "{}\n<worksheet xmlns=\"{}\" xmlns:r=\"{}\">",
            XML_DECL, NS_MAIN, NS_REL
        );
        let (head, before, after) = match sheet.source() {
            Some(src) => (
                src.head.as_str(),
                src.tail_before_merges.as_str(),
                src.tail_after_merges.as_str(),
            ),
            None => (default_head.as_str(), "", "</worksheet>"),
        };

        let mut content = String::with_capacity(head.len() + after.len() + 64 * sheet.row_count() as usize);
        content.push_str(head);

        content.push_str("<sheetData>");
        for (index, row) in sheet.rows() {
            if row.is_blank() {
                continue;
            }
            Self::write_row(&mut content, index, row);
        }
        content.push_str("</sheetData>");

        content.push_str(before);

        // Write merged cells (if any)
        let merged_regions = sheet.merged_regions();
        if !merged_regions.is_empty() {
            content.push_str(&format!("<mergeCells count=\"{}\">", merged_regions.len()));
            for range in merged_regions {
                content.push_str(&format!("<mergeCell ref=\"{}\"/>", range));
            }
            content.push_str("</mergeCells>");
        }

        content.push_str(after);
        content
    }

    fn write_row(content: &mut String, index: u32, row: &Row) {
        content.push_str(&format!("<row r=\"{}\"", index + 1));
        if let Some(style) = row.style_index {
            content.push_str(&format!(" s=\"{}\" customFormat=\"1\"", style));
        }
        if let Some(height) = row.height {
            content.push_str(&format!(" ht=\"{}\"", height));
            if row.custom_height {
                content.push_str(" customHeight=\"1\"");
            }
        }
        if row.hidden {
            content.push_str(" hidden=\"1\"");
        }
        if row.outline_level > 0 {
            content.push_str(&format!(" outlineLevel=\"{}\"", row.outline_level));
        }
        if row.collapsed {
            content.push_str(" collapsed=\"1\"");
        }
        content.push('>');

        for (col, cell) in row.iter() {
            Self::write_cell(content, CellAddress::new(index, col), cell);
        }
        content.push_str("</row>");
    }

    fn write_cell(content: &mut String, addr: CellAddress, cell: &CellData) {
        let style_attr = if cell.style_index != 0 {
            format!(" s=\"{}\"", cell.style_index)
        } else {
            String::new()
        };

        match &cell.value {
            CellValue::Empty => {
                // Preserve style-only cells
                if cell.style_index != 0 {
                    content.push_str(&format!("<c r=\"{}\"{}/>", addr, style_attr));
                }
            }
            CellValue::Number(n) if !n.is_finite() => {
                content.push_str(&format!(
                    "<c r=\"{}\"{} t=\"e\"><v>#NUM!</v></c>",
                    addr, style_attr
                ));
            }
            CellValue::Number(n) => {
                content.push_str(&format!("<c r=\"{}\"{}><v>{}</v></c>", addr, style_attr, n));
            }
            CellValue::String(s) => {
                content.push_str(&format!(
                    "<c r=\"{}\"{} t=\"inlineStr\"><is>{}</is></c>",
                    addr,
                    style_attr,
                    text_element(s)
                ));
            }
            CellValue::Boolean(b) => {
                content.push_str(&format!(
                    "<c r=\"{}\"{} t=\"b\"><v>{}</v></c>",
                    addr,
                    style_attr,
                    if *b { 1 } else { 0 }
                ));
            }
            CellValue::Date(d) => {
                content.push_str(&format!(
                    "<c r=\"{}\"{} t=\"d\"><v>{}</v></c>",
                    addr,
                    style_attr,
                    escape_xml(d)
                ));
            }
            CellValue::Error(e) => {
                content.push_str(&format!(
                    "<c r=\"{}\"{} t=\"e\"><v>{}</v></c>",
                    addr,
                    style_attr,
                    escape_xml(e)
                ));
            }
            CellValue::Formula { text, cached } => {
                let (type_attr, value) = match cached.as_deref() {
                    Some(CellValue::Number(n)) if n.is_finite() => ("", n.to_string()),
                    Some(CellValue::String(s)) => (" t=\"str\"", escape_text(s)),
                    Some(CellValue::Boolean(b)) => (" t=\"b\"", if *b { "1" } else { "0" }.into()),
                    Some(CellValue::Error(e)) => (" t=\"e\"", escape_xml(e)),
                    _ => ("", String::new()),
                };
                content.push_str(&format!(
                    "<c r=\"{}\"{}{}><f>{}</f>",
                    addr,
                    style_attr,
                    type_attr,
                    escape_xml(text.trim_start_matches('='))
                ));
                if !value.is_empty() {
                    content.push_str(&format!("<v>{}</v>", value));
                }
                content.push_str("</c>");
            }
        }
    }
}

fn required<'a>(parts: &'a RawParts, name: &str) -> XlsxResult<&'a [u8]> {
    parts
        .get(name)
        .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
}

fn required_str<'a>(parts: &'a RawParts, name: &str) -> XlsxResult<&'a str> {
    std::str::from_utf8(required(parts, name)?)
        .map_err(|e| XlsxError::Parse(format!("{} is not UTF-8: {}", name, e)))
}

/// Target of a worksheet relationship from `xl/_rels/workbook.xml.rels`
fn relative_to_xl(part_name: &str) -> String {
    match part_name.strip_prefix("xl/") {
        Some(rest) => rest.to_string(),
        None => format!("/{}", part_name),
    }
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn sheet_rels_path(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Escape cell text, protecting literal `_xHHHH_` sequences from decoding
fn escape_text(s: &str) -> String {
    if !s.contains("_x") {
        return escape_xml(s);
    }

    let mut protected = String::with_capacity(s.len() + 8);
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        protected.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let looks_escaped = candidate
            .get(2..6)
            .map_or(false, |hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
            && candidate.as_bytes().get(6) == Some(&b'_');
        if looks_escaped {
            // the underscore itself becomes _x005F_
            protected.push_str("_x005F_");
            rest = &candidate[1..];
        } else {
            protected.push_str("_x");
            rest = &candidate[2..];
        }
    }
    protected.push_str(rest);
    escape_xml(&protected)
}

/// `<t>` element for inline string text
fn text_element(s: &str) -> String {
    let needs_preserve = s.starts_with(char::is_whitespace)
        || s.ends_with(char::is_whitespace)
        || s.contains('\n');
    if needs_preserve {
        format!("<t xml:space=\"preserve\">{}</t>", escape_text(s))
    } else {
        format!("<t>{}</t>", escape_text(s))
    }
}
