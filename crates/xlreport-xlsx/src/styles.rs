//! `styles.xml` handling
//!
//! Only the number format of each cell style (`cellXfs` entry) is modelled.
//! Fonts, fills, borders and the rest of a template's styles part are carried
//! through untouched; formats added in memory are appended as new `xf` entries.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use xlreport_core::NumberFormat;

use crate::error::{XlsxError, XlsxResult};
use crate::package::{escape_xml, find_element, find_start_tag, XML_DECL};

/// Read the number format of every `cellXfs` entry, by style index
pub(crate) fn read_number_formats(xml: &[u8]) -> XlsxResult<Vec<NumberFormat>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => xf_ids.push(num_fmt_id(&e)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"numFmt" => {
                    let mut id = None;
                    let mut code = None;
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"numFmtId" => {
                                id = attr.unescape_value().ok().and_then(|s| s.parse().ok())
                            }
                            b"formatCode" => {
                                code = attr.unescape_value().ok().map(|s| s.to_string())
                            }
                            _ => {}
                        }
                    }
                    if let (Some(id), Some(code)) = (id, code) {
                        custom.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => xf_ids.push(num_fmt_id(&e)),
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"cellXfs" {
                    in_cell_xfs = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let formats: Vec<NumberFormat> = xf_ids
        .into_iter()
        .map(|id| match custom.get(&id) {
            Some(code) => NumberFormat::Custom(code.clone()),
            None => NumberFormat::from_id(id),
        })
        .collect();

    if formats.is_empty() {
        Ok(vec![NumberFormat::General])
    } else {
        Ok(formats)
    }
}

fn num_fmt_id(e: &BytesStart<'_>) -> u32 {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"numFmtId")
        .and_then(|a| a.unescape_value().ok().and_then(|s| s.parse().ok()))
        .unwrap_or(0)
}

/// Assign `numFmtId`s to formats, allocating custom ids above `first_free`
fn assign_ids(formats: &[NumberFormat], first_free: u32) -> (Vec<u32>, Vec<(u32, String)>) {
    let mut next = first_free.max(NumberFormat::FIRST_CUSTOM_ID);
    let mut ids = Vec::with_capacity(formats.len());
    let mut customs: Vec<(u32, String)> = Vec::new();

    for format in formats {
        let id = match format.builtin_id() {
            Some(id) => id,
            None => {
                let code = format.format_string();
                match customs.iter().find(|(_, c)| c == code) {
                    Some((id, _)) => *id,
                    None => {
                        let id = next;
                        next += 1;
                        customs.push((id, code.to_string()));
                        id
                    }
                }
            }
        };
        ids.push(id);
    }
    (ids, customs)
}

fn xf_element(num_fmt_id: u32) -> String {
    if num_fmt_id == 0 {
        r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#.to_string()
    } else {
        format!(
            r#"<xf numFmtId="{}" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#,
            num_fmt_id
        )
    }
}

fn num_fmt_element(id: u32, code: &str) -> String {
    format!(
        r#"<numFmt numFmtId="{}" formatCode="{}"/>"#,
        id,
        escape_xml(code)
    )
}

/// Generate a minimal `styles.xml` for a workbook built in memory
pub(crate) fn generate_styles_xml(formats: &[NumberFormat]) -> String {
    let (ids, customs) = assign_ids(formats, NumberFormat::FIRST_CUSTOM_ID);

    let mut xml = format!(
        "{}\n<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
        XML_DECL
    );
    if !customs.is_empty() {
        xml.push_str(&format!("<numFmts count=\"{}\">", customs.len()));
        for (id, code) in &customs {
            xml.push_str(&num_fmt_element(*id, code));
        }
        xml.push_str("</numFmts>");
    }
    xml.push_str(concat!(
        r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
        r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
        r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
        r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    ));
    xml.push_str(&format!("<cellXfs count=\"{}\">", ids.len()));
    for id in &ids {
        xml.push_str(&xf_element(*id));
    }
    xml.push_str("</cellXfs>");
    xml.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
    xml.push_str("</styleSheet>");
    xml
}

/// Append `xf` entries for formats past the end of an existing `cellXfs` table
///
/// Returns `None` when the styles part already covers every format.
pub(crate) fn append_cell_formats(
    styles_xml: &str,
    formats: &[NumberFormat],
) -> XlsxResult<Option<String>> {
    let (xfs_start, xfs_end) = find_element(styles_xml, "cellXfs")
        .ok_or_else(|| XlsxError::InvalidFormat("styles.xml has no cellXfs".into()))?;
    let existing_count = count_xf(&styles_xml[xfs_start..xfs_end]);
    if formats.len() <= existing_count {
        return Ok(None);
    }
    log::debug!(
        "appending {} cell format(s) to styles.xml",
        formats.len() - existing_count
    );

    let known_custom = read_custom_ids(styles_xml.as_bytes())?;
    let first_free = known_custom
        .iter()
        .map(|(id, _)| id + 1)
        .max()
        .unwrap_or(NumberFormat::FIRST_CUSTOM_ID);

    // Reuse custom ids the template already defines for the same code
    let added = &formats[existing_count..];
    let mut new_customs: Vec<(u32, String)> = Vec::new();
    let mut next = first_free;
    let mut xf_entries = String::new();
    for format in added {
        let id = match format.builtin_id() {
            Some(id) => id,
            None => {
                let code = format.format_string();
                if let Some((id, _)) = known_custom
                    .iter()
                    .chain(new_customs.iter())
                    .find(|(_, c)| c == code)
                {
                    *id
                } else {
                    let id = next;
                    next += 1;
                    new_customs.push((id, code.to_string()));
                    id
                }
            }
        };
        xf_entries.push_str(&xf_element(id));
    }

    // cellXfs comes after numFmts, so patch it first to keep offsets valid
    let xfs = &styles_xml[xfs_start..xfs_end];
    let new_xfs = if xfs.ends_with("/>") && !xfs.contains("</cellXfs>") {
        format!("<cellXfs count=\"{}\">{}</cellXfs>", formats.len(), xf_entries)
    } else {
        let body_start = xfs.find('>').map(|i| i + 1).unwrap_or(xfs.len());
        let body_end = xfs.len() - "</cellXfs>".len();
        format!(
            "<cellXfs count=\"{}\">{}{}</cellXfs>",
            formats.len(),
            &xfs[body_start..body_end],
            xf_entries
        )
    };
    let mut out = format!(
        "{}{}{}",
        &styles_xml[..xfs_start],
        new_xfs,
        &styles_xml[xfs_end..]
    );

    if !new_customs.is_empty() {
        let entries: String = new_customs
            .iter()
            .map(|(id, code)| num_fmt_element(*id, code))
            .collect();
        let total = known_custom.len() + new_customs.len();
        out = match find_element(&out, "numFmts") {
            Some((s, e)) => {
                let block = &out[s..e];
                let body = match (block.find('>'), block.rfind("</numFmts>")) {
                    (Some(open), Some(close)) if !block[..open].ends_with('/') => {
                        &block[open + 1..close]
                    }
                    _ => "",
                };
                format!(
                    "{}<numFmts count=\"{}\">{}{}</numFmts>{}",
                    &out[..s],
                    total,
                    body,
                    entries,
                    &out[e..]
                )
            }
            None => {
                // numFmts is the first child of styleSheet
                let anchor = find_start_tag(&out, "styleSheet")
                    .and_then(|s| out[s..].find('>').map(|gt| s + gt + 1))
                    .ok_or_else(|| XlsxError::InvalidFormat("styles.xml has no styleSheet".into()))?;
                format!(
                    "{}<numFmts count=\"{}\">{}</numFmts>{}",
                    &out[..anchor],
                    new_customs.len(),
                    entries,
                    &out[anchor..]
                )
            }
        };
    }

    Ok(Some(out))
}

fn count_xf(cell_xfs: &str) -> usize {
    let mut count = 0;
    let mut rest = cell_xfs;
    while let Some(pos) = find_start_tag(rest, "xf") {
        count += 1;
        rest = &rest[pos + 3..];
    }
    count
}

fn read_custom_ids(xml: &[u8]) -> XlsxResult<Vec<(u32, String)>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"numFmt" => {
                let code = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"formatCode")
                    .and_then(|a| a.unescape_value().ok().map(|s| s.to_string()));
                if let Some(code) = code {
                    out.push((num_fmt_id(&e), code));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEMPLATE_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="dd.mm.yyyy"/></numFmts><fonts count="1"><font/></fonts><cellXfs count="4"><xf numFmtId="0" fontId="0"/><xf numFmtId="2" fontId="0" applyNumberFormat="1"/><xf numFmtId="49" fontId="0"/><xf numFmtId="164" fontId="0"><alignment horizontal="center"/></xf></cellXfs></styleSheet>"#;

    #[test]
    fn test_read_number_formats() {
        let formats = read_number_formats(TEMPLATE_STYLES.as_bytes()).unwrap();
        assert_eq!(
            formats,
            vec![
                NumberFormat::General,
                NumberFormat::BuiltIn(2),
                NumberFormat::BuiltIn(49),
                NumberFormat::Custom("dd.mm.yyyy".into()),
            ]
        );
        assert!(formats[3].is_date_format());
    }

    #[test]
    fn test_generated_styles_roundtrip() {
        let formats = vec![
            NumberFormat::General,
            NumberFormat::BuiltIn(49),
            NumberFormat::Custom("0.000".into()),
        ];
        let xml = generate_styles_xml(&formats);
        assert_eq!(read_number_formats(xml.as_bytes()).unwrap(), formats);
    }

    #[test]
    fn test_append_cell_formats() {
        let mut formats = read_number_formats(TEMPLATE_STYLES.as_bytes()).unwrap();
        assert_eq!(append_cell_formats(TEMPLATE_STYLES, &formats).unwrap(), None);

        formats.push(NumberFormat::Custom("dd.mm.yyyy".into()));
        formats.push(NumberFormat::Custom("0.0000".into()));
        formats.push(NumberFormat::BuiltIn(4));
        let patched = append_cell_formats(TEMPLATE_STYLES, &formats)
            .unwrap()
            .unwrap();

        assert_eq!(read_number_formats(patched.as_bytes()).unwrap(), formats);
        assert!(patched.contains(r#"<numFmts count="2">"#));
        assert!(patched.contains(r#"<numFmt numFmtId="165" formatCode="0.0000"/>"#));
        assert!(patched.contains(r#"<alignment horizontal="center"/>"#));
    }
}
