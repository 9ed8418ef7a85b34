//! Package plumbing shared by the reader and writer: relationships, content
//! types, part paths and XML escaping.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

pub(crate) const CONTENT_TYPES: &str = "[Content_Types].xml";
pub(crate) const ROOT_RELS: &str = "_rels/.rels";
pub(crate) const WORKBOOK: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const STYLES: &str = "xl/styles.xml";
pub(crate) const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
pub(crate) const CALC_CHAIN: &str = "xl/calcChain.xml";

pub(crate) const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub(crate) const NS_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

pub(crate) const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub(crate) const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
pub(crate) const CT_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
pub(crate) const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";

pub(crate) const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// One `<Relationship>` of a `.rels` part
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_worksheet(&self) -> bool {
        self.rel_type.ends_with("/worksheet")
    }

    pub fn is_calc_chain(&self) -> bool {
        self.rel_type.ends_with("/calcChain")
    }
}

/// Parse a `.rels` part
pub(crate) fn read_relationships(xml: &[u8]) -> XlsxResult<Vec<Relationship>> {
    let mut xml_reader = Reader::from_reader(xml);
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    target_mode: None,
                };
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.target_mode = Some(value),
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

pub(crate) fn write_relationships(rels: &[Relationship]) -> String {
    let mut xml = format!(
        "{}\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        XML_DECL
    );
    for rel in rels {
        xml.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
            escape_xml(&rel.id),
            escape_xml(&rel.rel_type),
            escape_xml(&rel.target)
        ));
        if let Some(mode) = &rel.target_mode {
            xml.push_str(&format!(" TargetMode=\"{}\"", escape_xml(mode)));
        }
        xml.push_str("/>");
    }
    xml.push_str("</Relationships>");
    xml
}

/// Resolve a relationship target against the directory of its source part
///
/// `resolve_target("xl", "worksheets/sheet1.xml")` is `xl/worksheets/sheet1.xml`;
/// absolute targets (`/xl/...`) are taken from the package root.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Parsed `[Content_Types].xml`
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ContentTypes {
    /// `(extension, content type)`
    pub defaults: Vec<(String, String)>,
    /// `(part name with leading '/', content type)`
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &[u8]) -> XlsxResult<Self> {
        let mut xml_reader = Reader::from_reader(xml);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut types = ContentTypes::default();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                    let mut key = String::new();
                    let mut content_type = String::new();
                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => key = value,
                            b"ContentType" => content_type = value,
                            _ => {}
                        }
                    }
                    match e.name().as_ref() {
                        b"Default" => types.defaults.push((key, content_type)),
                        b"Override" => types.overrides.push((key, content_type)),
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(types)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            "{}\n<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
            XML_DECL
        );
        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape_xml(ext),
                escape_xml(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                "<Override PartName=\"{}\" ContentType=\"{}\"/>",
                escape_xml(part),
                escape_xml(ct)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}

/// Escape text for element content and attribute values
pub(crate) fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // XML 1.0 cannot carry other control characters; Excel writes them as _xHHHH_
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {
                out.push_str(&format!("_x{:04X}_", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Position of the start tag `<name` (followed by whitespace, `/` or `>`)
pub(crate) fn find_start_tag(xml: &str, name: &str) -> Option<usize> {
    let open = format!("<{}", name);
    let mut offset = 0;
    while let Some(pos) = xml[offset..].find(&open) {
        let at = offset + pos;
        match xml[at + open.len()..].chars().next() {
            Some(c) if c.is_ascii_whitespace() || c == '/' || c == '>' => return Some(at),
            Some(_) => offset = at + open.len(),
            None => return None,
        }
    }
    None
}

/// Byte range of the element `<name ...>...</name>` or `<name .../>`
pub(crate) fn find_element(xml: &str, name: &str) -> Option<(usize, usize)> {
    let start = find_start_tag(xml, name)?;
    let gt = start + xml[start..].find('>')?;
    if xml[..gt].ends_with('/') {
        return Some((start, gt + 1));
    }
    let close = format!("</{}>", name);
    let end = gt + xml[gt..].find(&close)? + close.len();
    Some((start, end))
}
