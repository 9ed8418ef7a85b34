//! Raw package content kept alongside the grid
//!
//! Rendering only rewrites cell data and merged regions; everything else in a
//! template package (themes, drawings, print settings, column widths...) is carried
//! through byte for byte. These types hold that content between read and write.

use std::collections::BTreeMap;

/// Package parts by their path inside the archive (e.g. `xl/styles.xml`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParts {
    parts: BTreeMap<String, Vec<u8>>,
}

impl RawParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, data: Vec<u8>) {
        self.parts.insert(name.into(), data);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name)
    }

    /// Iterate over `(name, bytes)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Where a worksheet came from and the XML surrounding its cell data
///
/// `head` runs up to (not including) `<sheetData>`, with any `<dimension>` removed.
/// `tail_before_merges` is what follows `</sheetData>` up to where `<mergeCells>`
/// belongs, and `tail_after_merges` is the rest of the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetSource {
    /// Part path, e.g. `xl/worksheets/sheet1.xml`
    pub part_name: String,
    /// Relationship id in `workbook.xml.rels`
    pub rel_id: String,
    /// `sheetId` attribute in `workbook.xml`
    pub sheet_id: u32,
    /// `state` attribute in `workbook.xml` (`hidden`, `veryHidden`)
    pub state: Option<String>,
    pub head: String,
    pub tail_before_merges: String,
    pub tail_after_merges: String,
}

impl SheetSource {
    /// Whether the sheet has a part in the package it was read from
    pub fn is_stored(&self) -> bool {
        !self.part_name.is_empty()
    }

    /// Source for a copy of this sheet that is not stored in the package yet
    ///
    /// Elements that point at sheet-level relationships are dropped from the copy,
    /// since the copy gets no relationship part of its own.
    pub fn for_copy(&self) -> Self {
        Self {
            part_name: String::new(),
            rel_id: String::new(),
            sheet_id: 0,
            state: self.state.clone(),
            head: strip_relationship_elements(&self.head).replace(" tabSelected=\"1\"", ""),
            tail_before_merges: strip_relationship_elements(&self.tail_before_merges),
            tail_after_merges: strip_relationship_elements(&self.tail_after_merges),
        }
    }
}

const REL_ELEMENTS: &[&str] = &[
    "hyperlinks",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "tableParts",
];

fn strip_relationship_elements(xml: &str) -> String {
    let mut out = xml.to_string();
    for name in REL_ELEMENTS {
        out = strip_element(&out, name);
    }
    out
}

/// Remove every `<name .../>` or `<name ...>...</name>` occurrence
fn strip_element(xml: &str, name: &str) -> String {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(pos) = find_tag(rest, &open) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos..];
        let Some(gt) = after.find('>') else {
            rest = "";
            break;
        };
        if after[..gt].ends_with('/') {
            rest = &after[gt + 1..];
        } else if let Some(end) = after.find(&close) {
            rest = &after[end + close.len()..];
        } else {
            rest = &after[gt + 1..];
        }
    }
    out.push_str(rest);
    out
}

/// Position of `<name` followed by a delimiter, so `<drawing` does not match `<drawingX`
fn find_tag(xml: &str, open: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = xml[offset..].find(open) {
        let at = offset + pos;
        match xml[at + open.len()..].chars().next() {
            Some(c) if c == ' ' || c == '/' || c == '>' || c == '\t' || c == '\n' || c == '\r' => {
                return Some(at)
            }
            None => return None,
            _ => offset = at + open.len(),
        }
    }
    None
}
