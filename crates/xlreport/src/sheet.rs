//! Per-segment sheet copies
//!
//! A report with one sheet per data segment keeps a single template sheet
//! whose tags reference e.g. `.D.Dyn0`. Each extra segment gets a copy of that
//! sheet with the variable renamed (`.D.Dyn1`, `.D.Dyn2`, ...).

use xlreport_core::{Workbook, Worksheet};

use crate::error::RenderResult;
use crate::scanner::is_candidate;

/// Append a copy of sheet `index` named `name`, renaming `.{from}` to `.{to}`
/// in the copy's tag cells
///
/// Returns the index of the new sheet.
pub fn clone_sheet(
    workbook: &mut Workbook,
    index: usize,
    name: &str,
    var_from: &str,
    var_to: &str,
) -> RenderResult<usize> {
    let copy = workbook.clone_worksheet(index, name)?;
    let renamed = rename_variable(workbook.sheet_mut(copy)?, var_from, var_to);
    log::debug!(
        "cloned sheet {} as '{}': {} tag cells renamed .{} -> .{}",
        index,
        name,
        renamed,
        var_from,
        var_to
    );
    Ok(copy)
}

/// Rename the field `.{from}` to `.{to}` in every tag cell of a sheet
///
/// Only whole field names are replaced: renaming `Dyn1` leaves `.Dyn10`
/// alone. Returns the number of cells changed.
pub fn rename_variable(worksheet: &mut Worksheet, from: &str, to: &str) -> usize {
    if from.is_empty() {
        return 0;
    }
    let from = format!(".{}", from);
    let to = format!(".{}", to);

    let mut changed = 0;
    for row in 0..worksheet.row_count() {
        let Some(cells) = worksheet.row_mut(row) else {
            continue;
        };
        for cell in cells.cells.values_mut() {
            let Some(text) = cell.text().filter(|t| is_candidate(t)) else {
                continue;
            };
            if let Some(renamed) = replace_field(text, &from, &to) {
                cell.value = renamed.into();
                changed += 1;
            }
        }
    }
    changed
}

fn replace_field(text: &str, from: &str, to: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut replaced = false;

    while let Some(at) = rest.find(from) {
        let end = at + from.len();
        let boundary = !rest[end..]
            .chars()
            .next()
            .map_or(false, |c| c.is_alphanumeric() || c == '_');
        out.push_str(&rest[..at]);
        if boundary {
            out.push_str(to);
            replaced = true;
        } else {
            out.push_str(from);
        }
        rest = &rest[end..];
    }

    if !replaced {
        return None;
    }
    out.push_str(rest);
    Some(out)
}
