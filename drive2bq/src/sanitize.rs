//! Turning CSV header labels into column names BigQuery will accept.

use deunicode::deunicode;
use std::collections::HashMap;

use crate::common::*;

/// The longest column name we'll produce, in characters.
pub const MAX_COLUMN_NAME_LEN: usize = 300;

/// Sanitize a single column name.
///
/// We transliterate to ASCII, replace spaces, slashes and hyphens with
/// underscores, drop parentheses, replace `$` with `S`, lowercase, and
/// truncate. Applying this twice gives the same result as applying it once.
pub fn sanitize_column_name(name: &str) -> String {
    let ascii = deunicode(name);
    let mut out = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        match c {
            ' ' | '/' | '-' => out.push('_'),
            '(' | ')' => {}
            '$' => out.push('S'),
            c => out.push(c),
        }
    }
    out.make_ascii_lowercase();
    out.chars().take(MAX_COLUMN_NAME_LEN).collect()
}

/// Sanitize all the column names in `buffer`, in place.
///
/// We don't try to resolve collisions, but we do warn about them, because
/// BigQuery will refuse to load the table.
pub fn sanitize_buffer(buffer: &mut RowBuffer) {
    let mut seen = HashMap::<String, String>::new();
    buffer.rename_columns(|name| {
        let sanitized = sanitize_column_name(name);
        if let Some(previous) = seen.get(&sanitized) {
            warn!(
                "columns {:?} and {:?} both sanitize to {:?}",
                previous, name, sanitized,
            );
        } else {
            seen.insert(sanitized.clone(), name.to_owned());
        }
        sanitized
    });
}
