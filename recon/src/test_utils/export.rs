/// Renders an export stream as the bulk service delivers it.
///
/// Every field is quoted, lines end with `\n`, and the stream ends with the empty-id artifact row
/// some exports emit.
pub fn export_text(header: &[&str], rows: &[&[&str]]) -> String {
    let mut text = quoted_line(header);
    for row in rows {
        text.push_str(&quoted_line(row));
    }
    text.push_str("\"\",\"\",\n");

    text
}

/// Legacy export of `(id, owner)` rows.
pub fn legacy_export(rows: &[(&str, &str)]) -> String {
    let rows: Vec<[&str; 2]> = rows.iter().map(|(id, owner)| [*id, *owner]).collect();
    let rows: Vec<&[&str]> = rows.iter().map(|row| row.as_slice()).collect();

    export_text(&["Id", "CreatedById"], &rows)
}

/// Migrated export of `(id, origin id)` rows.
pub fn migrated_export(rows: &[(&str, &str)]) -> String {
    let rows: Vec<[&str; 2]> = rows.iter().map(|(id, origin)| [*id, *origin]).collect();
    let rows: Vec<&[&str]> = rows.iter().map(|row| row.as_slice()).collect();

    export_text(&["Id", "Origin_Id__c"], &rows)
}

fn quoted_line(fields: &[&str]) -> String {
    let fields: Vec<String> = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect();

    format!("{}\n", fields.join(","))
}

/// Splits `text` into chunks of `size` bytes, ignoring character boundaries.
pub fn split_into_chunks(text: &str, size: usize) -> Vec<bytes::Bytes> {
    text.as_bytes()
        .chunks(size.max(1))
        .map(bytes::Bytes::copy_from_slice)
        .collect()
}
