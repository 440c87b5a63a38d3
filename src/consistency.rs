use crate::domain::{DUPLICATE_SUFFIX, FieldMap};
use crate::error::FieldMismatch;

/// Compares every `<field>_2` entry with its `<field>` counterpart.
///
/// Returns one mismatch per disagreeing pair, in field-name order. A
/// duplicate whose primary is absent counts as a mismatch.
pub fn check(fields: &FieldMap) -> Vec<FieldMismatch> {
    fields
        .iter()
        .filter_map(|(name, filename)| {
            let primary = name.strip_suffix(DUPLICATE_SUFFIX)?;
            let directory = fields.get(primary);
            (directory != Some(filename)).then(|| FieldMismatch {
                field: primary.to_string(),
                directory: directory.map(str::to_string),
                filename: filename.to_string(),
            })
        })
        .collect()
}

/// Names of the fields that [`check`] flags.
pub fn inconsistent_fields(fields: &FieldMap) -> Vec<String> {
    check(fields)
        .into_iter()
        .map(|mismatch| mismatch.field)
        .collect()
}
