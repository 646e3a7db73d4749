//! Schema delta: which columns of an incoming batch a table is missing.
//!
//! Comparison is by column **name only**. A column present on both sides is
//! never reported, even if its type differs; such a conflict is left for the
//! store to reject when the batch is inserted.

use std::collections::HashSet;

use arrow::datatypes::{Field, FieldRef, Schema};

/// Columns of `desired` whose names are absent from `existing`.
///
/// Each returned fragment is a single-field schema with the name and data type
/// from `desired`. Fragments are always nullable: rows already in the table
/// have no value for the new column. Fragments follow the column order of
/// `desired`.
pub fn schema_delta(existing: &Schema, desired: &Schema) -> Vec<Schema> {
    let existing_names: HashSet<&str> = existing
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();

    desired
        .fields()
        .iter()
        .filter(|f| !existing_names.contains(f.name().as_str()))
        .map(|f| Schema::new(vec![Field::new(f.name(), f.data_type().clone(), true)]))
        .collect()
}

/// `existing` followed by every field carried by `fragments`.
///
/// Fields whose name is already present are skipped, so merging the result of
/// [`schema_delta`] twice is harmless.
pub fn merge_fragments(existing: &Schema, fragments: &[Schema]) -> Schema {
    let mut seen: HashSet<String> = existing.fields().iter().map(|f| f.name().clone()).collect();
    let mut fields: Vec<FieldRef> = existing.fields().iter().cloned().collect();

    for field in fragments.iter().flat_map(|s| s.fields().iter()) {
        if seen.insert(field.name().clone()) {
            fields.push(field.clone());
        }
    }

    Schema::new_with_metadata(fields, existing.metadata().clone())
}
