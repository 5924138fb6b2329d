//! Demo records for exercising the splitter and the transform flows.

use crate::record::Serializable;

/// Number of `FieldN` columns after `Name` and `Code` (`Field3` ..= `Field20`).
pub const DEMO_EXTRA_FIELDS: usize = 18;

/// A wide demo row: `Name`, `Code`, then `Field3` through `Field20`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DemoRecord {
    pub name: String,
    pub code: String,
    pub extra: Vec<String>,
}

impl DemoRecord {
    /// The `i`-th demo row: `Name{i}`, `{i * 5}`, `Field3_{i}`, ...
    #[must_use]
    pub fn numbered(i: usize) -> Self {
        Self {
            name: format!("Name{i}"),
            code: (i * 5).to_string(),
            extra: (3..3 + DEMO_EXTRA_FIELDS)
                .map(|n| format!("Field{n}_{i}"))
                .collect(),
        }
    }
}

impl Serializable for DemoRecord {
    fn to_fields(&self) -> Vec<Option<String>> {
        let mut fields = Vec::with_capacity(2 + self.extra.len());
        fields.push(Some(self.name.clone()));
        fields.push(Some(self.code.clone()));
        fields.extend(self.extra.iter().cloned().map(Some));
        fields
    }
}

/// `n` demo rows numbered from 1.
///
/// # Example
///
/// ```
/// use splitseal::testing::seed_records;
///
/// let rows = seed_records(3);
/// assert_eq!(rows[2].name, "Name3");
/// assert_eq!(rows[2].code, "15");
/// ```
#[must_use]
pub fn seed_records(n: usize) -> Vec<DemoRecord> {
    (1..=n).map(DemoRecord::numbered).collect()
}
