use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;

/// Name returned for class ids missing from the table.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Immutable class id → display name mapping.
///
/// Built once and handed to the `Detector`; there is no process-wide table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    names: HashMap<i32, String>,
}

impl LabelTable {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(id, name)| (id, name.into()))
                .collect(),
        }
    }

    /// Load a table from a JSON object such as `{"0": "Background", "1": "Person"}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read label file {}: {}", path.display(), e))?;
        Self::from_json_str(&raw)
            .map_err(|e| anyhow!("invalid label file {}: {}", path.display(), e))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, String> = serde_json::from_str(raw)?;
        let mut names = HashMap::with_capacity(parsed.len());
        for (key, name) in parsed {
            let id: i32 = key
                .trim()
                .parse()
                .map_err(|_| anyhow!("label key {:?} is not an integer class id", key))?;
            names.insert(id, name);
        }
        Ok(Self { names })
    }

    /// Total lookup: unknown ids resolve to [`UNKNOWN_LABEL`].
    pub fn label_for(&self, class_id: i32) -> &str {
        self.names
            .get(&class_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new([(0, "Background"), (1, "Person"), (2, "Car")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_maps_fixed_ids() {
        let labels = LabelTable::default();
        assert_eq!(labels.label_for(0), "Background");
        assert_eq!(labels.label_for(1), "Person");
        assert_eq!(labels.label_for(2), "Car");
    }

    #[test]
    fn unknown_ids_never_fail() {
        let labels = LabelTable::default();
        for id in [-1, 3, 90, i32::MIN, i32::MAX] {
            assert_eq!(labels.label_for(id), UNKNOWN_LABEL);
        }
    }

    #[test]
    fn parses_json_object() -> Result<()> {
        let labels = LabelTable::from_json_str(r#"{"0": "bg", " 7 ": "dog"}"#)?;
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.label_for(7), "dog");
        assert_eq!(labels.label_for(1), UNKNOWN_LABEL);
        Ok(())
    }

    #[test]
    fn rejects_non_integer_keys() {
        assert!(LabelTable::from_json_str(r#"{"person": "Person"}"#).is_err());
    }
}
