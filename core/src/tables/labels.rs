use serde::{Deserialize, Serialize};

/// Name used for the background entry of label files; never processed.
pub const BACKGROUND_LABEL: &str = "Background";

/// One (value, name) pair from a region label file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLabel {
    pub value: i32,
    pub name: String,
}

impl RegionLabel {
    pub fn is_background(&self) -> bool {
        self.name == BACKGROUND_LABEL
    }
}

/// Ordered set of region labels. Order is preserved because it defines
/// the column order of every per-subject spectrum table.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: Vec<RegionLabel>,
}

impl LabelTable {
    pub fn new(labels: Vec<RegionLabel>) -> Self {
        Self { labels }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionLabel> {
        self.labels.iter()
    }

    /// Label value carrying `name`, if the table lists it.
    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.value)
    }

    /// Region names excluding the background entry.
    pub fn region_names(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter(|label| !label.is_background())
            .map(|label| label.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
