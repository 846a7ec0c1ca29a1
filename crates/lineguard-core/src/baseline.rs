//! BaselineStore: read-only view of the training-time feature baseline.

use std::sync::Arc;

use lineguard_state::{BaselineTable, FeatureBaselineEntry, StorageResult};

/// A model's baseline, in table order, one entry per feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline {
    entries: Vec<FeatureBaselineEntry>,
}

impl Baseline {
    /// Build from table rows. When a feature appears twice the first row wins.
    pub fn from_entries(rows: impl IntoIterator<Item = FeatureBaselineEntry>) -> Self {
        let mut entries: Vec<FeatureBaselineEntry> = Vec::new();
        for row in rows {
            if !entries.iter().any(|e| e.feature_name == row.feature_name) {
                entries.push(row);
            }
        }
        Self { entries }
    }

    pub fn get(&self, feature_name: &str) -> Option<&FeatureBaselineEntry> {
        self.entries.iter().find(|e| e.feature_name == feature_name)
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureBaselineEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct BaselineStore {
    table: Arc<dyn BaselineTable>,
}

impl BaselineStore {
    pub fn new(table: Arc<dyn BaselineTable>) -> Self {
        Self { table }
    }

    /// Load the current baseline of a model. Empty if none was captured.
    pub async fn load(&self, model_name: &str) -> StorageResult<Baseline> {
        let rows = self.table.read_all(model_name).await?;
        Ok(Baseline::from_entries(rows))
    }
}
