//! Per-dataset change detection between two registry snapshots

use std::ops::Index;

use indexmap::IndexMap;
use serde::Serialize;

use crate::model::{Dataset, Registry};
use crate::value::{Fields, Value};

/// How a dataset differs between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// Only present in the later snapshot
    Added,
    /// Only present in the earlier snapshot
    Removed,
    /// Present in both with at least one attribute difference
    Modified,
    Unchanged,
}

/// Old and new value of a changed attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub old: Value,
    pub new: Value,
}

/// Key-wise difference between two attribute mappings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub added: Fields,
    pub removed: Fields,
    pub modified: IndexMap<String, Change>,
}

impl FieldDiff {
    /// Compare two mappings. Values are compared structurally.
    pub fn compute(old: &Fields, new: &Fields) -> Self {
        let mut diff = Self::default();

        for (key, old_value) in old {
            match new.get(key) {
                Some(new_value) if new_value != old_value => {
                    diff.modified.insert(
                        key.clone(),
                        Change {
                            old: old_value.clone(),
                            new: new_value.clone(),
                        },
                    );
                }
                Some(_) => {}
                None => {
                    diff.removed.insert(key.clone(), old_value.clone());
                }
            }
        }

        for (key, new_value) in new {
            if !old.contains_key(key) {
                diff.added.insert(key.clone(), new_value.clone());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of differing keys
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Result of comparing one dataset between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDiff {
    pub status: DiffStatus,
    #[serde(flatten)]
    pub fields: FieldDiff,
}

impl DatasetDiff {
    /// A dataset that only exists in the later snapshot.
    pub fn added(dataset: &Dataset) -> Self {
        Self {
            status: DiffStatus::Added,
            fields: FieldDiff {
                added: dataset.entries(),
                ..FieldDiff::default()
            },
        }
    }

    /// A dataset that only exists in the earlier snapshot.
    pub fn removed(dataset: &Dataset) -> Self {
        Self {
            status: DiffStatus::Removed,
            fields: FieldDiff {
                removed: dataset.entries(),
                ..FieldDiff::default()
            },
        }
    }

    /// Compare the flat attribute views of two versions of a dataset.
    pub fn compute(old: &Dataset, new: &Dataset) -> Self {
        let fields = FieldDiff::compute(&old.entries(), &new.entries());
        let status = if fields.is_empty() {
            DiffStatus::Unchanged
        } else {
            DiffStatus::Modified
        };
        Self { status, fields }
    }

    pub fn is_changed(&self) -> bool {
        self.status != DiffStatus::Unchanged
    }

    pub fn added_attributes(&self) -> &Fields {
        &self.fields.added
    }

    pub fn removed_attributes(&self) -> &Fields {
        &self.fields.removed
    }

    pub fn modified_attributes(&self) -> &IndexMap<String, Change> {
        &self.fields.modified
    }
}

/// Per-dataset change report covering every identifier in either snapshot.
///
/// Entries follow the later snapshot's order, then identifiers that only
/// exist in the earlier snapshot, in its order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryDiff {
    datasets: IndexMap<String, DatasetDiff>,
    /// Changes to top-level (non-dataset) settings
    pub settings: FieldDiff,
}

impl RegistryDiff {
    pub fn compute(before: &Registry, after: &Registry) -> Self {
        let mut datasets = IndexMap::with_capacity(after.len());

        for new in after.datasets() {
            let diff = match before.dataset(&new.id) {
                Some(old) => DatasetDiff::compute(old, new),
                None => DatasetDiff::added(new),
            };
            datasets.insert(new.id.clone(), diff);
        }

        for old in before.datasets() {
            if !after.contains(&old.id) {
                datasets.insert(old.id.clone(), DatasetDiff::removed(old));
            }
        }

        Self {
            datasets,
            settings: FieldDiff::compute(before.settings(), after.settings()),
        }
    }

    pub fn get(&self, id: &str) -> Option<&DatasetDiff> {
        self.datasets.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatasetDiff)> {
        self.datasets.iter().map(|(id, diff)| (id.as_str(), diff))
    }

    /// Datasets whose configuration changed, including additions and removals.
    pub fn changed(&self) -> impl Iterator<Item = (&str, &DatasetDiff)> {
        self.iter().filter(|(_, diff)| diff.is_changed())
    }

    pub fn changed_ids(&self) -> Vec<&str> {
        self.changed().map(|(id, _)| id).collect()
    }

    /// True if any dataset or top-level setting changed.
    pub fn has_changes(&self) -> bool {
        !self.settings.is_empty() || self.datasets.values().any(DatasetDiff::is_changed)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl Index<&str> for RegistryDiff {
    type Output = DatasetDiff;

    fn index(&self, id: &str) -> &DatasetDiff {
        &self.datasets[id]
    }
}

/// Compare two registry snapshots. Pure; neither input is modified.
pub fn diff(before: &Registry, after: &Registry) -> RegistryDiff {
    RegistryDiff::compute(before, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Block;
    use pretty_assertions::assert_eq;

    fn cruise(active: &str) -> Dataset {
        Dataset::new("cruise_2020", "EDDTableFromErddap")
            .with_attribute("active", active)
            .with_field("sourceUrl", "http://a")
    }

    #[test]
    fn test_field_diff_empty_mappings() {
        let diff = FieldDiff::compute(&Fields::new(), &Fields::new());
        assert!(diff.is_empty());
        assert_eq!(diff.len(), 0);
    }

    #[test]
    fn test_field_diff_added_removed_modified() {
        let mut old = Fields::new();
        old.insert("a".into(), Value::scalar("1"));
        old.insert("b".into(), Value::scalar("2"));
        let mut new = Fields::new();
        new.insert("a".into(), Value::scalar("9"));
        new.insert("c".into(), Value::scalar("3"));

        let diff = FieldDiff::compute(&old, &new);

        assert_eq!(diff.added.keys().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(diff.removed.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(
            diff.modified["a"],
            Change {
                old: Value::scalar("1"),
                new: Value::scalar("9")
            }
        );
        assert_eq!(diff.len(), 3);
    }

    #[test]
    fn test_dataset_modified_attribute() {
        let diff = DatasetDiff::compute(&cruise("true"), &cruise("false"));

        assert!(diff.is_changed());
        assert_eq!(diff.status, DiffStatus::Modified);
        assert_eq!(diff.modified_attributes().len(), 1);
        let change = &diff.modified_attributes()["active"];
        assert_eq!(change.old, Value::scalar("true"));
        assert_eq!(change.new, Value::scalar("false"));
    }

    #[test]
    fn test_dataset_type_change_is_detected() {
        let old = cruise("true");
        let mut new = cruise("true");
        new.kind = "EDDTableFromDapSequence".into();

        let diff = DatasetDiff::compute(&old, &new);
        assert!(diff.modified_attributes().contains_key("type"));
    }

    #[test]
    fn test_nested_blocks_compare_structurally() {
        let block = || {
            Block::new().with_child(
                "att",
                vec![
                    Block::new().with_attribute("name", "title").with_text("A"),
                    Block::new().with_attribute("name", "units").with_text("m"),
                ],
            )
        };
        let old = cruise("true").with_field("addAttributes", block());
        let new = cruise("true").with_field("addAttributes", block());

        assert_eq!(DatasetDiff::compute(&old, &new).status, DiffStatus::Unchanged);
    }

    #[test]
    fn test_added_dataset_lists_all_entries() {
        let diff = DatasetDiff::added(&cruise("true"));
        assert_eq!(diff.status, DiffStatus::Added);
        let keys: Vec<_> = diff.added_attributes().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "active", "sourceUrl"]);
        assert!(diff.removed_attributes().is_empty());
    }

    #[test]
    fn test_registry_diff_order_and_settings() {
        let mut before: Registry = [Dataset::new("x", ""), Dataset::new("y", "")]
            .into_iter()
            .collect();
        before.set_setting("slowDownTroubleMillis", "1000");
        let mut after: Registry = [Dataset::new("z", ""), Dataset::new("y", "")]
            .into_iter()
            .collect();
        after.set_setting("slowDownTroubleMillis", "500");

        let diff = diff(&before, &after);

        let ids: Vec<_> = diff.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["z", "y", "x"]);
        assert_eq!(diff.changed_ids(), vec!["z", "x"]);
        assert!(diff.settings.modified.contains_key("slowDownTroubleMillis"));
        assert!(diff.has_changes());
    }

    #[test]
    fn test_identical_registries_have_no_changes() {
        let registry: Registry = [cruise("true")].into_iter().collect();
        let diff = diff(&registry, &registry.clone());
        assert!(!diff.has_changes());
        assert_eq!(diff.len(), 1);
        assert!(!diff["cruise_2020"].is_changed());
    }

    #[test]
    fn test_diff_serializes_for_reports() {
        let before: Registry = [cruise("true")].into_iter().collect();
        let after: Registry = [cruise("false")].into_iter().collect();
        let json = serde_json::to_value(diff(&before, &after)).unwrap();

        assert_eq!(json["datasets"]["cruise_2020"]["status"], "modified");
        assert_eq!(json["datasets"]["cruise_2020"]["modified"]["active"]["old"], "true");
        assert_eq!(json["datasets"]["cruise_2020"]["modified"]["active"]["new"], "false");
    }
}
