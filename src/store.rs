//! In-memory property store for one captured panel configuration.
//!
//! Pure data: path → value mapping plus the dependent-file lists and soft
//! diagnostics accumulated while the store was built. All validation lives
//! in `normalize`; all I/O lives behind `source::FileSource`.

use std::collections::BTreeMap;

use crate::value::PropertyValue;

/// A captured panel configuration. Paths are slash-delimited and unique;
/// iteration order is lexicographic regardless of insertion order.
#[derive(Debug, Default)]
pub struct PanelConfig {
    properties: BTreeMap<String, PropertyValue>,

    /// Launcher descriptors the configuration depends on, as relative
    /// paths of the form `launcher-<id>/<name>`.
    pub desktop_files: Vec<String>,

    /// Per-plugin settings files (`<type>-<id>.rc`) found in the source.
    pub settings_files: Vec<String>,

    /// Soft diagnostics collected while building/normalizing the store.
    /// Never fatal; surfaced to the caller as warnings.
    pub errors: Vec<String>,
}

impl PanelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&PropertyValue> {
        self.properties.get(path)
    }

    pub fn set(&mut self, path: &str, value: PropertyValue) {
        self.properties.insert(path.to_string(), value);
    }

    pub fn remove(&mut self, path: &str) -> Option<PropertyValue> {
        self.properties.remove(path)
    }

    /// All properties in sorted path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Delete each root path and every strict descendant of it. Returns the
    /// number of properties removed.
    pub fn remove_subtrees(&mut self, roots: &[String]) -> usize {
        let mut removed = 0;
        for root in roots {
            if self.properties.remove(root).is_some() {
                removed += 1;
            }
            // '0' is the byte after '/', so [root + "/", root + "0") spans
            // exactly the descendants and nothing like `plugin-12` when the
            // root is `plugin-1`
            let start = format!("{root}/");
            let end = format!("{root}0");
            let doomed: Vec<String> = self
                .properties
                .range(start..end)
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                self.properties.remove(&key);
                removed += 1;
            }
        }
        removed
    }
}
