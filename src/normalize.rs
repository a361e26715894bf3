//! Store normalization: prune what no panel references, drop launchers
//! with broken descriptors, and discover the dependent files surviving
//! plugins need.
//!
//! Three passes run in a fixed order (launcher and settings decisions
//! depend on the orphan set), each only schedules removals; all scheduled
//! subtrees are deleted in one sweep at the end. Dependent-file lists are
//! rebuilt from scratch, so normalizing an already-normalized store is a
//! no-op.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::desktop;
use crate::source::FileSource;
use crate::store::PanelConfig;
use crate::value::PropertyValue;

pub fn normalize(config: &mut PanelConfig, source: &dyn FileSource) {
    config.desktop_files.clear();
    config.settings_files.clear();

    let referenced = referenced_plugin_ids(config);
    let mut doomed: BTreeSet<String> = BTreeSet::new();

    prune_orphans(config, &referenced, &mut doomed);
    check_launchers(config, source, &mut doomed);
    discover_settings_files(config, source, &referenced, &mut doomed);

    let doomed: Vec<String> = doomed.into_iter().collect();
    let removed = config.remove_subtrees(&doomed);
    if removed > 0 {
        info!(
            plugins = doomed.len(),
            properties = removed,
            "pruned invalid plugin subtrees"
        );
    }
}

/// Union of the ids named by every `/panels/panel-*/plugin-ids` array.
fn referenced_plugin_ids(config: &PanelConfig) -> BTreeSet<i64> {
    let mut ids = BTreeSet::new();
    for (path, value) in config.iter() {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() == 4
            && segments[0].is_empty()
            && segments[1] == "panels"
            && segments[2].starts_with("panel-")
            && segments[3] == "plugin-ids"
        {
            if let PropertyValue::IntArray(plugin_ids) = value {
                ids.extend(plugin_ids.iter().copied());
            }
        }
    }
    ids
}

/// Every `/plugins/plugin-<suffix>` root present in the store, as
/// (suffix, root path) pairs.
fn plugin_roots(config: &PanelConfig) -> Vec<(String, String)> {
    let mut roots = Vec::new();
    for (path, _) in config.iter() {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() == 3
            && segments[0].is_empty()
            && segments[1] == "plugins"
            && segments[2].starts_with("plugin-")
        {
            let suffix = segments[2]["plugin-".len()..].to_string();
            roots.push((suffix, path.to_string()));
        }
    }
    roots
}

fn prune_orphans(config: &PanelConfig, referenced: &BTreeSet<i64>, doomed: &mut BTreeSet<String>) {
    for (suffix, root) in plugin_roots(config) {
        match suffix.parse::<i64>() {
            Ok(id) if id >= 0 && referenced.contains(&id) => {}
            Ok(id) => {
                debug!(plugin = id, "plugin not referenced by any panel");
                doomed.insert(root);
            }
            // non-numeric suffixes are tolerated, not pruned
            Err(_) => {}
        }
    }
}

fn check_launchers(config: &mut PanelConfig, source: &dyn FileSource, doomed: &mut BTreeSet<String>) {
    // collect first: validation needs mutable access to the error list
    let mut launchers: Vec<(String, String, Option<Vec<String>>)> = Vec::new();
    for (suffix, root) in plugin_roots(config) {
        if doomed.contains(&root) {
            continue;
        }
        if !matches!(config.get(&root), Some(PropertyValue::Str(t)) if t == "launcher") {
            continue;
        }
        let items = match config.get(&format!("{root}/items")) {
            Some(PropertyValue::StrArray(items)) => Some(items.clone()),
            _ => None,
        };
        launchers.push((suffix, root, items));
    }

    for (suffix, root, items) in launchers {
        let Some(items) = items else {
            debug!(plugin = %root, "launcher has no items array");
            doomed.insert(root);
            continue;
        };
        let mut accepted = Vec::with_capacity(items.len());
        let mut all_valid = true;
        for item in &items {
            let rel = format!("launcher-{suffix}/{item}");
            if desktop::check_desktop(source, &rel, &mut config.errors) {
                accepted.push(rel);
            } else {
                debug!(plugin = %root, item = %item, "launcher item failed validation");
                // keep checking the rest so every diagnostic is collected
                all_valid = false;
            }
        }
        if all_valid {
            config.desktop_files.extend(accepted);
        } else {
            // partial launchers are not supported: one bad item drops them all
            doomed.insert(root);
        }
    }
}

fn discover_settings_files(
    config: &mut PanelConfig,
    source: &dyn FileSource,
    referenced: &BTreeSet<i64>,
    doomed: &BTreeSet<String>,
) {
    for id in referenced {
        let root = format!("/plugins/plugin-{id}");
        if doomed.contains(&root) {
            continue;
        }
        let plugin_type = match config.get(&root) {
            Some(PropertyValue::Str(t)) if t != "launcher" => t.clone(),
            _ => continue,
        };
        let filename = format!("{plugin_type}-{id}.rc");
        if let Ok(Some(_)) = source.open(&filename) {
            debug!(file = %filename, "found plugin settings file");
            config.settings_files.push(filename);
        }
    }
}
