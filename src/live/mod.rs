//! Live system adapter: capture a store from the running property service
//! and replay a store back onto it, files and process reloads included.
//!
//! The two external collaborators — the property service and the process
//! table — sit behind traits so the ordering-sensitive apply sequence can
//! be exercised against fakes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub mod process;
pub mod xfconf;

use crate::source::FileSource;
use crate::store::PanelConfig;
use crate::value::PropertyValue;

/// Name prefix of the panel host process.
pub const PANEL_PROCESS: &str = "xfce4-panel";

/// The panel's configuration property service.
pub trait PropertyService {
    fn get_all(&self) -> Result<Vec<(String, PropertyValue)>>;
    fn set(&self, path: &str, value: &PropertyValue) -> Result<()>;
    /// Recursive reset of the whole channel. Callers treat rejection as
    /// non-fatal (the panel may simply not be running).
    fn reset_all(&self) -> Result<()>;
}

/// Running-process lookup and termination. Everything here is best-effort:
/// absence of a match is normal and kill failures are ignored by callers.
pub trait ProcessRegistry {
    fn find_by_prefix(&self, prefix: &str) -> Vec<i32>;
    fn terminate(&self, pid: i32) -> Result<()>;
}

/// Filesystem locations the adapter touches. Explicit rather than looked up
/// ambiently, so tests (and future per-user tooling) can point elsewhere.
pub struct PanelPaths {
    /// The panel's config directory, conventionally `~/.config/xfce4/panel`.
    pub panel_dir: PathBuf,
}

impl PanelPaths {
    pub fn new(panel_dir: impl Into<PathBuf>) -> Self {
        Self {
            panel_dir: panel_dir.into(),
        }
    }

    pub fn default_user() -> Result<Self> {
        let config = dirs::config_dir()
            .context("failed to determine config directory (no XDG_CONFIG_HOME or HOME)")?;
        Ok(Self::new(config.join("xfce4").join("panel")))
    }
}

/// Read the complete property set of the panel channel into a fresh store.
/// The result must still be normalized before use.
pub fn capture(service: &dyn PropertyService) -> Result<PanelConfig> {
    let properties = service
        .get_all()
        .context("failed to read properties from the panel channel")?;
    info!(properties = properties.len(), "captured live property set");

    let mut config = PanelConfig::new();
    for (path, value) in properties {
        config.set(&path, value);
    }
    Ok(config)
}

/// Replay a normalized store onto the live system.
///
/// Order matters: every settings file must be on disk before its owning
/// plugin process dies, and the plugin processes must die before the panel
/// host restarts them, or the dying processes flush stale in-memory state
/// over the files just written.
pub fn apply(
    config: &PanelConfig,
    source: &dyn FileSource,
    service: &dyn PropertyService,
    processes: &dyn ProcessRegistry,
    paths: &PanelPaths,
) -> Result<()> {
    // invalidate whatever the old configuration had
    if let Err(e) = service.reset_all() {
        warn!(error = %e, "property reset rejected, continuing");
    }

    for (path, value) in config.iter() {
        service
            .set(path, value)
            .context(format!("failed to set property `{path}`"))?;
    }

    for rel in &config.desktop_files {
        let Some(bytes) = source.open(rel)? else {
            warn!(file = %rel, "desktop file missing from source, skipping");
            continue;
        };
        let dest = paths.panel_dir.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .context(format!("failed to create {}", parent.display()))?;
        }
        fs::write(&dest, bytes).context(format!("failed to write {}", dest.display()))?;
        debug!(file = %dest.display(), "wrote launcher descriptor");
    }

    for rel in &config.settings_files {
        let Some(bytes) = source.open(rel)? else {
            warn!(file = %rel, "settings file missing from source, skipping");
            continue;
        };
        let dest = paths.panel_dir.join(rel);
        fs::write(&dest, bytes).context(format!("failed to write {}", dest.display()))?;
        debug!(file = %dest.display(), "wrote plugin settings file");

        // the owning plugin process reloads the file on next panel start
        // only if it is gone before the restart
        if let Some(id) = plugin_id_from_settings(rel) {
            terminate_all(processes, &format!("panel-{id}-"));
        }
    }

    // the host restarts with the new property set and respawns plugins
    terminate_all(processes, PANEL_PROCESS);
    Ok(())
}

fn terminate_all(processes: &dyn ProcessRegistry, prefix: &str) {
    for pid in processes.find_by_prefix(prefix) {
        match processes.terminate(pid) {
            Ok(()) => info!(pid, prefix, "terminated process"),
            Err(e) => debug!(pid, error = %e, "termination failed, ignoring"),
        }
    }
}

/// Extract the plugin id from a `<type>-<id>.rc` settings filename.
fn plugin_id_from_settings(name: &str) -> Option<&str> {
    let (_, id) = name.strip_suffix(".rc")?.rsplit_once('-')?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}
