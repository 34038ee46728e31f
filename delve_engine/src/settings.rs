//! User settings and start-up store resolution.
//!
//! Settings live in `<config dir>/delve/settings.toml`. A missing or unreadable file
//! just means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::store::WorldStore;

pub const SETTINGS_FILE: &str = "settings.toml";
pub const DEFAULT_DATABASE: &str = "adventure.db";

/// Preferences remembered between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store opened last time.
    pub current_database: Option<PathBuf>,
    /// File name of the fallback store inside the settings directory.
    pub default_database: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            current_database: None,
            default_database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults if it is missing or malformed.
    pub fn load_from(path: &Path) -> Settings {
        if !path.exists() {
            return Settings::default();
        }
        let parsed = fs::read_to_string(path)
            .with_context(|| format!("reading settings from '{}'", path.display()))
            .and_then(|text| {
                toml::from_str::<Settings>(&text)
                    .with_context(|| format!("parsing settings in '{}'", path.display()))
            });
        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                warn!("{e:#}; using default settings");
                Settings::default()
            },
        }
    }

    /// Write settings to `path`, creating its directory if needed.
    ///
    /// # Errors
    /// - if the directory cannot be created or the file written
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating settings directory '{}'", dir.display()))?;
        }
        let text = toml::to_string_pretty(self).context("serializing settings")?;
        fs::write(path, text).with_context(|| format!("writing settings to '{}'", path.display()))?;
        info!("settings saved to {}", path.display());
        Ok(())
    }

    /// Make `store_path` the store a bare `delve play` reopens. Stored absolute when
    /// the path can be resolved.
    pub fn remember(&mut self, store_path: &Path) {
        let resolved = fs::canonicalize(store_path).unwrap_or_else(|_| store_path.to_path_buf());
        self.current_database = Some(resolved);
    }

    /// Full path of the default store inside `settings_dir`.
    pub fn default_database_path(&self, settings_dir: &Path) -> PathBuf {
        settings_dir.join(&self.default_database)
    }
}

/// Platform settings directory for delve, if one can be determined.
pub fn settings_dir() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::data_local_dir)
        .map(|base| build_settings_dir(&base))
}

fn build_settings_dir(base: &Path) -> PathBuf {
    let mut path = base.to_path_buf();
    path.push("delve");
    path
}

/// Record `store_path` as the current store in the settings file under `settings_dir`.
///
/// # Errors
/// - if the settings file cannot be written
pub fn remember_store(settings_dir: &Path, store_path: &Path) -> Result<()> {
    let settings_path = settings_dir.join(SETTINGS_FILE);
    let mut settings = Settings::load_from(&settings_path);
    settings.remember(store_path);
    settings.save_to(&settings_path)
}

/// Open the store to start with and remember its path in `settings`.
///
/// Tries the remembered store, then the default store in `settings_dir`, and finally
/// creates the default store there.
///
/// # Errors
/// - if the settings directory cannot be created or the default store cannot be created
pub fn resolve_startup_store(settings: &mut Settings, settings_dir: &Path) -> Result<WorldStore> {
    if let Some(saved) = settings.current_database.clone() {
        if saved.exists() {
            match WorldStore::open_at(&saved) {
                Ok(store) => {
                    info!("opened remembered store {}", saved.display());
                    return Ok(store);
                },
                Err(e) => warn!("remembered store {} unusable ({e}); falling back to default", saved.display()),
            }
        } else {
            warn!("remembered store {} is gone; falling back to default", saved.display());
        }
    }

    fs::create_dir_all(settings_dir)
        .with_context(|| format!("creating settings directory '{}'", settings_dir.display()))?;
    let default_path = settings.default_database_path(settings_dir);

    if default_path.exists() {
        match WorldStore::open_at(&default_path) {
            Ok(store) => {
                settings.current_database = Some(default_path);
                return Ok(store);
            },
            Err(e) => warn!("default store {} unusable ({e}); recreating it", default_path.display()),
        }
    }

    let store = WorldStore::create(&default_path)
        .with_context(|| format!("creating default store '{}'", default_path.display()))?;
    settings.current_database = Some(default_path);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn settings_dir_appends_component() {
        assert_eq!(build_settings_dir(Path::new("/tmp/cfg")), PathBuf::from("/tmp/cfg/delve"));
    }

    #[test]
    fn missing_or_malformed_file_gives_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        assert_eq!(Settings::load_from(&path), Settings::default());
        fs::write(&path, "current_database = [").expect("write");
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn settings_round_trip_through_toml() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            current_database: Some(PathBuf::from("/worlds/castle.db")),
            default_database: "mine.db".into(),
        };
        settings.save_to(&path).expect("save");
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn remembered_store_is_reopened_on_next_startup() {
        let dir = tempdir().expect("tempdir");
        let chosen = dir.path().join("castle.db");
        drop(WorldStore::create(&chosen).expect("create"));

        let settings_path = dir.path().join(SETTINGS_FILE);
        let earlier = Settings {
            current_database: Some(dir.path().join(DEFAULT_DATABASE)),
            ..Settings::default()
        };
        earlier.save_to(&settings_path).expect("save earlier");

        remember_store(dir.path(), &chosen).expect("remember");
        let mut settings = Settings::load_from(&settings_path);
        let canonical = fs::canonicalize(&chosen).expect("canonical");
        assert_eq!(settings.current_database.as_deref(), Some(canonical.as_path()));
        assert_eq!(settings.default_database, DEFAULT_DATABASE);

        let store = resolve_startup_store(&mut settings, dir.path()).expect("resolve");
        assert_eq!(store.path(), Some(canonical.as_path()));
    }

    #[test]
    fn remember_keeps_unresolvable_paths_as_given() {
        let mut settings = Settings::default();
        let missing = PathBuf::from("/no/such/dir/world.db");
        settings.remember(&missing);
        assert_eq!(settings.current_database, Some(missing));
    }

    #[test]
    fn startup_creates_then_reuses_default_store() {
        let dir = tempdir().expect("tempdir");
        let mut settings = Settings {
            current_database: Some(dir.path().join("vanished.db")),
            ..Settings::default()
        };
        let store = resolve_startup_store(&mut settings, dir.path()).expect("resolve");
        let expected = dir.path().join(DEFAULT_DATABASE);
        assert_eq!(store.path(), Some(expected.as_path()));
        assert_eq!(settings.current_database.as_deref(), Some(expected.as_path()));
        drop(store);

        let again = resolve_startup_store(&mut settings, dir.path()).expect("resolve again");
        assert!(again.verify_schema());
    }

    #[test]
    fn corrupt_default_store_is_recreated() {
        let dir = tempdir().expect("tempdir");
        let mut settings = Settings::default();
        fs::write(dir.path().join(DEFAULT_DATABASE), vec![7_u8; 2048]).expect("junk");
        let store = resolve_startup_store(&mut settings, dir.path()).expect("resolve");
        assert!(store.verify_schema());
    }
}
