//! Locating the runtime home and deriving its layout.

use super::properties::{keys, SystemProperties};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which candidate the home directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeSource {
    /// The conventional directory under the solution root.
    Primary,
    /// The directory under the alternate application root.
    Fallback,
    /// Neither exists; the primary path is used anyway.
    Missing,
}

/// The resolved runtime home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHome {
    /// The chosen directory.
    pub path: PathBuf,
    /// Where it came from.
    pub source: HomeSource,
}

impl RuntimeHome {
    /// Returns true if the chosen directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.source != HomeSource::Missing
    }

    /// Derives the directory layout below this home.
    #[must_use]
    pub fn layout(&self) -> RuntimeLayout {
        RuntimeLayout::new(&self.path)
    }
}

/// Picks the runtime home directory.
///
/// The primary candidate is `solution_root/runtime_dir`. Only when it is
/// missing is `alternate_root/runtime_dir` considered, and only if the
/// alternate root is non-empty and that directory exists. Otherwise the
/// primary path is returned and the failure surfaces when the runtime tries
/// to start there.
#[must_use]
pub fn resolve_runtime_home(
    solution_root: &Path,
    runtime_dir: &Path,
    alternate_root: Option<&str>,
) -> RuntimeHome {
    let primary = solution_root.join(runtime_dir);
    if primary.is_dir() {
        return RuntimeHome {
            path: primary,
            source: HomeSource::Primary,
        };
    }

    tracing::warn!(path = %primary.display(), "Runtime not found in standard directory");

    if let Some(root) = alternate_root.map(str::trim).filter(|r| !r.is_empty()) {
        tracing::warn!(
            alternate_root = root,
            "Alternate application root is set; looking for the runtime there"
        );
        let fallback = Path::new(root).join(runtime_dir);
        if fallback.is_dir() {
            return RuntimeHome {
                path: fallback,
                source: HomeSource::Fallback,
            };
        }
    }

    RuntimeHome {
        path: primary,
        source: HomeSource::Missing,
    }
}

/// Paths below a runtime home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLayout {
    /// The home directory.
    pub home: PathBuf,
    /// Runtime data.
    pub data: PathBuf,
    /// Console history file.
    pub history: PathBuf,
    /// Child instances.
    pub instances: PathBuf,
    /// Configuration directory.
    pub etc: PathBuf,
}

impl RuntimeLayout {
    /// Derives the layout for `home`.
    #[must_use]
    pub fn new(home: &Path) -> Self {
        let data = home.join("data");
        Self {
            home: home.to_path_buf(),
            history: data.join("history.txt"),
            data,
            instances: home.join("instances"),
            etc: home.join("etc"),
        }
    }

    /// Publishes the directory properties.
    pub fn publish(&self, properties: &SystemProperties) {
        let home = self.home.display().to_string();
        properties.set(keys::HOME, home.clone());
        properties.set(keys::BASE, home);
        properties.set(keys::DATA, self.data.display().to_string());
        properties.set(keys::HISTORY, self.history.display().to_string());
        properties.set(keys::INSTANCES, self.instances.display().to_string());
        properties.set(keys::ETC, self.etc.display().to_string());
        properties.set(keys::FILEINSTALL_DIR, self.etc.display().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RUNTIME_DIR: &str = "system/runtime";

    fn with_runtime(root: &TempDir) -> PathBuf {
        let dir = root.path().join(RUNTIME_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_primary_wins_even_with_valid_fallback() {
        let solution = TempDir::new().unwrap();
        let alternate = TempDir::new().unwrap();
        let primary = with_runtime(&solution);
        with_runtime(&alternate);

        let home = resolve_runtime_home(
            solution.path(),
            Path::new(RUNTIME_DIR),
            alternate.path().to_str(),
        );
        assert_eq!(home.path, primary);
        assert_eq!(home.source, HomeSource::Primary);
    }

    #[test]
    fn test_fallback_used_when_primary_missing() {
        let solution = TempDir::new().unwrap();
        let alternate = TempDir::new().unwrap();
        let fallback = with_runtime(&alternate);

        let home = resolve_runtime_home(
            solution.path(),
            Path::new(RUNTIME_DIR),
            alternate.path().to_str(),
        );
        assert_eq!(home.path, fallback);
        assert_eq!(home.source, HomeSource::Fallback);
        assert!(home.exists());
    }

    #[test]
    fn test_missing_everywhere_keeps_primary() {
        let solution = TempDir::new().unwrap();
        let alternate = TempDir::new().unwrap();

        let home = resolve_runtime_home(
            solution.path(),
            Path::new(RUNTIME_DIR),
            alternate.path().to_str(),
        );
        assert_eq!(home.path, solution.path().join(RUNTIME_DIR));
        assert_eq!(home.source, HomeSource::Missing);
        assert!(!home.exists());
    }

    #[test]
    fn test_blank_alternate_is_ignored() {
        let solution = TempDir::new().unwrap();
        let home = resolve_runtime_home(solution.path(), Path::new(RUNTIME_DIR), Some("  "));
        assert_eq!(home.source, HomeSource::Missing);
    }

    #[test]
    fn test_layout_publishes_paths() {
        let layout = RuntimeLayout::new(Path::new("/opt/app/system/runtime"));
        let props = SystemProperties::new();
        layout.publish(&props);

        assert_eq!(props.get(keys::HOME).unwrap(), "/opt/app/system/runtime");
        assert_eq!(props.get(keys::BASE), props.get(keys::HOME));
        assert_eq!(
            props.get(keys::HISTORY).unwrap(),
            "/opt/app/system/runtime/data/history.txt"
        );
        assert_eq!(props.get(keys::FILEINSTALL_DIR), props.get(keys::ETC));
    }
}
