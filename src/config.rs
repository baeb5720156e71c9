use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Coalesce;

/// Root configuration structure, deserialized from `.bomcheck/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub templates: TemplatesConfig,
}

/// Defaults for the `scan` command.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Whether license files with the same license in one directory are merged.
    pub coalesce: Coalesce,
    /// Classify directories on the blocking thread pool instead of inline.
    pub parallel: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            coalesce: Coalesce::All,
            parallel: true,
        }
    }
}

/// Where license text templates (`<ID>.txt`) are read from.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub dir: Option<PathBuf>,
}

impl TemplatesConfig {
    /// The configured directory, else the `licenses/` directory shipped with the crate.
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/licenses")))
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`, the path passed via `--config`
/// 2. `<project_path>/.bomcheck/config.toml`
/// 3. `~/.config/bomcheck/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".bomcheck").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("bomcheck").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.scan.coalesce, Coalesce::All);
        assert!(cfg.scan.parallel);
        assert!(cfg.templates.dir().ends_with("licenses"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str("[scan]\ncoalesce = \"none\"\n").unwrap();
        assert_eq!(cfg.scan.coalesce, Coalesce::None);
        assert!(cfg.scan.parallel);
        assert_eq!(cfg.templates.dir, None);
    }

    #[test]
    fn test_project_config_is_found() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".bomcheck")).unwrap();
        fs::write(
            tmp.path().join(".bomcheck/config.toml"),
            "[scan]\nparallel = false\n[templates]\ndir = \"/opt/licenses\"\n",
        )
        .unwrap();

        let cfg = load_config(tmp.path(), None).unwrap();
        assert!(!cfg.scan.parallel);
        assert_eq!(cfg.templates.dir(), PathBuf::from("/opt/licenses"));
    }

    #[test]
    fn test_override_wins() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".bomcheck")).unwrap();
        fs::write(tmp.path().join(".bomcheck/config.toml"), "[scan]\nparallel = false\n").unwrap();
        let other = tmp.path().join("other.toml");
        fs::write(&other, "[scan]\ncoalesce = \"none\"\n").unwrap();

        let cfg = load_config(tmp.path(), Some(&other)).unwrap();
        assert!(cfg.scan.parallel);
        assert_eq!(cfg.scan.coalesce, Coalesce::None);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "[scan]\ncoalesce = \"some\"\n").unwrap();
        assert!(load_config(tmp.path(), Some(&path)).is_err());
    }
}
