//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use shelf_core::ShelfConfig;

use crate::output::Output;

const CONFIG_NAMES: [&str; 3] = ["shelf.toml", ".shelf.toml", "shelf.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Effective configuration: defaults, then file, then environment.
    pub config: ShelfConfig,
    /// File the configuration was read from, if any.
    pub config_path: Option<PathBuf>,
    pub output: Output,
    pub cwd: PathBuf,
}

impl Context {
    /// Load context, reading `.env` and the config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            output.debug(&format!("Loaded environment from {}", path.display()));
        }
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(PathBuf::from(path)),
            None => find_config(&cwd),
        };
        let mut config = match &config_path {
            Some(path) => ShelfConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ShelfConfig::default(),
        };
        config
            .apply_env()
            .context("Failed to apply SHELF_* environment overrides")?;

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }
}

/// Find a config file in `start` or any parent directory.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in CONFIG_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_walks_up() {
        let root = std::env::temp_dir().join(format!("shelf-cli-find-{}", std::process::id()));
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join("shelf.toml"), "[cache]\nmerged_ttl_secs = 60\n").unwrap();

        assert_eq!(find_config(&nested), Some(root.join("shelf.toml")));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
