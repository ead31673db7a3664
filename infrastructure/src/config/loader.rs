//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["tether.toml", ".tether.toml"];

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `TETHER_*` environment variables (`TETHER_RECONNECT__MAX_ATTEMPTS=3`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./tether.toml` or `./.tether.toml`
    /// 4. Global: `<config dir>/tether/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("TETHER_").split("__"))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tether").join("config.toml"))
    }

    /// The first project-level config file present in the working directory
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used, one per line
    pub fn describe_sources(config_path: Option<&Path>) -> String {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];

        if let Some(path) = config_path {
            lines.push(format!("  [FOUND] Explicit: {}", path.display()));
        }

        match Self::project_config_path() {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push("  [     ] Project: ./tether.toml or ./.tether.toml".to_string()),
        }

        if let Some(path) = Self::global_config_path() {
            let mark = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", mark, path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportKind;
    use figment::Jail;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.continuation.max_iterations, 10);
        assert_eq!(config.backend.transport, TransportKind::Tcp);
    }

    #[test]
    fn test_global_config_path_names_tether() {
        if let Some(path) = ConfigLoader::global_config_path() {
            assert!(path.ends_with("tether/config.toml"));
        }
    }

    #[test]
    fn test_project_file_then_explicit_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tether.toml",
                r#"
[backend]
address = "10.0.0.1:9000"

[continuation]
max_iterations = 3
"#,
            )?;
            jail.create_file("override.toml", "[continuation]\nmax_iterations = 7\n")?;
            jail.set_env("TETHER_RECONNECT__MAX_ATTEMPTS", "2");

            let config = ConfigLoader::load(Some(Path::new("override.toml")))
                .map_err(|e| figment::Error::from(e.to_string()))?;
            assert_eq!(config.backend.address, "10.0.0.1:9000");
            assert_eq!(config.continuation.max_iterations, 7);
            assert_eq!(config.reconnect.max_attempts, 2);
            assert_eq!(config.reconnect.initial_delay_ms, 1000);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.create_file(".tether.toml", "[backend]\ntransport = \"carrier-pigeon\"\n")?;
            assert!(ConfigLoader::load(None).is_err());
            Ok(())
        });
    }
}
