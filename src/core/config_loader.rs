//! Configuration file loader for passask
//!
//! This module provides layered configuration loading and merging.

use super::config::AskpassConfig;
use super::error::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".passask.yaml";

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Directory to look for a project config in
    pub project_path: PathBuf,

    /// Explicit config file; replaces the project config lookup when set
    pub config_file: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<AskpassConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables (PASSASK_SHELL, PASSASK_SHELL_FLAG, PASSASK_COMMAND)
    /// 3. Project config (./.passask.yaml) or the explicit config file
    /// 4. Global config (~/.passask.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<AskpassConfig, ConfigError> {
        let mut configs: Vec<AskpassConfig> = vec![AskpassConfig::default()];

        if let Some(home) = options.env.get("HOME") {
            let global_path = PathBuf::from(home).join(CONFIG_FILENAME);
            if let Some(global_config) = Self::load_config_file(&global_path).await? {
                configs.push(global_config);
            }
        }

        let local_path = match &options.config_file {
            Some(path) => path.clone(),
            None => options.project_path.join(CONFIG_FILENAME),
        };
        match Self::load_config_file(&local_path).await? {
            Some(local_config) => configs.push(local_config),
            None if options.config_file.is_some() => {
                // An explicitly requested file must exist
                return Err(ConfigError::Read {
                    path: local_path,
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            None => {}
        }

        if let Some(env_config) = Self::load_env_config(&options.env) {
            configs.push(env_config);
        }

        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        Ok(Self::merge_configs(configs))
    }

    /// Load configuration from a YAML file, `None` if it does not exist
    pub async fn load_config_file(file_path: &Path) -> Result<Option<AskpassConfig>, ConfigError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path)
            .await
            .map_err(|source| ConfigError::Read {
                path: file_path.to_path_buf(),
                source,
            })?;

        let config = AskpassConfig::from_yaml_str(&content).map_err(|source| ConfigError::Parse {
            path: file_path.to_path_buf(),
            source,
        })?;

        debug!(path = %file_path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Option<AskpassConfig> {
        let mut config = AskpassConfig::default();
        let mut has_changes = false;

        if let Some(shell) = env.get("PASSASK_SHELL").filter(|s| !s.is_empty()) {
            config.shell = Some(PathBuf::from(shell));
            has_changes = true;
        }

        if let Some(flag) = env.get("PASSASK_SHELL_FLAG").filter(|s| !s.is_empty()) {
            config.shell_flag = Some(flag.clone());
            has_changes = true;
        }

        if let Some(command) = env.get("PASSASK_COMMAND").filter(|s| !s.is_empty()) {
            config.command = Some(command.clone());
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }

    /// Merge multiple configurations, later entries win
    fn merge_configs(configs: Vec<AskpassConfig>) -> AskpassConfig {
        let mut result = AskpassConfig::default();

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    fn merge_into(target: &mut AskpassConfig, source: AskpassConfig) {
        if source.shell.is_some() {
            target.shell = source.shell;
        }
        if source.shell_flag.is_some() {
            target.shell_flag = source.shell_flag;
        }
        if source.command_vars.is_some() {
            target.command_vars = source.command_vars;
        }
        if source.command.is_some() {
            target.command = source.command;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_defaults_when_nothing_present() {
        let temp_dir = TempDir::new().unwrap();
        let options = ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        let config = ConfigLoader::load(options).await.unwrap();
        assert_eq!(config, AskpassConfig::default());
    }

    #[tokio::test]
    async fn test_load_layers_in_priority_order() {
        let home_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();
        std::fs::write(
            home_dir.path().join(CONFIG_FILENAME),
            "shell: /bin/bash\ncommand: printf global\n",
        )
        .unwrap();
        std::fs::write(
            project_dir.path().join(CONFIG_FILENAME),
            "command: printf project\ncommandVars: [MY_ASKPASS]\n",
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert(
            "HOME".to_string(),
            home_dir.path().to_string_lossy().into_owned(),
        );
        env.insert("PASSASK_SHELL_FLAG".to_string(), "-ec".to_string());

        let options = ConfigLoadOptions {
            project_path: project_dir.path().to_path_buf(),
            config_file: None,
            cli_args: Some(AskpassConfig {
                command: Some("printf cli".to_string()),
                ..Default::default()
            }),
            env,
        };

        let config = ConfigLoader::load(options).await.unwrap();
        assert_eq!(config.shell, Some(PathBuf::from("/bin/bash")));
        assert_eq!(config.shell_flag.as_deref(), Some("-ec"));
        assert_eq!(config.command_vars, Some(vec!["MY_ASKPASS".to_string()]));
        assert_eq!(config.command.as_deref(), Some("printf cli"));
    }

    #[tokio::test]
    async fn test_load_env_config() {
        let mut env = HashMap::new();
        env.insert("PASSASK_SHELL".to_string(), "/usr/bin/dash".to_string());
        env.insert("PASSASK_COMMAND".to_string(), String::new());

        let config = ConfigLoader::load_env_config(&env).unwrap();
        assert_eq!(config.shell, Some(PathBuf::from("/usr/bin/dash")));
        assert!(config.command.is_none());

        assert!(ConfigLoader::load_env_config(&HashMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_explicit_config_file_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let options = ConfigLoadOptions {
            project_path: temp_dir.path().to_path_buf(),
            config_file: Some(temp_dir.path().join("missing.yaml")),
            ..Default::default()
        };

        let result = ConfigLoader::load(options).await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_reported_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "shell: [unterminated\n").unwrap();

        let result = ConfigLoader::load_config_file(&path).await;
        match result {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_configs() {
        let base = AskpassConfig {
            shell: Some(PathBuf::from("/bin/sh")),
            command: Some("printf base".to_string()),
            ..Default::default()
        };
        let overlay = AskpassConfig {
            command: Some("printf overlay".to_string()),
            ..Default::default()
        };

        let merged = ConfigLoader::merge_configs(vec![base, overlay]);
        assert_eq!(merged.shell, Some(PathBuf::from("/bin/sh")));
        assert_eq!(merged.command.as_deref(), Some("printf overlay"));
    }
}
