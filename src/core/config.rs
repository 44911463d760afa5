//! Configuration structures for passask
//!
//! This module provides type-safe configuration management with serde support.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Interpreter used when none is configured
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Flag that makes the interpreter run its next argument as a command line
pub const DEFAULT_SHELL_FLAG: &str = "-c";

/// Environment variables consulted for the askpass command, in order
pub const DEFAULT_COMMAND_VARS: &[&str] = &["SUDO_ASKPASS", "GIT_ASKPASS", "SSH_ASKPASS"];

/// Root configuration object
///
/// Every field is optional so that layers can be merged; the accessors fall
/// back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AskpassConfig {
    /// Interpreter program (default: /bin/sh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<PathBuf>,

    /// Flag passed before the command line (default: -c)
    #[serde(skip_serializing_if = "Option::is_none", rename = "shellFlag")]
    pub shell_flag: Option<String>,

    /// Environment variables to look up the command line in
    #[serde(skip_serializing_if = "Option::is_none", rename = "commandVars")]
    pub command_vars: Option<Vec<String>>,

    /// Explicit command line, takes precedence over `command_vars`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Interpreter invocation: `<program> <flag> <command line>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    pub program: PathBuf,
    pub flag: OsString,
}

impl Shell {
    pub fn new(program: impl Into<PathBuf>, flag: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL, DEFAULT_SHELL_FLAG)
    }
}

/// Where a resolved command line came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// `command` config key or `--command`
    Explicit,
    /// One of the askpass environment variables
    EnvVar(String),
}

/// Command line chosen by [`AskpassConfig::resolve_command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub command_line: String,
    pub source: CommandSource,
}

impl AskpassConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Interpreter to run the command line with
    pub fn shell(&self) -> Shell {
        let defaults = Shell::default();
        Shell {
            program: self.shell.clone().unwrap_or(defaults.program),
            flag: self
                .shell_flag
                .as_ref()
                .map(OsString::from)
                .unwrap_or(defaults.flag),
        }
    }

    /// Environment variables consulted for the command line, in order
    pub fn command_vars(&self) -> Vec<String> {
        match &self.command_vars {
            Some(vars) => vars.clone(),
            None => DEFAULT_COMMAND_VARS.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Pick the askpass command line
    ///
    /// An explicit `command` wins; otherwise the first variable in
    /// `command_vars` with a non-empty value is used.
    pub fn resolve_command(
        &self,
        env: &HashMap<String, String>,
    ) -> Result<ResolvedCommand, ConfigError> {
        if let Some(command) = self.command.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(ResolvedCommand {
                command_line: command.clone(),
                source: CommandSource::Explicit,
            });
        }

        let vars = self.command_vars();
        for var in &vars {
            if let Some(value) = env.get(var).filter(|v| !v.trim().is_empty()) {
                return Ok(ResolvedCommand {
                    command_line: value.clone(),
                    source: CommandSource::EnvVar(var.clone()),
                });
            }
        }

        Err(ConfigError::NoCommand { checked: vars })
    }
}
