//! passask CLI
//!
//! Runs an askpass helper once and prints the secret it produced

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use passask::{AskpassConfig, ConfigLoadOptions, ConfigLoader, SecretAsker, mask_secret};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Run an askpass helper once and print the secret
#[derive(Parser)]
#[command(name = "passask")]
#[command(version)]
#[command(about = "Run an askpass helper once and print the secret", long_about = None)]
struct Cli {
    /// Askpass command line (defaults to $SUDO_ASKPASS, $GIT_ASKPASS, $SSH_ASKPASS)
    #[arg(short, long)]
    command: Option<String>,

    /// Config file (defaults to ./.passask.yaml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Interpreter used to run the command line
    #[arg(long, value_name = "PATH")]
    shell: Option<PathBuf>,

    /// Print a masked form of the secret instead of the secret itself
    #[arg(long)]
    mask: bool,

    /// Strip a trailing newline from the secret
    #[arg(long)]
    trim: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the secret only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let env: HashMap<String, String> = env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect();
    let project_path = env::current_dir().context("failed to determine current directory")?;

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path,
        config_file: cli.config,
        cli_args: Some(AskpassConfig {
            shell: cli.shell,
            command: cli.command,
            ..Default::default()
        }),
        env: env.clone(),
    })
    .await?;

    let resolved = config.resolve_command(&env)?;
    debug!(source = ?resolved.source, "resolved askpass command");

    let asker = SecretAsker::with_shell(resolved.command_line, config.shell());

    match asker.secret().await {
        Ok(secret) => {
            let mut value = secret.expose_secret();
            if cli.trim {
                value = value
                    .strip_suffix('\n')
                    .map(|v| v.strip_suffix('\r').unwrap_or(v))
                    .unwrap_or(value);
            }

            let mut stdout = io::stdout().lock();
            if cli.mask {
                writeln!(stdout, "{}", mask_secret(value))?;
            } else {
                stdout.write_all(value.as_bytes())?;
            }
            stdout.flush()?;
            Ok(0)
        }
        Err(e) => {
            eprintln!("Failed to read a password");
            eprint!("{}", asker.diagnostic_output().await);
            eprintln!("{} [{}]", e, e.code());
            for other in asker.all_errors().iter().skip(1) {
                eprintln!("  also: {} [{}]", other, other.code());
            }
            for action in e.suggested_actions() {
                eprintln!("  - {}", action);
            }
            Ok(1)
        }
    }
}
