//! designer-cmd — command-line front end for platform executable resolution
//! and process control.
//!
//! Subcommands:
//! - `designer-cmd resolve`: print the path of an installed designer or rac executable
//! - `designer-cmd versions`: list installed platform versions, newest first
//! - `designer-cmd run`: run an executable with timeout-kill and print its output
//! - `designer-cmd ps`: list running platform processes, optionally terminating matches
//! - `designer-cmd kill`: terminate a process by pid

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use designer_cmd::exec::encoding_for_label;
use designer_cmd::{
    platform_processes, terminate, terminate_matching, DesignerConfig, PlatformVersion,
    ProcessRunner,
};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE_NAME: &str = "designer-cmd.toml";

/// designer-cmd — locate and run platform command-line executables.
#[derive(Parser)]
#[command(
    name = "designer-cmd",
    version,
    about = "designer-cmd — locate and run platform command-line executables"
)]
struct Cli {
    /// Path to designer-cmd.toml [default: ./designer-cmd.toml or ~/.config/designer-cmd/designer-cmd.toml]
    /// Must come before the subcommand, so `run` can pass `-c` through to the child.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Binary {
    /// bin/1cv8.exe
    Designer,
    /// bin/rac.exe
    Rac,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the path of an installed platform executable
    Resolve {
        /// Platform version; empty or omitted means the configured or newest version
        #[arg(long = "platform-version")]
        platform_version: Option<String>,
        /// Which executable to resolve
        #[arg(long, value_enum, default_value = "designer")]
        binary: Binary,
    },
    /// List installed platform versions, newest first
    Versions {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run an executable and print its captured output
    Run {
        /// Timeout in seconds [default: execution.timeout_secs from config]
        #[arg(long)]
        timeout: Option<u64>,
        /// Output encoding label, e.g. cp866 or utf-8 [default: execution.encoding or the console code page]
        #[arg(long)]
        encoding: Option<String>,
        /// Start the process and return without waiting
        #[arg(long)]
        detach: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Executable followed by its arguments, passed verbatim
        #[arg(
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "EXECUTABLE [ARGS]"
        )]
        command: Vec<String>,
    },
    /// List running platform processes
    Ps {
        /// Only processes whose command line contains this text (repeatable, all must match)
        #[arg(long = "match")]
        needles: Vec<String>,
        /// Terminate the matching processes
        #[arg(long)]
        kill: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Terminate a process by pid
    Kill { pid: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with env filter (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match resolve_config(cli.config) {
        Some(path) => load_config(&path).await?,
        None => DesignerConfig::default(),
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    match cli.command {
        Commands::Resolve {
            platform_version,
            binary,
        } => run_resolve(&config, platform_version, binary)?,
        Commands::Versions { json } => run_versions(&config, json)?,
        Commands::Run {
            timeout,
            encoding,
            detach,
            json,
            command,
        } => {
            let Some((executable, args)) = command.split_first() else {
                anyhow::bail!("No executable given");
            };
            let runner = match encoding {
                Some(label) => ProcessRunner::with_encoding(
                    encoding_for_label(&label)
                        .ok_or_else(|| anyhow::anyhow!("Unknown encoding '{}'", label))?,
                ),
                None => config.runner()?,
            };
            let timeout = timeout.map(Duration::from_secs).unwrap_or_else(|| config.timeout());
            let code = run_command(&runner, timeout, detach, json, Path::new(executable), args).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Ps {
            needles,
            kill,
            json,
        } => run_ps(&needles, kill, json)?,
        Commands::Kill { pid } => {
            terminate(pid)?;
            println!("terminated {}", pid);
        }
    }

    Ok(())
}

fn run_resolve(config: &DesignerConfig, platform_version: Option<String>, binary: Binary) -> Result<()> {
    let version: PlatformVersion = match platform_version {
        Some(v) => v.parse()?,
        None => config.version()?,
    };
    let locator = config.locator()?;
    let path = match binary {
        Binary::Designer => locator.designer_path(&version)?,
        Binary::Rac => locator.rac_path(&version)?,
    };
    println!("{}", path.display());
    Ok(())
}

fn run_versions(config: &DesignerConfig, json: bool) -> Result<()> {
    let versions = config.locator()?.installed_versions()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
    } else {
        for version in versions {
            println!("{}", version);
        }
    }
    Ok(())
}

/// Run a single executable; returns the exit code to propagate.
async fn run_command(
    runner: &ProcessRunner,
    timeout: Duration,
    detach: bool,
    json: bool,
    executable: &Path,
    args: &[String],
) -> Result<i32> {
    let result = runner.run(executable, args, Some(timeout), !detach).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.is_success() {
        if !result.message.is_empty() {
            println!("{}", result.message);
        }
    } else if !result.message.is_empty() {
        eprintln!("{}", result.message);
    }
    Ok(result.status.exit_code())
}

fn run_ps(needles: &[String], kill: bool, json: bool) -> Result<()> {
    let needle_refs: Vec<&str> = needles.iter().map(String::as_str).collect();
    let matching: Vec<_> = platform_processes()
        .into_iter()
        .filter(|handle| handle.command_line_contains_all(&needle_refs))
        .collect();

    if kill {
        let terminated = terminate_matching(&matching, &needle_refs);
        tracing::info!(matched = matching.len(), terminated = terminated, "terminated matching processes");
        println!("terminated {} of {} processes", terminated, matching.len());
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&matching)?);
    } else {
        for handle in &matching {
            println!("{}\t{}", handle.pid, handle.command_line);
        }
    }
    Ok(())
}

/// Resolve config file path: explicit flag → ./designer-cmd.toml → ~/.config/designer-cmd/designer-cmd.toml.
///
/// `None` means run with defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path);
    }

    let local = Path::new(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local.to_path_buf());
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join("designer-cmd").join(CONFIG_FILE_NAME);
        if user.exists() {
            return Some(user);
        }
    }

    tracing::debug!("no config file found, using defaults");
    None
}

/// Load and parse a designer-cmd.toml config file.
async fn load_config(config_path: &Path) -> Result<DesignerConfig> {
    let content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", config_path, e))?;
    let config = DesignerConfig::from_toml_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file {:?}: {}", config_path, e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_command_of(cli: Cli) -> Vec<String> {
        match cli.command {
            Commands::Run { command, .. } => command,
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_run_passes_short_flags_to_child() {
        let cli = Cli::try_parse_from([
            "designer-cmd",
            "run",
            "sh",
            "-c",
            "echo err >&2; exit 4",
        ])
        .unwrap();
        assert!(cli.config.is_none());
        assert_eq!(run_command_of(cli), vec!["sh", "-c", "echo err >&2; exit 4"]);
    }

    #[test]
    fn test_run_flags_after_executable_belong_to_child() {
        let cli = Cli::try_parse_from([
            "designer-cmd",
            "-c",
            "custom.toml",
            "run",
            "--timeout",
            "5",
            "1cv8.exe",
            "DESIGNER",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Run {
                timeout,
                json,
                command,
                ..
            } => {
                assert_eq!(timeout, Some(5));
                assert!(!json);
                assert_eq!(command, vec!["1cv8.exe", "DESIGNER", "--json"]);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_run_requires_executable() {
        assert!(Cli::try_parse_from(["designer-cmd", "run"]).is_err());
    }
}
