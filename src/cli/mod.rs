//! Command-line interface for dataformat
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Translating `export` arguments into export request parameters

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};
use crate::export::RequestParams;

/// Export search results as CSV, Excel, JSON or GeoJSON
#[derive(Parser, Debug)]
#[command(
    name = "dataformat",
    version,
    about = "Streaming export of search results",
    long_about = "Exports the hits of a search, page by page, into a single CSV, Excel, bulk JSON,
JSON array or GeoJSON file."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for dataformat
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the hits of an NDJSON data set
    Export {
        /// NDJSON file with one hit or source document per line
        #[arg(short = 'i', long, value_name = "FILE")]
        input: PathBuf,

        /// Index the loaded documents belong to
        #[arg(long, value_name = "NAME", default_value = "dataset0")]
        index: String,

        /// Output format (csv, xls, xlsx, json, jsonlist, geojson)
        #[arg(short = 'f', long, value_name = "FORMAT")]
        format: String,

        /// Write into this file instead of a timestamped file in the working directory
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Search body (JSON) read from a file
        #[arg(long, value_name = "FILE")]
        body: Option<PathBuf>,

        /// Extra request parameter, e.g. `-p csv.separator=;`
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Show version information
    Version,

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Parse a `key=value` argument
fn parse_param(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the parsed arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Handle the informational subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if the subcommand was handled, false for `export`
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                println!("dataformat version {}", env!("CARGO_PKG_VERSION"));
                println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
                Ok(true)
            }
            Commands::Config { show, validate } => {
                if *validate {
                    self.validate_config_file();
                }
                if *show {
                    self.show_config();
                }
                Ok(true)
            }
            Commands::Export { .. } => Ok(false),
        }
    }

    /// Build the export request for the `export` subcommand
    ///
    /// `--output` selects file mode; any `-p` parameter overrides the
    /// dedicated flags.
    ///
    /// # Returns
    /// * `Result<RequestParams>` - Request parameters, or an error for other subcommands
    pub fn export_params(&self) -> Result<RequestParams> {
        let Commands::Export {
            index,
            format,
            output,
            body,
            params,
            ..
        } = &self.args.command
        else {
            return Err(ConfigError::InvalidValue {
                field: "command".to_string(),
                value: "not an export".to_string(),
            }
            .into());
        };

        let mut request = RequestParams::new()
            .with_param("format", format)
            .with_param("index", index);
        if let Some(output) = output {
            request.insert("file", absolute(output)?.display().to_string());
        }
        if let Some(body) = body {
            request = request.with_body(std::fs::read_to_string(body)?);
        }
        for (key, value) in params {
            request.insert(key, value);
        }
        Ok(request)
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist");
            return;
        }

        match Config::load_from_file(Some(&path)) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) {
        println!("Configuration file: {}", self.config_path().display());
        println!();

        match self.config.to_toml() {
            Ok(toml_str) => println!("{}", toml_str),
            Err(e) => {
                eprintln!("Error formatting configuration: {}", e);
                println!("{:#?}", self.config);
            }
        }
    }

    /// Get configuration file path (from args or default)
    fn config_path(&self) -> PathBuf {
        self.args.config_file.clone().unwrap_or_else(Config::default_path)
    }
}

/// Resolve `path` against the working directory
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliInterface {
        let args = CliArgs::try_parse_from(args).unwrap();
        CliInterface {
            args,
            config: Config::default(),
        }
    }

    #[test]
    fn test_export_args() {
        let cli = cli(&[
            "dataformat",
            "export",
            "-i",
            "data.ndjson",
            "-f",
            "csv",
            "-p",
            "csv.separator=;",
            "-p",
            "fl=a,b",
        ]);

        let params = cli.export_params().unwrap();
        assert_eq!(params.param("format"), Some("csv"));
        assert_eq!(params.param("index"), Some("dataset0"));
        assert_eq!(params.param("csv.separator"), Some(";"));
        assert_eq!(params.param("fl"), Some("a,b"));
        assert_eq!(params.param("file"), None);
    }

    #[test]
    fn test_output_becomes_absolute_file() {
        let cli = cli(&["dataformat", "export", "-i", "d.ndjson", "-f", "json", "-o", "out.json"]);
        let params = cli.export_params().unwrap();
        assert!(Path::new(params.param("file").unwrap()).is_absolute());
    }

    #[test]
    fn test_invalid_param() {
        let args = ["dataformat", "export", "-i", "d", "-f", "csv", "-p", "novalue"];
        assert!(CliArgs::try_parse_from(args).is_err());
        assert!(parse_param("=x").is_err());
        assert_eq!(parse_param("q=a:b=c").unwrap(), ("q".to_string(), "a:b=c".to_string()));
    }

    #[test]
    fn test_informational_subcommands() {
        let cli = cli(&["dataformat", "version"]);
        assert!(cli.handle_subcommand().unwrap());
        assert!(cli.export_params().is_err());
    }
}
