//! Server configuration (spec.md §4.7 / SPEC_FULL.md).
//!
//! Assembled in increasing precedence: built-in defaults, a `key=value` config file (`--config`),
//! then CLI flags — using `clap`'s derive API the way the teacher's demo binaries build their
//! `Args` (`demos/hello.rs`, `demos/common/args.rs`) and the way `nfs-mamont`'s own server binary
//! parses its own listen address and thread count.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::ServerError;
use crate::store::ReplacementPolicy;
use crate::wire::{MAX_CHARACTERS, MAX_PATHNAME};

/// Default number of worker threads when neither the config file nor a CLI flag sets one.
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_MAX_FILES: u64 = 64;
const DEFAULT_MAX_BYTES: u64 = 16 * 1024 * 1024;
const DEFAULT_SOCKET_PATH: &str = "/tmp/fcached.sock";
const DEFAULT_LOG_PATH: &str = "/tmp/fcached.ops.log";

/// CLI flags. Every field is optional here; `ServerConfig::load` fills gaps from the config
/// file, then built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(version, author, about = "In-memory multi-client file storage cache server")]
pub struct CliArgs {
    /// Path to a `key=value` configuration file.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Filesystem path of the listening stream socket.
    #[clap(long)]
    pub socket_path: Option<PathBuf>,

    /// Maximum number of files held in the cache at once.
    #[clap(long)]
    pub max_files: Option<u64>,

    /// Maximum total bytes held in the cache at once.
    #[clap(long)]
    pub max_bytes: Option<u64>,

    /// Number of worker threads servicing client requests.
    #[clap(long)]
    pub workers: Option<usize>,

    /// Path to the append-only operation log.
    #[clap(long)]
    pub log_path: Option<PathBuf>,

    /// Eviction replacement policy: `LRU` or `FIFO`.
    #[clap(long)]
    pub replacement_policy: Option<ReplacementPolicy>,

    /// Effective pathname length limit, narrower than the physical wire bound if set.
    #[clap(long)]
    pub max_pathname: Option<usize>,

    /// Effective content length limit, narrower than the physical wire bound if set.
    #[clap(long)]
    pub max_characters: Option<usize>,
}

/// The subset of fields a config file may set. Every field is optional so a file can set as
/// few or as many as it likes; unset fields fall through to CLI flags, then defaults.
#[derive(Deserialize, Default, Debug)]
struct FileConfig {
    socket_path: Option<PathBuf>,
    max_files: Option<u64>,
    max_bytes: Option<u64>,
    workers: Option<usize>,
    log_path: Option<PathBuf>,
    replacement_policy: Option<String>,
    max_pathname: Option<usize>,
    max_characters: Option<usize>,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    pub max_files: u64,
    pub max_bytes: u64,
    pub workers: usize,
    pub log_path: PathBuf,
    pub replacement_policy: ReplacementPolicy,
    pub max_pathname: usize,
    pub max_characters: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            max_files: DEFAULT_MAX_FILES,
            max_bytes: DEFAULT_MAX_BYTES,
            workers: DEFAULT_WORKERS,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            replacement_policy: ReplacementPolicy::default(),
            max_pathname: MAX_PATHNAME,
            max_characters: MAX_CHARACTERS,
        }
    }
}

impl ServerConfig {
    /// Parse CLI flags, load the config file they name (if any), and merge with defaults at
    /// increasing precedence: defaults < file < CLI flags.
    pub fn load_from_args() -> Result<Self, ServerError> {
        let args = CliArgs::parse();
        Self::load(args)
    }

    pub fn load(args: CliArgs) -> Result<Self, ServerError> {
        let mut config = ServerConfig::default();

        if let Some(path) = &args.config {
            let file = read_file_config(path)?;
            apply_file(&mut config, file)?;
        }
        apply_cli(&mut config, args);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.max_files == 0 {
            return Err(ServerError::Config("max_files must be at least 1".into()));
        }
        if self.max_bytes == 0 {
            return Err(ServerError::Config("max_bytes must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ServerError::Config("workers must be at least 1".into()));
        }
        if self.max_pathname > MAX_PATHNAME {
            return Err(ServerError::Config(format!(
                "max_pathname cannot exceed the physical wire bound of {MAX_PATHNAME}"
            )));
        }
        if self.max_characters > MAX_CHARACTERS {
            return Err(ServerError::Config(format!(
                "max_characters cannot exceed the physical wire bound of {MAX_CHARACTERS}"
            )));
        }
        let socket_path_len = self.socket_path.as_os_str().len();
        if socket_path_len == 0 || socket_path_len > 108 {
            return Err(ServerError::Config(
                "socket_path must be non-empty and at most 108 bytes (UNIX_PATH_MAX)".into(),
            ));
        }
        Ok(())
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ServerError> {
    let text = fs::read_to_string(path)
        .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| ServerError::Config(format!("parsing {}: {e}", path.display())))
}

fn apply_file(config: &mut ServerConfig, file: FileConfig) -> Result<(), ServerError> {
    if let Some(v) = file.socket_path {
        config.socket_path = v;
    }
    if let Some(v) = file.max_files {
        config.max_files = v;
    }
    if let Some(v) = file.max_bytes {
        config.max_bytes = v;
    }
    if let Some(v) = file.workers {
        config.workers = v;
    }
    if let Some(v) = file.log_path {
        config.log_path = v;
    }
    if let Some(v) = file.replacement_policy {
        config.replacement_policy = v
            .parse()
            .map_err(|e: String| ServerError::Config(format!("replacement_policy: {e}")))?;
    }
    if let Some(v) = file.max_pathname {
        config.max_pathname = v;
    }
    if let Some(v) = file.max_characters {
        config.max_characters = v;
    }
    Ok(())
}

fn apply_cli(config: &mut ServerConfig, args: CliArgs) {
    if let Some(v) = args.socket_path {
        config.socket_path = v;
    }
    if let Some(v) = args.max_files {
        config.max_files = v;
    }
    if let Some(v) = args.max_bytes {
        config.max_bytes = v;
    }
    if let Some(v) = args.workers {
        config.workers = v;
    }
    if let Some(v) = args.log_path {
        config.log_path = v;
    }
    if let Some(v) = args.replacement_policy {
        config.replacement_policy = v;
    }
    if let Some(v) = args.max_pathname {
        config.max_pathname = v;
    }
    if let Some(v) = args.max_characters {
        config.max_characters = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_overrides_defaults() {
        let mut config = ServerConfig::default();
        apply_file(
            &mut config,
            FileConfig { max_files: Some(10), workers: Some(2), ..Default::default() },
        )
        .unwrap();
        assert_eq!(config.max_files, 10);
        assert_eq!(config.workers, 2);

        apply_cli(
            &mut config,
            CliArgs { max_files: Some(20), ..Default::default() },
        );
        assert_eq!(config.max_files, 20, "CLI flag must win over the file value");
        assert_eq!(config.workers, 2, "unset CLI flags must not clobber the file value");
    }

    #[test]
    fn invalid_replacement_policy_is_a_config_error() {
        let mut config = ServerConfig::default();
        let err = apply_file(
            &mut config,
            FileConfig { replacement_policy: Some("RANDOM".into()), ..Default::default() },
        )
        .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn zero_max_files_is_rejected() {
        let mut config = ServerConfig::default();
        config.max_files = 0;
        assert!(config.validate().is_err());
    }
}
