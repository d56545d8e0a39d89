mod defaults;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use defaults::*;
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::ScpgateError;

/// Settings for the remote-copy interceptor.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, clap::Args)]
pub struct ScpCaptureConfig {
    /// Directory to store files from scp
    #[arg(long = "scp-storage", value_name = "DIR")]
    pub storage_path: PathBuf,

    /// Delay between two polls of an idle relay
    #[serde(default = "_default_poll_interval", with = "humantime_serde")]
    #[arg(
        long = "scp-poll-interval",
        value_name = "DURATION",
        default_value = "100ms",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,

    /// Maximum number of bytes read from a channel per poll
    #[serde(default = "_default_buffer_size")]
    #[arg(long = "scp-buffer-size", value_name = "BYTES", default_value_t = 1024)]
    pub buffer_size: usize,

    /// Restrict the capture directory to the owner when creating it
    #[serde(default = "_default_true")]
    #[arg(skip = true)]
    pub secure_storage: bool,
}

impl ScpCaptureConfig {
    pub fn new<P: Into<PathBuf>>(storage_path: P) -> Self {
        Self {
            storage_path: storage_path.into(),
            poll_interval: _default_poll_interval(),
            buffer_size: _default_buffer_size(),
            secure_storage: _default_true(),
        }
    }

    pub fn validate(&self) -> Result<(), ScpgateError> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ScpgateError::InvalidConfig(
                "scp storage path must not be empty".to_owned(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ScpgateError::InvalidConfig(
                "scp buffer size must be greater than zero".to_owned(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ScpgateError::InvalidConfig(
                "scp poll interval must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<ScpCaptureConfig, ScpgateError> {
    let config: ScpCaptureConfig = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix("SCPGATE"))
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;

    config.validate()?;

    info!(
        "Using config: {path:?} (storage: {:?}, poll interval: {:?})",
        config.storage_path, config.poll_interval,
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[derive(clap::Parser)]
    struct Cli {
        #[command(flatten)]
        scp: ScpCaptureConfig,
    }

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scpgate.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_config_with_defaults() {
        let (_dir, path) = write_config("storage_path: /var/lib/scpgate\n");

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/scpgate"));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.buffer_size, 1024);
        assert!(config.secure_storage);
    }

    #[test]
    fn test_load_config_overrides() {
        let (_dir, path) = write_config(
            "storage_path: ./captures\npoll_interval: 250ms\nbuffer_size: 4096\nsecure_storage: false\n",
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.buffer_size, 4096);
        assert!(!config.secure_storage);
    }

    #[test]
    fn test_load_config_requires_storage_path() {
        let (_dir, path) = write_config("buffer_size: 4096\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let mut config = ScpCaptureConfig::new("/tmp/scp");
        config.buffer_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ScpgateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "scpgate",
            "--scp-storage",
            "/srv/captures",
            "--scp-poll-interval",
            "50ms",
        ])
        .unwrap();
        assert_eq!(cli.scp.storage_path, PathBuf::from("/srv/captures"));
        assert_eq!(cli.scp.poll_interval, Duration::from_millis(50));
        assert_eq!(cli.scp.buffer_size, 1024);
        assert!(cli.scp.secure_storage);
    }

    #[test]
    fn test_cli_requires_storage() {
        assert!(Cli::try_parse_from(["scpgate"]).is_err());
    }
}
