//! Configuration
//!
//! CLI arguments and environment variable handling using clap. The remote
//! backend is configured by the presence of a URL, not a flag: when
//! `--remote-url` is unset no remote capability is constructed and the
//! controller runs demo-only with zero remote calls.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::store::remote::{HttpRemote, RemoteBackend};

#[derive(Parser, Debug, Clone)]
#[command(name = "lamad")]
#[command(about = "Progress tracking and identity core for the learning site")]
pub struct Args {
    /// Directory holding the local progress database
    #[arg(long, env = "LAMAD_DATA_DIR", default_value = ".lamad")]
    pub data_dir: PathBuf,

    /// Base URL of the remote progress backend (e.g. "https://api.example.com").
    /// Leave unset for demo-only operation.
    #[arg(long, env = "LAMAD_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Identity watch poll interval in seconds
    #[arg(long, env = "LAMAD_REMOTE_POLL_SECS", default_value = "30")]
    pub remote_poll_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Build the remote capability, present only when a URL is configured.
    pub fn remote(&self) -> Option<Arc<dyn RemoteBackend>> {
        self.remote_url
            .as_deref()
            .map(|url| Arc::new(HttpRemote::new(url)) as Arc<dyn RemoteBackend>)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.remote_poll_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.remote_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("LAMAD_REMOTE_URL must be an http(s) URL, got {url}"));
            }
        }
        if self.remote_poll_secs == 0 {
            return Err("LAMAD_REMOTE_POLL_SECS must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["lamad"]).unwrap();
        assert!(args.remote_url.is_none());
        assert!(args.remote().is_none());
        assert_eq!(args.remote_poll_secs, 30);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_remote_capability_present_when_configured() {
        let args =
            Args::try_parse_from(["lamad", "--remote-url", "https://api.example.com"]).unwrap();
        assert!(args.remote().is_some());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_url() {
        let args = Args::try_parse_from(["lamad", "--remote-url", "ftp://x"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let args = Args::try_parse_from(["lamad", "--remote-poll-secs", "0"]).unwrap();
        assert!(args.validate().is_err());
    }
}
