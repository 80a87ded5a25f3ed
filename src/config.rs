use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::admission::credentials::{DEFAULT_LOGIN_DOMAIN, DEFAULT_PROGRAM_TAG};
use crate::admission::registrar::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS};
use crate::admission::{CounterKey, RegistrarConfig};
use crate::store::{StoreConfig, DEFAULT_BUSY_TIMEOUT_MS};

/// Admission sidecar: reads JSON requests from stdin, one per line, and
/// answers each on stdout.
#[derive(Debug, Parser)]
#[command(name = "admissiond", version, about)]
pub struct Args {
    /// Workspace directory to open at startup.
    #[arg(long, env = "ADMISSIOND_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Prefix of every admission number.
    #[arg(long, env = "ADMISSIOND_PROGRAM_TAG", default_value = DEFAULT_PROGRAM_TAG)]
    pub program_tag: String,

    /// Domain of generated student login ids.
    #[arg(long, env = "ADMISSIOND_LOGIN_DOMAIN", default_value = DEFAULT_LOGIN_DOMAIN)]
    pub login_domain: String,

    /// Enrollment attempts before a conflict is reported.
    #[arg(
        long,
        env = "ADMISSIOND_MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    #[arg(long, env = "ADMISSIOND_RETRY_BACKOFF_MS", default_value_t = DEFAULT_RETRY_BACKOFF_MS)]
    pub retry_backoff_ms: u64,

    #[arg(long, env = "ADMISSIOND_BUSY_TIMEOUT_MS", default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub registrar: RegistrarConfig,
    pub store: StoreConfig,
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            registrar: RegistrarConfig {
                program_tag: self.program_tag.clone(),
                login_domain: self.login_domain.clone(),
                counter_key: CounterKey::admission(),
                max_attempts: self.max_attempts,
                retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            },
            store: StoreConfig {
                busy_timeout_ms: self.busy_timeout_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registrar_defaults() {
        let args = Args::try_parse_from(["admissiond"]).expect("parse");
        let settings = args.settings();
        assert_eq!(settings.registrar.program_tag, "APX2025");
        assert_eq!(settings.registrar.login_domain, "gmail.com");
        assert_eq!(settings.registrar.max_attempts, 5);
        assert_eq!(settings.registrar.counter_key, CounterKey::admission());
        assert_eq!(settings.store.busy_timeout_ms, 5_000);
        assert!(args.workspace.is_none());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        assert!(Args::try_parse_from(["admissiond", "--max-attempts", "0"]).is_err());
        let args = Args::try_parse_from([
            "admissiond",
            "--max-attempts",
            "40",
            "--program-tag",
            "APX2026",
        ])
        .expect("parse");
        assert_eq!(args.settings().registrar.max_attempts, 40);
        assert_eq!(args.settings().registrar.program_tag, "APX2026");
    }
}
