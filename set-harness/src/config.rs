//! Configuration of the `set` harness.
//!
//! Configuration is loaded from the following sources, later ones overriding earlier ones:
//!
//! 1. Defaults
//! 2. YAML configuration file (specified via `-c` or `--config`)
//! 3. Environment variables (prefixed with `SET__`)
//!
//! # Environment Variables
//!
//! Environment variables use `SET__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `SET__UNATTENDED=true` skips all confirmation prompts
//! - `SET__LOGGING__LEVEL=debug` raises the log verbosity
//! - `SET__LAYOUT__FUNCTIONS_DIR=/srv/functions` moves the platform build directories
//!
//! # YAML Configuration File
//!
//! ```yaml
//! unattended: true
//! workload: workloads/b0.yml
//!
//! logging:
//!   level: debug
//!   format: json
//!
//! layout:
//!   targets: [aws, ow]
//! ```
//!
//! The workload descriptor itself is a separate file, see [`crate::workload`].

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::deploy::TemplateLayout;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "SET__";

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  set_harness::deploy > deployed function
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2021-04-12T12:10:32Z INFO set_harness::deploy: deployed function
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::error::Error for FormatParseError {}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so exported plans can be piped from stdout.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence and allows per-module filters.
    ///
    /// # Default
    ///
    /// `INFO`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Harness configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Skip all confirmation prompts.
    ///
    /// # Default
    ///
    /// `false`
    pub unattended: bool,

    /// Workload descriptor used when a command does not name one.
    ///
    /// # Default
    ///
    /// `workloads/b0.yml`
    pub workload: PathBuf,

    /// Program that runs the build rules of a platform build directory.
    ///
    /// # Default
    ///
    /// `make`
    pub build_program: String,

    /// Locations of shared function sources and platform build directories.
    pub layout: TemplateLayout,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unattended: false,
            workload: PathBuf::from("workloads/b0.yml"),
            build_program: crate::deploy::DEFAULT_PROGRAM.to_owned(),
            layout: TemplateLayout::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert!(!config.unattended);
            assert_eq!(config.build_program, "make");
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);
            assert_eq!(config.layout.targets, ["aws", "ow", "gcf", "azf"]);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SET__UNATTENDED", "true");
            jail.set_env("SET__LOGGING__LEVEL", "debug");
            jail.set_env("SET__LOGGING__FORMAT", "json");
            jail.set_env("SET__LAYOUT__FUNCTIONS_DIR", "/srv/functions");

            let config = Config::load(None).unwrap();

            assert!(config.unattended);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);
            assert_eq!(config.layout.functions_dir, PathBuf::from("/srv/functions"));
            // untouched siblings keep their defaults
            assert_eq!(config.layout.workloads_dir, PathBuf::from("workloads"));

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload: workloads/io.yml
            build_program: gmake
            layout:
                targets: [aws, ow]
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("SET__BUILD_PROGRAM", "make");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.workload, PathBuf::from("workloads/io.yml"));
            assert_eq!(config.layout.targets, ["aws", "ow"]);
            // Env should overwrite the yaml config
            assert_eq!(config.build_program, "make");

            Ok(())
        });
    }

    #[test]
    fn invalid_log_format() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SET__LOGGING__FORMAT", "xml");
            assert!(Config::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn log_format_from_str() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("simplified"));
    }
}
