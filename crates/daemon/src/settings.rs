//! Daemon settings, read from `FLOWGATE_*` environment variables
//!
//! | variable | default |
//! |----------|---------|
//! | `FLOWGATE_PRODUCTION_LIMIT` | `-1` (unlimited) |
//! | `FLOWGATE_DEPLOYMENT_TYPE` | `default` (`cloud`) |
//! | `FLOWGATE_EXECUTIONS_MODE` | `regular` (`queue`) |
//! | `FLOWGATE_CLOUD_OVERRIDE_PRODUCTION_LIMIT` | `false` |
//! | `FLOWGATE_LICENSE_PRODUCTION_LIMIT` | `-1` |
//! | `FLOWGATE_DB_PATH` | `~/.flowgate/executions.db` |
//! | `FLOWGATE_LOG_FORMAT` | `pretty` (`json`) |
//! | `FLOWGATE_LOG_DIR` | unset (no file logging) |

use config::{Config, ConfigError, Environment};
use flowgate_core::{ConcurrencyConfig, DeploymentType, ExecutionsBackend, UNLIMITED};
use serde::Deserialize;
use std::collections::HashMap;

const ENV_PREFIX: &str = "FLOWGATE";
const DEFAULT_DB_PATH: &str = "~/.flowgate/executions.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub production_limit: i64,
    pub deployment_type: DeploymentType,
    pub executions_mode: ExecutionsBackend,
    pub cloud_override_production_limit: bool,
    pub license_production_limit: i64,
    pub db_path: String,
    pub log_format: LogFormat,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Read settings from `vars` instead of the process environment when given
    pub fn load_from(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("production_limit", UNLIMITED)?
            .set_default("deployment_type", "default")?
            .set_default("executions_mode", "regular")?
            .set_default("cloud_override_production_limit", false)?
            .set_default("license_production_limit", UNLIMITED)?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("log_format", "pretty")?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()
    }

    pub fn concurrency(&self) -> ConcurrencyConfig {
        ConcurrencyConfig {
            production_limit: self.production_limit,
            deployment_type: self.deployment_type,
            executions_backend: self.executions_mode,
            cloud_override_production_limit: self.cloud_override_production_limit,
        }
    }

    /// `db_path` with `~` expanded
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.db_path).into_owned()
    }
}
