// Concurrency configuration

use crate::port::License;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sentinel production limit meaning "no cap"
pub const UNLIMITED: i64 = -1;

/// Where this instance is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    #[default]
    Default,
    Cloud,
}

/// How executions are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionsBackend {
    /// Executions run in this process
    #[default]
    Regular,
    /// A message-queue worker pool runs executions and enforces its own concurrency
    Queue,
}

/// Settings read once when the concurrency control service is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Max concurrent production executions, `-1` for unlimited
    pub production_limit: i64,
    pub deployment_type: DeploymentType,
    pub executions_backend: ExecutionsBackend,
    /// Cloud only: keep `production_limit` instead of the license entitlement
    pub cloud_override_production_limit: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            production_limit: UNLIMITED,
            deployment_type: DeploymentType::Default,
            executions_backend: ExecutionsBackend::Regular,
            cloud_override_production_limit: false,
        }
    }
}

impl ConcurrencyConfig {
    pub fn with_production_limit(production_limit: i64) -> Self {
        Self {
            production_limit,
            ..Default::default()
        }
    }

    /// Pick the configured or licensed limit.
    ///
    /// The value is not validated here; `0` and values below `-1` are handled
    /// by the service.
    pub fn resolve_production_limit(&self, license: &dyn License) -> i64 {
        match self.deployment_type {
            DeploymentType::Cloud if !self.cloud_override_production_limit => {
                license.concurrency_production_limit()
            }
            _ => self.production_limit,
        }
    }
}

/// Reject `0`, clamp anything below `-1` to unlimited
pub(crate) fn normalize_production_limit(limit: i64) -> crate::Result<i64> {
    if limit == 0 {
        return Err(crate::AppError::InvalidConcurrencyCap(limit));
    }

    if limit < UNLIMITED {
        warn!(
            configured = limit,
            "Production concurrency limit below -1, treating as unlimited"
        );
        return Ok(UNLIMITED);
    }

    Ok(limit)
}
