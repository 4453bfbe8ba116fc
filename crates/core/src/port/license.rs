// License Port (plan entitlements)

/// License interface for plan-based entitlements
pub trait License: Send + Sync {
    /// Concurrent production executions allowed by the active plan.
    /// `-1` means unlimited.
    fn concurrency_production_limit(&self) -> i64;
}

/// License with a fixed entitlement (self-hosted and tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedLicense {
    production_limit: i64,
}

impl FixedLicense {
    pub fn new(production_limit: i64) -> Self {
        Self { production_limit }
    }

    pub fn unlimited() -> Self {
        Self::new(-1)
    }
}

impl License for FixedLicense {
    fn concurrency_production_limit(&self) -> i64 {
        self.production_limit
    }
}
