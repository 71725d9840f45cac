use std::fmt;
use std::sync::Arc;

use crate::config::HistoryConfig;
use crate::task::TaskInfo;

/// Decides which completed tasks are written to history
#[derive(Clone, Default)]
pub enum HistoryPolicy {
    Disabled,
    Always,
    /// URL or shortened URL must be non-empty
    #[default]
    RequireUrl,
    Custom(Arc<dyn Fn(&TaskInfo) -> bool + Send + Sync>),
}

impl HistoryPolicy {
    pub fn custom(predicate: impl Fn(&TaskInfo) -> bool + Send + Sync + 'static) -> Self {
        HistoryPolicy::Custom(Arc::new(predicate))
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        match (config.enabled, config.require_url) {
            (false, _) => HistoryPolicy::Disabled,
            (true, true) => HistoryPolicy::RequireUrl,
            (true, false) => HistoryPolicy::Always,
        }
    }

    pub fn should_record(&self, info: &TaskInfo) -> bool {
        match self {
            HistoryPolicy::Disabled => false,
            HistoryPolicy::Always => true,
            HistoryPolicy::RequireUrl => info.result.has_url() || info.result.has_shortened_url(),
            HistoryPolicy::Custom(predicate) => predicate(info),
        }
    }
}

impl fmt::Debug for HistoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryPolicy::Disabled => f.write_str("Disabled"),
            HistoryPolicy::Always => f.write_str("Always"),
            HistoryPolicy::RequireUrl => f.write_str("RequireUrl"),
            HistoryPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
