use thiserror::Error;

/// Failure to load backend settings
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required setting '{setting_name}' is missing")]
    MissingSetting { setting_name: String },

    #[error("Invalid setting '{setting_name}': {reason}")]
    InvalidSetting { setting_name: String, reason: String },
}

impl ConfigError {
    pub fn missing(setting_name: impl Into<String>) -> Self {
        Self::MissingSetting {
            setting_name: setting_name.into(),
        }
    }

    pub fn invalid(setting_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            setting_name: setting_name.into(),
            reason: reason.into(),
        }
    }
}
