//! User settings for the studio surface.
//!
//! Settings are a small validated document served over the control API.
//! Field names stay camelCase on the wire to match the client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color theme for the studio UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Validation failures for a submitted settings document.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("Language code must be at least 2 characters")]
    LanguageTooShort,
}

/// User-facing studio settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// UI color theme
    #[serde(default)]
    pub theme: Theme,
    /// Whether the studio surfaces notifications
    #[serde(default = "default_notifications")]
    pub notifications_enabled: bool,
    /// ISO language code, at least two characters
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_notifications() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            notifications_enabled: default_notifications(),
            language: default_language(),
        }
    }
}

impl Settings {
    /// Validate a settings document before accepting it.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.language.chars().count() < 2 {
            return Err(SettingsError::LanguageTooShort);
        }
        Ok(())
    }
}
