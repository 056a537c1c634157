//! Reader settings
//!
//! Presentation preferences that outlive a single book: a zoom level per
//! document format, the colour theme and the view mode. Persisted as one
//! JSON value in its own table, never inside book records.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::document::DocumentFormat;
use crate::error::{ReaderError, Result};
use crate::store::BookStore;

pub const MIN_SCALE: u16 = 50;
pub const MAX_SCALE: u16 = 200;
pub const SCALE_STEP: u16 = 10;
pub const DEFAULT_SCALE: u16 = 100;

const SETTINGS_KEY: &str = "reader";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Sepia,
    Cream,
    Night,
    Dark,
    Sage,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Light,
        Theme::Sepia,
        Theme::Cream,
        Theme::Night,
        Theme::Dark,
        Theme::Sage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Sepia => "sepia",
            Theme::Cream => "cream",
            Theme::Night => "night",
            Theme::Dark => "dark",
            Theme::Sage => "sage",
        }
    }
}

impl FromStr for Theme {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s)
            .ok_or_else(|| ReaderError::InvalidInput(format!("unknown theme '{}'", s)))
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How flow documents are laid out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Continuous vertical scroll
    #[default]
    Scrolled,
    /// One page per screen
    Single,
    /// Two-page spread
    Double,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Scrolled => "scrolled",
            ViewMode::Single => "single",
            ViewMode::Double => "double",
        }
    }
}

impl FromStr for ViewMode {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scrolled" => Ok(ViewMode::Scrolled),
            "single" => Ok(ViewMode::Single),
            "double" => Ok(ViewMode::Double),
            other => Err(ReaderError::InvalidInput(format!(
                "unknown view mode '{}'",
                other
            ))),
        }
    }
}

/// Explicit settings value handed to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    /// Font scale for flow documents, in percent
    pub flow_scale: u16,
    /// Zoom for fixed documents, in percent
    pub fixed_scale: u16,
    pub theme: Theme,
    pub view_mode: ViewMode,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            flow_scale: DEFAULT_SCALE,
            fixed_scale: DEFAULT_SCALE,
            theme: Theme::default(),
            view_mode: ViewMode::default(),
        }
    }
}

impl ReaderSettings {
    pub fn scale_for(&self, format: DocumentFormat) -> u16 {
        match format {
            DocumentFormat::Flow => self.flow_scale,
            DocumentFormat::Fixed => self.fixed_scale,
        }
    }

    /// Set the scale for `format`, clamped to `[MIN_SCALE, MAX_SCALE]`
    pub fn set_scale(&mut self, format: DocumentFormat, percent: u16) -> u16 {
        let percent = clamp_scale(percent);
        match format {
            DocumentFormat::Flow => self.flow_scale = percent,
            DocumentFormat::Fixed => self.fixed_scale = percent,
        }
        percent
    }

    pub fn increase_scale(&mut self, format: DocumentFormat) -> u16 {
        let next = self.scale_for(format).saturating_add(SCALE_STEP);
        self.set_scale(format, next)
    }

    pub fn decrease_scale(&mut self, format: DocumentFormat) -> u16 {
        let next = self.scale_for(format).saturating_sub(SCALE_STEP);
        self.set_scale(format, next)
    }

    /// Fixed documents always scroll; the mode only applies to flow documents
    pub fn view_mode_for(&self, format: DocumentFormat) -> ViewMode {
        match format {
            DocumentFormat::Flow => self.view_mode,
            DocumentFormat::Fixed => ViewMode::Scrolled,
        }
    }

    /// Clamp values that were stored out of range
    fn normalized(mut self) -> Self {
        self.flow_scale = clamp_scale(self.flow_scale);
        self.fixed_scale = clamp_scale(self.fixed_scale);
        self
    }
}

pub fn clamp_scale(percent: u16) -> u16 {
    percent.clamp(MIN_SCALE, MAX_SCALE)
}

/// Persists `ReaderSettings` next to the book table
#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    pub fn new(store: &BookStore) -> Self {
        Self {
            pool: store.pool().clone(),
        }
    }

    /// Stored settings, or defaults when none were saved
    ///
    /// An unreadable stored value is logged and replaced by defaults.
    pub async fn load(&self) -> Result<ReaderSettings> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM reader_settings WHERE key = ?")
                .bind(SETTINGS_KEY)
                .fetch_optional(&self.pool)
                .await?;

        let Some((json,)) = value else {
            return Ok(ReaderSettings::default());
        };

        match serde_json::from_str::<ReaderSettings>(&json) {
            Ok(settings) => Ok(settings.normalized()),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable reader settings");
                Ok(ReaderSettings::default())
            }
        }
    }

    pub async fn save(&self, settings: &ReaderSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO reader_settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(SETTINGS_KEY)
        .bind(&json)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(settings = %json, "Saved reader settings");
        Ok(())
    }
}
