//! Durable key-value preferences.
//!
//! Settings live in their own table, independent of the entity stores.
//! Reads never fail the caller: a storage or parse failure is logged and
//! the documented default is returned instead. Writes are durable before
//! they report completion.

use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;

use tekmart_core::ThemeMode;

use crate::db::events::{self, ChangeNotifier, Table};
use crate::db::StoreError;

const KEY_THEME_MODE: &str = "theme_mode";
const KEY_LANGUAGE: &str = "language";
const KEY_NOTIFICATIONS: &str = "notifications_enabled";

/// Interface language used when none is stored.
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Snapshot of all preferences, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Display theme. Default: follow the platform.
    pub theme_mode: ThemeMode,
    /// Interface language tag. Default: `"ru"`.
    pub language: String,
    /// Whether notifications are enabled. Default: on.
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::System,
            language: DEFAULT_LANGUAGE.to_owned(),
            notifications_enabled: true,
        }
    }
}

/// Durable settings store.
pub struct SettingsStore<'a> {
    pool: &'a SqlitePool,
    events: &'a ChangeNotifier,
}

impl<'a> SettingsStore<'a> {
    pub(crate) const fn new(pool: &'a SqlitePool, events: &'a ChangeNotifier) -> Self {
        Self { pool, events }
    }

    /// Current theme mode, or the default on any read failure.
    pub async fn theme_mode(&self) -> ThemeMode {
        read_or_default(self.pool, KEY_THEME_MODE)
            .await
            .unwrap_or_default()
    }

    /// Persist the theme mode.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails; nothing is stored.
    pub async fn set_theme_mode(&self, mode: ThemeMode) -> Result<(), StoreError> {
        self.set_value(KEY_THEME_MODE, &serde_json::json!(mode)).await
    }

    /// Current interface language, or `"ru"` on any read failure.
    pub async fn language(&self) -> String {
        read_or_default(self.pool, KEY_LANGUAGE)
            .await
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned())
    }

    /// Persist the interface language.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails; nothing is stored.
    pub async fn set_language(&self, language: &str) -> Result<(), StoreError> {
        self.set_value(KEY_LANGUAGE, &serde_json::json!(language)).await
    }

    /// Whether notifications are enabled, or `true` on any read failure.
    pub async fn notifications_enabled(&self) -> bool {
        read_or_default(self.pool, KEY_NOTIFICATIONS)
            .await
            .unwrap_or(true)
    }

    /// Persist the notifications toggle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the write fails; nothing is stored.
    pub async fn set_notifications_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.set_value(KEY_NOTIFICATIONS, &serde_json::json!(enabled))
            .await
    }

    /// Snapshot of all preferences with defaults filled in. Never fails.
    pub async fn snapshot(&self) -> Settings {
        fetch_snapshot(self.pool).await
    }

    /// Live stream of the settings snapshot.
    #[must_use]
    pub fn watch(&self) -> BoxStream<'static, Result<Settings, StoreError>> {
        let pool = self.pool.clone();
        events::live(self.events, &[Table::Settings], move || {
            let pool = pool.clone();
            async move { Ok(fetch_snapshot(&pool).await) }
        })
    }

    async fn set_value(&self, key: &str, value: &JsonValue) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(chrono::Utc::now())
        .execute(self.pool)
        .await?;

        self.events.notify(Table::Settings);
        Ok(())
    }
}

async fn fetch_snapshot(pool: &SqlitePool) -> Settings {
    let defaults = Settings::default();

    Settings {
        theme_mode: read_or_default(pool, KEY_THEME_MODE)
            .await
            .unwrap_or(defaults.theme_mode),
        language: read_or_default(pool, KEY_LANGUAGE)
            .await
            .unwrap_or(defaults.language),
        notifications_enabled: read_or_default(pool, KEY_NOTIFICATIONS)
            .await
            .unwrap_or(defaults.notifications_enabled),
    }
}

/// Read and decode one setting; any failure is logged and yields `None`.
async fn read_or_default<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> Option<T> {
    let raw: Option<String> =
        match sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "settings read failed, using default");
                return None;
            }
        };

    let raw = raw?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "stored setting is invalid, using default");
            None
        }
    }
}
