//! Settings store: defaults, persistence and snapshots.

#![allow(clippy::unwrap_used)]

mod common;

use tekmart_core::ThemeMode;
use tekmart_store::settings::{DEFAULT_LANGUAGE, Settings};

use common::empty_store;

#[tokio::test]
async fn unset_settings_fall_back_to_documented_defaults() {
    let store = empty_store().await;
    let settings = store.settings();

    assert_eq!(settings.theme_mode().await, ThemeMode::System);
    assert_eq!(settings.language().await, DEFAULT_LANGUAGE);
    assert!(settings.notifications_enabled().await);
    assert_eq!(settings.snapshot().await, Settings::default());
}

#[tokio::test]
async fn written_settings_are_read_back() {
    let store = empty_store().await;
    let settings = store.settings();

    settings.set_theme_mode(ThemeMode::Dark).await.unwrap();
    settings.set_language("en").await.unwrap();
    settings.set_notifications_enabled(false).await.unwrap();

    assert_eq!(settings.theme_mode().await, ThemeMode::Dark);
    assert_eq!(settings.language().await, "en");
    assert!(!settings.notifications_enabled().await);

    let snapshot = settings.snapshot().await;
    assert_eq!(
        snapshot,
        Settings {
            theme_mode: ThemeMode::Dark,
            language: "en".to_owned(),
            notifications_enabled: false,
        }
    );
}

#[tokio::test]
async fn rewriting_a_setting_overwrites_it() {
    let store = empty_store().await;
    let settings = store.settings();

    settings.set_theme_mode(ThemeMode::Dark).await.unwrap();
    settings.set_theme_mode(ThemeMode::Light).await.unwrap();

    assert_eq!(settings.theme_mode().await, ThemeMode::Light);
}

#[tokio::test]
async fn one_setting_does_not_disturb_the_others() {
    let store = empty_store().await;
    let settings = store.settings();

    settings.set_language("en").await.unwrap();

    assert_eq!(settings.theme_mode().await, ThemeMode::System);
    assert!(settings.notifications_enabled().await);
}
