use super::*;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_guard() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// # Safety
/// Callers hold `env_guard()` so no other test mutates the environment concurrently.
unsafe fn clear_client_env() {
    unsafe {
        std::env::remove_var("GENCLIENT_BASE_URL");
        std::env::remove_var("GENCLIENT_MODE");
        std::env::remove_var("GENCLIENT_REFRESH_DEBOUNCE_MS");
        std::env::remove_var("GENCLIENT_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("GENCLIENT_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("GENCLIENT_CREDENTIALS_PATH");
    }
}

#[test]
fn from_env_defaults() {
    let _env = env_guard();
    unsafe { clear_client_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.mode, Mode::Chat);
    assert_eq!(cfg.refresh_debounce_ms, DEFAULT_REFRESH_DEBOUNCE_MS);
    assert_eq!(cfg.timeouts, Timeouts::default());
}

#[test]
fn from_env_parses_overrides() {
    let _env = env_guard();
    unsafe {
        clear_client_env();
        std::env::set_var("GENCLIENT_BASE_URL", "https://example.test/v1/");
        std::env::set_var("GENCLIENT_MODE", "Image");
        std::env::set_var("GENCLIENT_REFRESH_DEBOUNCE_MS", "250");
        std::env::set_var("GENCLIENT_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("GENCLIENT_CONNECT_TIMEOUT_SECS", "7");
        std::env::set_var("GENCLIENT_CREDENTIALS_PATH", "/tmp/genclient-test/key.json");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://example.test/v1");
    assert_eq!(cfg.mode, Mode::Image);
    assert_eq!(cfg.refresh_debounce_ms, 250);
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.credentials_path, Some(PathBuf::from("/tmp/genclient-test/key.json")));

    unsafe { clear_client_env() };
}

#[test]
fn from_env_unknown_mode_errors() {
    let _env = env_guard();
    unsafe {
        clear_client_env();
        std::env::set_var("GENCLIENT_MODE", "video");
    }

    let err = ClientConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("unknown mode"));

    unsafe { clear_client_env() };
}

#[test]
fn from_env_bad_number_falls_back_to_default() {
    let _env = env_guard();
    unsafe {
        clear_client_env();
        std::env::set_var("GENCLIENT_REFRESH_DEBOUNCE_MS", "soon");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.refresh_debounce_ms, DEFAULT_REFRESH_DEBOUNCE_MS);

    unsafe { clear_client_env() };
}

#[test]
fn mode_round_trips_through_display() {
    for mode in [Mode::Chat, Mode::Image] {
        assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
    }
}

#[test]
fn normalize_base_url_trims_slashes_and_whitespace() {
    assert_eq!(normalize_base_url("  https://x.test/v1//  "), "https://x.test/v1");
    assert_eq!(normalize_base_url("https://x.test"), "https://x.test");
}
