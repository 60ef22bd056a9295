use std::sync::Arc;
use std::time::{Duration, Instant};

use gpio_timer::app::run_pulse;
use gpio_timer::backend::MockGpioBackend;
use gpio_timer::config::{AppConfig, LineConfig};
use gpio_timer::error::AppError;
use gpio_timer::gpio::{GpioBackend, LineDriver};

fn sample_config() -> AppConfig {
    serde_json::from_str(
        r#"
        {
            "gpio": {
                "chip": "gpiochip0",
                "line": 17,
                "consumer": "example"
            }
        }
        "#,
    )
    .expect("valid sample config")
}

#[test]
fn pulse_releases_line_for_next_owner() {
    let cfg = sample_config();
    let backend = Arc::new(MockGpioBackend::default());

    run_pulse(&cfg.gpio, backend.clone()).expect("pulse succeeds");
    assert!(!backend.is_held(&cfg.gpio));

    // another process can take the line straight away
    let next = LineConfig {
        consumer: "next".into(),
        ..cfg.gpio.clone()
    };
    backend.request_output(&next, 1).expect("line is free");
    backend.release(&next).expect("release");
}

#[test]
fn pulse_leaves_line_low() {
    let cfg = sample_config();
    let backend = Arc::new(MockGpioBackend::default());

    run_pulse(&cfg.gpio, backend.clone()).expect("pulse succeeds");
    assert_eq!(backend.last_value(&cfg.gpio), Some(0));
    assert_eq!(backend.levels(&cfg.gpio), vec![0, 0]);
}

#[test]
fn pulse_twice_in_a_row() {
    let cfg = sample_config();
    let backend = Arc::new(MockGpioBackend::default());

    run_pulse(&cfg.gpio, backend.clone()).expect("first pulse");
    run_pulse(&cfg.gpio, backend.clone()).expect("second pulse");
    assert_eq!(backend.levels(&cfg.gpio), vec![0, 0, 0, 0]);
}

#[test]
fn missing_line_is_a_gpio_error() {
    let cfg = sample_config();
    let backend = Arc::new(MockGpioBackend::with_line_count(16));

    let err = run_pulse(&cfg.gpio, backend.clone()).unwrap_err();
    assert!(matches!(err, AppError::Gpio(_)));
    assert!(!backend.is_held(&cfg.gpio));
}

#[test]
fn held_line_reports_busy_and_stays_with_owner() {
    let cfg = sample_config();
    let backend = Arc::new(MockGpioBackend::default());
    let owner = LineConfig {
        consumer: "owner".into(),
        ..cfg.gpio.clone()
    };
    backend.request_output(&owner, 1).expect("owner takes line");

    let err = run_pulse(&cfg.gpio, backend.clone()).unwrap_err();
    assert!(matches!(err, AppError::LineBusy(_)));
    assert_eq!(backend.read_value(&owner).unwrap(), 1);
}

#[test]
fn hold_keeps_line_for_duration() {
    let cfg = LineConfig {
        hold_ms: 20,
        ..sample_config().gpio
    };
    let backend = Arc::new(MockGpioBackend::default());
    let driver = LineDriver::new(cfg.clone(), backend.clone());

    let started = Instant::now();
    driver.pulse_low().expect("pulse succeeds");
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert!(!backend.is_held(&cfg));
}

#[test]
fn hold_high_then_release() {
    let cfg = sample_config().gpio;
    let backend = Arc::new(MockGpioBackend::default());
    let driver = LineDriver::new(cfg.clone(), backend.clone());

    driver.hold(1, Duration::ZERO).expect("hold high");
    assert_eq!(backend.last_value(&cfg), Some(1));
    assert!(!backend.is_held(&cfg));
}
