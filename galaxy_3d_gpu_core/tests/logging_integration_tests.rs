//! Integration tests for the logging system
//!
//! These tests verify logger replacement and the messages the device
//! emits through it. No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests


use galaxy_3d_gpu_core::galaxy3d::log::{reset_logger, set_logger, LogSeverity};
use galaxy_3d_gpu_core::galaxy3d::{Device, DeviceConfig, Error, FrameContext, SurfaceDesc};
use galaxy_3d_gpu_core::{gpu_debug, gpu_error, gpu_info, gpu_trace, gpu_warn};
use headless_test_utils::{HeadlessDevice, TestLogger};
use serial_test::serial;
use std::time::Duration;

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    set_logger(test_logger);

    gpu_trace!("test::module", "Trace {}", 1);
    gpu_debug!("test::module", "Debug {}", 2);
    gpu_info!("test::module", "Info {}", 3);
    gpu_warn!("test::module", "Warn {}", 4);
    gpu_error!("test::module", "Error {}", 5);

    reset_logger();

    let captured: Vec<_> = entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.source == "test::module")
        .cloned()
        .collect();
    assert_eq!(captured.len(), 5);

    let severities: Vec<LogSeverity> = captured.iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![
            LogSeverity::Trace,
            LogSeverity::Debug,
            LogSeverity::Info,
            LogSeverity::Warn,
            LogSeverity::Error,
        ]
    );
    assert_eq!(captured[2].message, "Info 3");

    // Only errors carry their call site
    assert!(captured[..4].iter().all(|e| e.file.is_none() && e.line.is_none()));
    assert!(captured[4].file.unwrap().ends_with("logging_integration_tests.rs"));
    assert!(captured[4].line.is_some());
}

#[test]
#[serial]
fn test_integration_reset_logger() {
    let (test_logger, entries) = TestLogger::new();
    set_logger(test_logger);
    reset_logger();

    gpu_info!("test::module", "Goes to the default logger");

    assert!(entries
        .lock()
        .unwrap()
        .iter()
        .all(|e| e.source != "test::module"));
}

#[test]
#[serial]
fn test_integration_initialization_failure_logged() {
    let (test_logger, entries) = TestLogger::new();
    set_logger(test_logger);

    let result = Device::initialize(
        HeadlessDevice::new(),
        SurfaceDesc::new(0, 0, false, "minimized"),
        DeviceConfig::default(),
        None,
    );

    reset_logger();

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
    let entries = entries.lock().unwrap();
    let error = entries
        .iter()
        .find(|e| e.source == "galaxy3d::Device" && e.severity == LogSeverity::Error)
        .expect("initialization failure should be logged");
    assert!(error.message.contains("zero size"));
    assert!(error.file.is_some());
}

#[test]
#[serial]
fn test_integration_frame_loop_lifecycle_logged() {
    let (test_logger, entries) = TestLogger::new();
    set_logger(test_logger);

    let gpu = HeadlessDevice::new();
    let config = DeviceConfig {
        parallel_render: false,
        ..DeviceConfig::default()
    };
    let mut device = Device::initialize(
        gpu,
        SurfaceDesc::new(320, 240, false, "lifecycle"),
        config,
        None,
    )
    .unwrap();

    let mut remaining = 3;
    device
        .run(
            move |_: &FrameContext, _: Duration| {
                remaining -= 1;
                remaining >= 0
            },
            |ctx: &FrameContext| ctx.execute_command_list(0),
        )
        .unwrap();
    device.release().unwrap();

    reset_logger();

    let messages: Vec<String> = entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.source == "galaxy3d::Device" && e.severity == LogSeverity::Info)
        .map(|e| e.message.clone())
        .collect();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].contains("initialized"));
    assert!(messages[1].contains("Frame loop ended after 3 frames"));
    assert!(messages[2].starts_with("Released after 3 frames"));
}
