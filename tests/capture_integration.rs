use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arcall::capture::{CameraSource, FrameSource, SyntheticCamera};
use arcall::config::types::CaptureConfig;
use arcall::error::PipelineError;

fn fast_camera() -> SyntheticCamera {
    SyntheticCamera::new(&CaptureConfig {
        width: 16,
        height: 16,
        fps: 240,
        ..CaptureConfig::default()
    })
}

fn wait_for(counter: &AtomicU64, at_least: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while counter.load(Ordering::SeqCst) < at_least {
        assert!(Instant::now() < deadline, "frames not delivered in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_no_delivery_after_close_returns() {
    let mut source = CameraSource::new(fast_camera());
    let received = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&received);

    source
        .open(Box::new(move |_frame| {
            // Slow consumer widens the window for a late delivery
            std::thread::sleep(Duration::from_millis(3));
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    wait_for(&received, 5);

    source.close();
    let at_close = received.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(received.load(Ordering::SeqCst), at_close);
    assert!(!source.is_open());
    assert_eq!(source.frames_delivered(), at_close);
}

#[test]
fn test_second_open_rejected_while_bound() {
    let mut source = CameraSource::new(fast_camera());
    source.open(Box::new(|_frame| {})).unwrap();

    assert_eq!(
        source.open(Box::new(|_frame| {})),
        Err(PipelineError::AlreadyOpen)
    );
    source.close();
}

#[test]
fn test_reopen_after_close() {
    let mut source = CameraSource::new(fast_camera());
    source.open(Box::new(|_frame| {})).unwrap();
    source.close();
    source.close();

    let received = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&received);
    source
        .open(Box::new(move |frame| {
            assert!(frame.is_complete());
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    wait_for(&received, 3);
    source.close();
}

#[test]
fn test_unavailable_device_binds_nothing() {
    let config = CaptureConfig::default();
    let mut source = CameraSource::new(SyntheticCamera::unavailable(&config));

    let err = source.open(Box::new(|_frame| {})).unwrap_err();
    assert!(matches!(err, PipelineError::DeviceUnavailable(_)));
    assert!(!source.is_open());
    assert_eq!(source.frames_delivered(), 0);
}
