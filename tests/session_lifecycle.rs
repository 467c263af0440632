//! Session lifecycle through the payload controller
//!
//! Every test checks device handles through [`CountingSource`], which counts
//! live streams and decrements on drop.

mod common;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use common::{test_config, wait_until, CountingSource, ScriptedSerial};
use eoir::display::{PresentationEvent, PresentationMode};
use eoir::error::SessionError;
use eoir::session::{SessionRole, SessionState};
use eoir::{Devices, Payload};

type TestPayload = Payload<CountingSource, CountingSource, ScriptedSerial>;

fn payload() -> (
    TestPayload,
    eoir::display::Presentation,
    CountingSource,
    CountingSource,
) {
    let visible = CountingSource::default();
    let thermal = CountingSource::default();
    let devices = Devices {
        visible: visible.clone(),
        thermal: thermal.clone(),
        serial: ScriptedSerial::default(),
    };
    let (payload, presentation) = Payload::new(test_config(), devices);
    (payload, presentation, visible, thermal)
}

#[test]
fn test_second_start_rejected_with_one_handle_open() {
    let (mut payload, _presentation, _visible, thermal) = payload();

    payload.start(SessionRole::Thermal).unwrap();
    let err = payload.start(SessionRole::Thermal).unwrap_err();

    assert_eq!(err, SessionError::AlreadyRunning(SessionRole::Thermal));
    assert_eq!(thermal.opens(), 1);
    assert_eq!(thermal.open_handles(), 1);
    assert_eq!(payload.state(SessionRole::Thermal), SessionState::Playing);
}

#[test]
fn test_stop_then_start_holds_exactly_one_handle() {
    let (mut payload, _presentation, visible, _thermal) = payload();

    payload.start(SessionRole::Visible).unwrap();
    payload.stop(SessionRole::Visible).unwrap();
    assert_eq!(payload.state(SessionRole::Visible), SessionState::Stopped);
    assert_eq!(visible.open_handles(), 0);

    payload.start(SessionRole::Visible).unwrap();
    assert_eq!(visible.open_handles(), 1);
    assert_eq!(visible.max_open(), 1);
    assert_eq!(visible.opens(), 2);
}

#[test]
fn test_stop_when_idle_is_noop() {
    let (mut payload, _presentation, _visible, _thermal) = payload();
    payload.stop(SessionRole::Visible).unwrap();
    assert_eq!(payload.state(SessionRole::Visible), SessionState::Idle);
}

#[test]
fn test_open_failure_reports_failed_and_holds_nothing() {
    let (mut payload, presentation, _visible, thermal) = payload();
    thermal.fail_open.store(true, Ordering::SeqCst);

    let err = payload.start(SessionRole::Thermal).unwrap_err();
    assert!(matches!(err, SessionError::DeviceUnavailable(_)));
    assert_eq!(payload.state(SessionRole::Thermal), SessionState::Failed);
    assert_eq!(thermal.open_handles(), 0);

    let events = presentation.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        PresentationEvent::Status {
            role: SessionRole::Thermal,
            state: SessionState::Failed,
            ..
        }
    )));

    // device comes back
    thermal.fail_open.store(false, Ordering::SeqCst);
    payload.start(SessionRole::Thermal).unwrap();
    assert_eq!(thermal.open_handles(), 1);
}

#[test]
fn test_pause_stops_pulling_and_resume_continues() {
    let (mut payload, presentation, visible, _thermal) = payload();
    payload.switch_mode(PresentationMode::SingleVisible);
    assert!(wait_until(|| presentation.try_frame().is_some()));

    payload.pause(SessionRole::Visible).unwrap();
    assert!(wait_until(|| payload.state(SessionRole::Visible) == SessionState::Paused));
    let pulled = visible.pulled();
    thread::sleep(Duration::from_millis(40));
    assert_eq!(visible.pulled(), pulled);
    assert_eq!(visible.open_handles(), 1);

    payload.resume(SessionRole::Visible).unwrap();
    assert!(wait_until(|| visible.pulled() > pulled));
    assert_eq!(payload.state(SessionRole::Visible), SessionState::Playing);
}

#[test]
fn test_resume_when_playing_is_invalid() {
    let (mut payload, _presentation, _visible, _thermal) = payload();
    payload.start(SessionRole::Visible).unwrap();
    let err = payload.resume(SessionRole::Visible).unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidTransition {
            from: SessionState::Playing,
            ..
        }
    ));
}

#[test]
fn test_disconnect_fails_only_that_role() {
    let (mut payload, _presentation, visible, thermal) = payload();
    payload.switch_mode(PresentationMode::VisibleWithThermalOverlay);
    assert_eq!(thermal.open_handles(), 1);

    thermal.disconnect.store(true, Ordering::SeqCst);
    assert!(wait_until(|| payload.state(SessionRole::Thermal) == SessionState::Failed));
    assert!(wait_until(|| thermal.open_handles() == 0));

    assert_eq!(payload.state(SessionRole::Visible), SessionState::Playing);
    assert_eq!(visible.open_handles(), 1);
}

#[test]
fn test_pipeline_failure_fails_session_and_allows_restart() {
    let (mut payload, _presentation, visible, _thermal) = payload();
    visible.corrupt.store(true, Ordering::SeqCst);
    payload.switch_mode(PresentationMode::SingleVisible);

    assert!(wait_until(|| payload.state(SessionRole::Visible) == SessionState::Failed));
    assert!(wait_until(|| visible.open_handles() == 0));

    visible.corrupt.store(false, Ordering::SeqCst);
    payload.start(SessionRole::Visible).unwrap();
    assert_eq!(visible.open_handles(), 1);
    assert_eq!(visible.max_open(), 1);
}

#[test]
fn test_shutdown_releases_everything() {
    let (mut payload, _presentation, visible, thermal) = payload();
    payload.switch_mode(PresentationMode::VisibleWithThermalOverlay);
    payload.shutdown();
    assert_eq!(visible.open_handles(), 0);
    assert_eq!(thermal.open_handles(), 0);
    assert_eq!(payload.state(SessionRole::Visible), SessionState::Stopped);
}

#[test]
fn test_drop_releases_devices() {
    let (mut payload, _presentation, visible, _thermal) = payload();
    payload.start(SessionRole::Visible).unwrap();
    drop(payload);
    assert_eq!(visible.open_handles(), 0);
}
