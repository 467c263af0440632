mod common;

use common::{test_config, wait_until, CountingSource, ScriptedSerial, RANGEFINDER_PORT};
use eoir::display::{Presentation, PresentationEvent, PresentationMode, TargetId};
use eoir::protocol::rangefinder::{range_label, START_CONTINUOUS, STOP_MEASUREMENT};
use eoir::protocol::RangeSample;
use eoir::session::{SessionRole, SessionState};
use eoir::{Devices, Payload};

fn measurement(decimetres: u16, valid: bool) -> [u8; 8] {
    let [hi, lo] = decimetres.to_be_bytes();
    [0x55, 0xAA, 0x88, 0x03, valid as u8, hi, lo, 0x00]
}

fn samples(presentation: &Presentation) -> Vec<(Option<RangeSample>, Option<TargetId>)> {
    presentation
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            PresentationEvent::Range { sample, label, .. } => Some((sample, label.map(|r| r.target))),
            _ => None,
        })
        .collect()
}

#[test]
fn test_start_stop_commands_and_samples() {
    let serial = ScriptedSerial::default();
    let line = serial.line(RANGEFINDER_PORT);
    let (mut payload, presentation) = Payload::new(
        test_config(),
        Devices {
            visible: CountingSource::default(),
            thermal: CountingSource::default(),
            serial: serial.clone(),
        },
    );
    payload.switch_mode(PresentationMode::ThermalWithVisibleOverlay);
    assert_eq!(line.writes(), vec![START_CONTINUOUS.to_vec()]);

    line.feed(&measurement(1234, true));
    line.feed(&measurement(0, false));

    let mut got = Vec::new();
    assert!(wait_until(|| {
        got.extend(samples(&presentation));
        got.len() >= 2
    }));

    let (first, target) = got[0];
    assert_eq!(target, Some(TargetId::RangeLabel));
    let first = first.unwrap();
    assert!((first.distance_m - 123.4).abs() < 1e-3);
    assert_eq!(range_label(Some(&first)), "Range: 123.4 m");
    assert!(got[1].0.is_none());
    assert_eq!(range_label(got[1].0.as_ref()), "Range: --.- m");

    payload.stop(SessionRole::Rangefinder).unwrap();
    assert_eq!(line.writes().last().unwrap(), &STOP_MEASUREMENT.to_vec());
    assert_eq!(line.open_count(), 0);
}

#[test]
fn test_split_frames_reassembled() {
    let serial = ScriptedSerial::default();
    let line = serial.line(RANGEFINDER_PORT);
    let (mut payload, presentation) = Payload::new(
        test_config(),
        Devices {
            visible: CountingSource::default(),
            thermal: CountingSource::default(),
            serial,
        },
    );
    payload.start(SessionRole::Rangefinder).unwrap();

    let frame = measurement(50, true);
    line.feed(&frame[..3]);
    std::thread::sleep(std::time::Duration::from_millis(30));
    line.feed(&frame[3..]);

    let mut got = Vec::new();
    assert!(wait_until(|| {
        got.extend(samples(&presentation));
        !got.is_empty()
    }));
    assert!((got[0].0.unwrap().distance_m - 5.0).abs() < 1e-3);
}

#[test]
fn test_pause_halts_measurement() {
    let serial = ScriptedSerial::default();
    let line = serial.line(RANGEFINDER_PORT);
    let (mut payload, _presentation) = Payload::new(
        test_config(),
        Devices {
            visible: CountingSource::default(),
            thermal: CountingSource::default(),
            serial,
        },
    );
    payload.start(SessionRole::Rangefinder).unwrap();
    payload.pause(SessionRole::Rangefinder).unwrap();
    assert!(wait_until(|| payload.state(SessionRole::Rangefinder) == SessionState::Paused));
    assert_eq!(line.writes().last().unwrap(), &STOP_MEASUREMENT.to_vec());
    assert_eq!(line.open_count(), 1);

    payload.resume(SessionRole::Rangefinder).unwrap();
    assert!(wait_until(|| line.writes().len() == 3));
    assert_eq!(line.writes()[2], START_CONTINUOUS.to_vec());
}

#[test]
fn test_missing_port_fails_session() {
    let serial = ScriptedSerial::default();
    serial
        .line(RANGEFINDER_PORT)
        .fail_open
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (mut payload, _presentation) = Payload::new(
        test_config(),
        Devices {
            visible: CountingSource::default(),
            thermal: CountingSource::default(),
            serial,
        },
    );
    assert!(payload.start(SessionRole::Rangefinder).is_err());
    assert_eq!(payload.state(SessionRole::Rangefinder), SessionState::Failed);
}

#[test]
fn test_samples_from_previous_mode_not_presented() {
    let serial = ScriptedSerial::default();
    let line = serial.line(RANGEFINDER_PORT);
    let (mut payload, presentation) = Payload::new(
        test_config(),
        Devices {
            visible: CountingSource::default(),
            thermal: CountingSource::default(),
            serial,
        },
    );
    payload.switch_mode(PresentationMode::ThermalWithVisibleOverlay);
    line.feed(&measurement(777, true));
    assert!(wait_until(|| line.pending_is_empty()));
    std::thread::sleep(std::time::Duration::from_millis(60));

    // queued under the overlay layout, never drained
    payload.switch_mode(PresentationMode::SingleThermal);
    assert!(samples(&presentation).is_empty());
}

#[test]
fn test_stream_realigns_after_line_noise() {
    let serial = ScriptedSerial::default();
    let line = serial.line(RANGEFINDER_PORT);
    let (mut payload, presentation) = Payload::new(
        test_config(),
        Devices {
            visible: CountingSource::default(),
            thermal: CountingSource::default(),
            serial,
        },
    );
    payload.start(SessionRole::Rangefinder).unwrap();

    line.feed(&[0x13, 0x00, 0x55]);
    line.feed(&measurement(321, true));
    line.feed(&measurement(45, true));

    let mut got = Vec::new();
    assert!(wait_until(|| {
        got.extend(samples(&presentation));
        got.len() >= 2
    }));
    assert_eq!(got.len(), 2);
    assert!((got[0].0.unwrap().distance_m - 32.1).abs() < 1e-3);
    assert!((got[1].0.unwrap().distance_m - 4.5).abs() < 1e-3);
}
