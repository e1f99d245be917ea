//! Integration tests: SitechLink session against the fake controller.

use std::io::Write;
use std::sync::{Arc, Mutex};

use sitech::error::{LinkError, ProtocolError};
use sitech::link::{FrameKind, FrameLog, SitechLink};
use sitech::protocol::{Axis, MotionRequest, XAxisRequest};

use crate::mock_link::FakeController;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn status_frame_decodes_positions_exactly() {
    let mut link = SitechLink::new(FakeController::at(-500, 1000));
    let status = link.get_axis_status(Axis::X).unwrap();

    assert_eq!(status.y_pos, 1000);
    assert_eq!(status.x_pos, -500);
    assert_eq!(status.y_enc, 1000);
    assert_eq!(status.x_enc, -500);
    assert_eq!(
        (status.keypad, status.x_bit, status.y_bit, status.extra_bits),
        (0, 0, 0, 0)
    );
    // Fetching status switches the session to binary first.
    assert_eq!(link.transport().command_texts(), vec!["YXY1", "XXS"]);
}

#[test]
fn switching_to_the_current_mode_writes_nothing() {
    let mut link = SitechLink::new(FakeController::at(0, 0));
    link.switch_to_ascii().unwrap();
    assert!(link.transport().written.is_empty());

    link.switch_to_binary().unwrap();
    let after_switch = link.transport().written.len();
    link.switch_to_binary().unwrap();
    assert_eq!(link.transport().written.len(), after_switch);
}

#[test]
fn corrupted_frame_is_flushed_and_the_next_query_recovers() {
    let mut link = SitechLink::new(FakeController::at(7, 9));
    link.switch_to_binary().unwrap();

    let mut bad = link.transport().status().encode();
    bad[3] ^= 0x10;
    link.transport_mut().push_reply(&bad);

    let err = link.get_axis_status(Axis::X).unwrap_err();
    assert!(matches!(
        err,
        LinkError::Protocol(ProtocolError::ChecksumMismatch { .. })
    ));
    assert_eq!(link.transport().flushes, 1);

    let status = link.get_axis_status(Axis::X).unwrap();
    assert_eq!((status.x_pos, status.y_pos), (7, 9));
}

#[test]
fn frame_log_captures_requests_and_replies() {
    let buf = SharedBuf::default();
    let mut link = SitechLink::new(FakeController::at(0, 0));
    link.start_frame_log(FrameLog::new(Box::new(buf.clone())));

    link.get_axis_status(Axis::X).unwrap();
    link.send_axis_request(&MotionRequest::X(XAxisRequest {
        x_dest: 1000,
        x_speed: 20_000,
        y_dest: -1000,
        y_speed: 20_000,
        x_bits: 0,
        y_bits: 0,
    }))
    .unwrap();

    let log = link.stop_frame_log().unwrap();
    assert_eq!(log.records_written(), 3);

    let records = FrameLog::decode_all(&buf.0.lock().unwrap());
    let kinds: Vec<FrameKind> = records.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![FrameKind::Status, FrameKind::XRequest, FrameKind::Status]
    );
    assert_eq!(records[1].payload.len(), 21);
    assert_eq!(link.transport().position.x, 1000);
}

#[test]
fn rejected_status_frames_stay_out_of_the_log() {
    let buf = SharedBuf::default();
    let mut link = SitechLink::new(FakeController::at(3, 4));
    link.switch_to_binary().unwrap();
    link.start_frame_log(FrameLog::new(Box::new(buf.clone())));

    let mut bad = link.transport().status().encode();
    bad[5] ^= 0x01;
    link.transport_mut().push_reply(&bad);
    assert!(link.get_axis_status(Axis::X).is_err());
    link.get_axis_status(Axis::X).unwrap();

    let log = link.stop_frame_log().unwrap();
    assert_eq!(log.records_written(), 1);
    let records = FrameLog::decode_all(&buf.0.lock().unwrap());
    assert_eq!(records.len(), 1);
    let good = link.transport().status().encode();
    assert_eq!(records[0].payload.as_slice(), &good[..]);
}
