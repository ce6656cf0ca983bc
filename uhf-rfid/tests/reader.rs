//! End-to-end behaviour of `Reader` against a scripted in-memory reader

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use uhf_rfid::{
    ConnectionStatus, CphProtocol, Error, MockHandle, MockTransport, NotificationCategory, Reader,
    ReaderConfig, Status, TagRead,
};
use uhf_rfid_core::{Frame, FrameType};

const VERSION_RESPONSE: &str = "524601000040000B0701002003040001210105C5";
const TAG_NOTIFICATION: &str =
    "52460200008000195017010CE2000017021701992390217D0501C306043D0000004C";
const OK_STATUS: &[u8] = &[0x07, 0x01, 0x00];

fn response(code: u8, params: &[u8]) -> Vec<u8> {
    Frame::new(FrameType::Response, 0, code, Bytes::copy_from_slice(params))
        .encode()
        .unwrap()
        .to_vec()
}

fn vector(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).unwrap()
}

/// A tag-read notification carrying only an EPC and an RSSI byte
fn tag_notification(epc: &str, rssi: u8) -> Vec<u8> {
    let epc = vector(epc);
    let mut tag = vec![0x01, epc.len() as u8];
    tag.extend_from_slice(&epc);
    tag.extend_from_slice(&[0x05, 0x01, rssi]);

    let mut params = vec![0x50, tag.len() as u8];
    params.extend(tag);
    Frame::new(FrameType::Notification, 0, 0x80, Bytes::from(params))
        .encode()
        .unwrap()
        .to_vec()
}

/// Answer every command with a success status, the version query with a
/// real capture
fn answer_everything(handle: &MockHandle) {
    handle.on_write(|written| {
        let code = written[5];
        match code {
            0x40 => vec![vector(VERSION_RESPONSE)],
            _ => vec![response(code, OK_STATUS)],
        }
    });
}

fn reader() -> (Reader, MockHandle) {
    let (transport, handle) = MockTransport::pair();
    (Reader::new(transport), handle)
}

fn reader_with_timeout(after: Duration) -> (Reader, MockHandle) {
    let (transport, handle) = MockTransport::pair();
    let reader = Reader::with_protocol(
        Box::new(transport),
        Arc::new(CphProtocol::new()),
        ReaderConfig::default().with_response_timeout(after),
    );
    (reader, handle)
}

async fn wait_for_writes(handle: &MockHandle, count: usize) {
    for _ in 0..200 {
        if handle.sent().len() >= count {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} writes, saw {}", count, handle.sent().len());
}

async fn wait_for_status(reader: &Reader, status: ConnectionStatus) {
    for _ in 0..200 {
        if reader.status() == status {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("reader stuck in {}", reader.status());
}

#[tokio::test]
async fn test_get_version() {
    let (reader, handle) = reader();
    answer_everything(&handle);

    reader.connect().await.unwrap();
    let info = reader.get_device_info().await.unwrap();

    assert_eq!(info.software_version, "4.0.1");
    assert_eq!(info.device_type, Some(5));
    assert_eq!(handle.sent(), vec![vector("524600000040000028")]);

    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_get_version_ascii() {
    let (reader, handle) = reader();
    // Status, then the version as a five-character string
    handle.on_write(|written| match written[5] {
        0x40 => vec![response(
            0x40,
            &[0x07, 0x01, 0x00, 0x20, 0x05, b'4', b'.', b'0', b'.', b'1'],
        )],
        code => vec![response(code, OK_STATUS)],
    });

    reader.connect().await.unwrap();
    assert_eq!(reader.get_version().await.unwrap(), "4.0.1");

    let info = reader.get_device_info().await.unwrap();
    assert_eq!(info.software_version, "4.0.1");
    assert_eq!(info.device_type, None);

    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_query_and_set_power() {
    let (reader, handle) = reader();
    handle.on_write(|written| match written[5] {
        0x49 => vec![response(0x49, &vector("07010026020119"))],
        code => vec![response(code, OK_STATUS)],
    });

    reader.connect().await.unwrap();
    assert_eq!(reader.get_power().await.unwrap(), 25);

    reader.set_power(25).await.unwrap();
    assert_eq!(handle.sent()[1], vector("524600000048000426020119DA"));

    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_inventory_delivers_tags() {
    let (reader, handle) = reader();
    handle.on_write(|written| match written[5] {
        0x21 => vec![
            response(0x21, OK_STATUS),
            vector(TAG_NOTIFICATION),
            tag_notification("E2000017021701992390AAAA", 0xB0),
        ],
        code => vec![response(code, OK_STATUS)],
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<TagRead>();
    reader.on_tag_read(move |tag| {
        let _ = tx.send(tag.clone());
    });

    reader.connect().await.unwrap();
    reader.start_inventory().await.unwrap();

    let mut tags = Vec::new();
    for _ in 0..2 {
        let tag = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        tags.push((tag.epc, tag.rssi, tag.raw_time));
    }
    assert_eq!(
        tags,
        vec![
            ("E2000017021701992390217D".to_string(), Some(-61), Some(0x3D00_0000)),
            ("E2000017021701992390AAAA".to_string(), Some(-80), None),
        ]
    );

    reader.stop_inventory().await.unwrap();
    reader.disconnect().await.unwrap();

    let codes: Vec<u8> = handle.sent().iter().map(|frame| frame[5]).collect();
    assert_eq!(codes, vec![0x21, 0x23]);
}

#[tokio::test]
async fn test_notifications_keep_arrival_order() {
    let (reader, handle) = reader();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    reader.on_notification(NotificationCategory::TagRead, move |n| {
        log.lock().push(n.frame.code)
    });
    let log = Arc::clone(&seen);
    reader.on_notification(NotificationCategory::Heartbeat, move |n| {
        log.lock().push(n.frame.code)
    });

    reader.connect().await.unwrap();

    let notification = |code: u8| {
        Frame::new(FrameType::Notification, 0, code, Bytes::new())
            .encode()
            .unwrap()
            .to_vec()
    };
    let mut burst = notification(0x80);
    burst.extend(notification(0x90));
    burst.extend(notification(0x81));
    handle.push_rx(burst);

    for _ in 0..200 {
        if seen.lock().len() == 3 {
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(*seen.lock(), vec![0x80, 0x90, 0x81]);

    reader.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_frees_the_slot() {
    let (reader, handle) = reader_with_timeout(Duration::from_millis(100));
    reader.connect().await.unwrap();

    let started = tokio::time::Instant::now();
    let err = reader.get_version().await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(err.is_timeout());
    assert!(err.is_recoverable());
    assert!(reader.is_connected());

    answer_everything(&handle);
    assert_eq!(reader.get_version().await.unwrap(), "4.0.1");

    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_command_is_busy() {
    let (reader, handle) = reader();
    let reader = Arc::new(reader);
    reader.connect().await.unwrap();

    let first = tokio::spawn({
        let reader = Arc::clone(&reader);
        async move { reader.get_version().await }
    });
    wait_for_writes(&handle, 1).await;

    let err = reader.get_power().await.unwrap_err();
    assert!(matches!(err, Error::Busy { pending: 0x40 }));

    handle.push_rx(vector(VERSION_RESPONSE));
    assert_eq!(first.await.unwrap().unwrap(), "4.0.1");

    // Only the first command reached the wire
    assert_eq!(handle.sent().len(), 1);
    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_error_status_surfaces() {
    let (reader, handle) = reader();
    handle.on_write(|written| vec![response(written[5], &[0x07, 0x01, 0x14])]);

    reader.connect().await.unwrap();
    let err = reader.set_buzzer(true).await.unwrap_err();

    assert!(err.is_command_error());
    assert_eq!(err.status(), Some(Status::ParameterUnsupported));
    assert!(reader.is_connected());

    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_cancels_pending_command() {
    let (reader, handle) = reader();
    let reader = Arc::new(reader);
    reader.connect().await.unwrap();

    let pending = tokio::spawn({
        let reader = Arc::clone(&reader);
        async move { reader.get_version().await }
    });
    wait_for_writes(&handle, 1).await;

    reader.disconnect().await.unwrap();

    let err = timeout(Duration::from_millis(500), pending)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionLost));
    assert_eq!(reader.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_link_failure_then_reconnect() {
    let (reader, handle) = reader();
    answer_everything(&handle);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    reader.on_tag_read(move |tag| {
        let _ = tx.send(tag.epc.clone());
    });

    reader.connect().await.unwrap();
    handle.close_remote();
    wait_for_status(&reader, ConnectionStatus::Disconnected).await;

    let err = reader.get_version().await.unwrap_err();
    assert!(matches!(
        err,
        Error::NotConnected {
            status: ConnectionStatus::Disconnected
        }
    ));

    reader.connect().await.unwrap();
    assert_eq!(handle.connect_count(), 2);
    assert_eq!(reader.get_version().await.unwrap(), "4.0.1");

    // Observers survive the reconnect
    handle.push_rx(vector(TAG_NOTIFICATION));
    let epc = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(epc, "E2000017021701992390217D");

    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_status_transitions_are_observed() {
    let (reader, _handle) = reader();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    reader.on_status_change(move |status| log.lock().push(status));

    reader.connect().await.unwrap();
    reader.connect().await.unwrap();
    reader.disconnect().await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnecting,
            ConnectionStatus::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_with_connection_closes_on_error() {
    let (reader, handle) = reader();
    answer_everything(&handle);

    let result = reader
        .with_connection(|reader| async move {
            reader.get_version().await?;
            reader.set_power(40).await
        })
        .await;

    assert!(matches!(result, Err(Error::Core(ref e)) if e.is_invalid_argument()));
    assert_eq!(reader.status(), ConnectionStatus::Disconnected);
    assert_eq!(handle.sent().len(), 1);
}

#[tokio::test]
async fn test_with_connection_cancelled_mid_flight() {
    let (reader, handle) = reader();
    answer_everything(&handle);

    let outcome = timeout(
        Duration::from_millis(50),
        reader.with_connection(|_| async {
            sleep(Duration::from_secs(10)).await;
            Ok(())
        }),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(reader.status(), ConnectionStatus::Disconnected);
    assert!(matches!(
        reader.get_version().await,
        Err(Error::NotConnected { .. })
    ));

    reader.connect().await.unwrap();
    assert_eq!(handle.connect_count(), 2);
    assert_eq!(reader.get_version().await.unwrap(), "4.0.1");
    reader.disconnect().await.unwrap();
}
