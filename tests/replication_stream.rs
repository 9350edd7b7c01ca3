mod common;

// Requires a running Postgres with wal_level=logical; run with --ignored.
// `test_decoding` stands in for the output plugin.

use std::time::{Duration, Instant};

use pg_follower::apply::{FeedbackState, SessionState, Watermarks};
use pg_follower::logical_replication::{
    LogicalReplicationStream, Receive, ReplicationMessage, ReplicationStream, Slot,
};
use pg_follower::{FollowerError, Lsn};
use serial_test::serial;

fn open_stream(test_db: &common::TestDb, slot: &Slot) -> LogicalReplicationStream {
    let mut stream = LogicalReplicationStream::connect(&test_db.url).expect("connect");
    stream.create_slot(slot).expect("create slot");
    stream.start(slot, Lsn::INVALID).expect("start replication");
    stream
}

/// Receive until `predicate` matches a data frame, waiting in between.
fn receive_until(
    stream: &mut LogicalReplicationStream,
    predicate: impl Fn(&str) -> bool,
) -> Option<Lsn> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        match stream.receive().expect("receive") {
            Receive::Message(buf) => {
                if let ReplicationMessage::XLogData(xlog) = ReplicationMessage::parse(&buf).unwrap() {
                    if predicate(&String::from_utf8_lossy(&xlog.data)) {
                        return Some(xlog.wal_end);
                    }
                }
            }
            Receive::Empty => stream.wait(Duration::from_millis(100)).expect("wait"),
            Receive::EndOfStream => return None,
        }
    }
    None
}

#[test]
#[ignore]
#[serial]
fn test_stream_delivers_committed_changes() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    client
        .batch_execute("CREATE TABLE items (id int PRIMARY KEY, label text)")
        .unwrap();

    let slot = Slot::new(&common::unique_slot_name(), "test_decoding");
    let mut stream = open_stream(&test_db, &slot);

    client
        .batch_execute("INSERT INTO items VALUES (1, 'first')")
        .unwrap();
    let commit = receive_until(&mut stream, |text| text.starts_with("COMMIT"));
    assert!(commit.is_some(), "no COMMIT frame received");
    stream.end_streaming().unwrap();
}

#[test]
#[ignore]
#[serial]
fn test_feedback_advances_confirmed_flush() {
    let test_db = common::setup_test_db();
    let mut client = test_db.client();
    client.batch_execute("CREATE TABLE items (id int)").unwrap();

    let slot = Slot::new(&common::unique_slot_name(), "test_decoding");
    let mut stream = open_stream(&test_db, &slot);
    client.batch_execute("INSERT INTO items VALUES (7)").unwrap();
    let commit = receive_until(&mut stream, |text| text.starts_with("COMMIT")).unwrap();

    let mut marks = Watermarks::default();
    marks.observe(commit);
    marks.mark_durable();
    let update = FeedbackState::new(10)
        .next_update(&marks, true, false, Instant::now(), std::time::SystemTime::now())
        .unwrap();
    stream.send(&update.encode()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut confirmed = None;
    while Instant::now() < deadline {
        confirmed = slot.confirmed_flush_lsn(&mut client).unwrap();
        if confirmed.is_some_and(|lsn| lsn >= commit) {
            break;
        }
        let _ = stream.receive();
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(confirmed.is_some_and(|lsn| lsn >= commit));
    stream.end_streaming().unwrap();
}

#[test]
#[ignore]
#[serial]
fn test_open_session_reaches_streaming() {
    let test_db = common::setup_test_db();
    let mut config = pg_follower::FollowerConfig::new(&test_db.url, &test_db.url);
    config.slot_name = common::unique_slot_name();
    config.plugin_name = "test_decoding".to_string();
    let mut session = pg_follower::apply::SessionManager::open(&config).unwrap();
    assert_eq!(session.state(), SessionState::Streaming);
    session.stream.end_streaming().unwrap();
}

#[test]
#[ignore]
#[serial]
fn test_unknown_plugin_is_a_connection_failure() {
    let test_db = common::setup_test_db();
    let mut stream = LogicalReplicationStream::connect(&test_db.url).expect("connect");
    let err = stream
        .create_slot(&Slot::new(&common::unique_slot_name(), "no_such_plugin"))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FollowerError>(),
        Some(FollowerError::Connection(_))
    ));
}
