use std::sync::Arc;
use std::thread;
use std::time::Duration;

use launchlink::{Driver, LocalStrategy};
use launchlink_test_support::RecordingSink;

#[test]
fn three_messages_arrive_at_the_peer_in_order() {
    let (a, b) = LocalStrategy::linked_pair();
    let driver_a = Driver::new(Arc::new(a));
    let driver_b = Driver::new(Arc::new(b));

    let recorder = RecordingSink::new();
    driver_b.register(recorder.as_subscription());
    driver_b.start_read_loop();

    driver_a
        .write(r#"{"ABORT":0,"QDM":0,"STAB":1,"LAUNCH":1,"ARMED":1,"DATA":{"msg":"#1"}}"#, false)
        .unwrap();
    driver_a
        .write(r#"{"ABORT":0,"QDM":0,"STAB":1,"LAUNCH":1,"ARMED":1,"DATA":{"msg":"#2"}}"#, false)
        .unwrap();
    driver_a
        .write(r#"{"ABORT":0,"QDM":0,"STAB":1,"LAUNCH":1,"ARMED":1,"DATA":{"msg":"#3"}}"#, false)
        .unwrap();

    thread::sleep(Duration::from_secs(1));

    let received = recorder.snapshot();
    assert_eq!(received.len(), 3);
    let tags: Vec<_> = received
        .iter()
        .map(|m| m.data().unwrap().get("msg").unwrap().as_str().unwrap().to_owned())
        .collect();
    assert_eq!(tags, vec!["#1", "#2", "#3"]);

    driver_b.end_read_loop(Some(Duration::from_secs(1)));
}
