use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use launchlink::Driver;
use launchlink_test_support::NeverReturningStrategy;

#[test]
fn end_read_loop_returns_promptly_even_though_the_strategy_blocks_forever() {
    let strategy = Arc::new(NeverReturningStrategy::new());
    let driver = Driver::new(strategy.clone());

    driver.start_read_loop();
    thread::sleep(Duration::from_secs(1));
    assert!(strategy.has_been_read_from());

    let started = Instant::now();
    driver.end_read_loop(Some(Duration::from_secs(5)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!driver.is_reading());
}
