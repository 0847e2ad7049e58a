use std::sync::Arc;
use std::time::Duration;

use sink_harvest::{
    Clock, DestinationReader, HarvestConfig, HarvestError, ManualClock, MemoryResource,
    MemorySink, MemorySinkRegistry, MessageReader, SinkIdentifier, SinkResource,
};

fn config() -> HarvestConfig {
    HarvestConfig::default()
        .with_creation_timeout(Duration::from_millis(300))
        .with_pop_timeout(Duration::from_millis(300))
        .with_pop_interval(Duration::from_millis(10))
}

#[test]
fn any_write_pattern_yields_every_record_once_in_order() {
    let payload = "alpha\nbeta\n\ngamma delta\nepsilon\nzeta\n";
    let expected: Vec<&str> = payload.lines().collect();

    for step in 1..=payload.len() {
        let sink = MemorySink::new();
        sink.create();
        let clock = Arc::new(ManualClock::new());
        let writer = sink.clone();
        let bytes = payload.as_bytes().to_vec();
        clock.on_sleep(move |count| {
            let start = (count - 1) * step;
            if start < bytes.len() {
                writer.write(&bytes[start..(start + step).min(bytes.len())]);
            }
        });

        let cfg = config().with_pop_timeout(Duration::from_secs(60));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let resource = MemoryResource::new(
            SinkIdentifier::from("mem"),
            sink.clone(),
            &cfg,
            clock_dyn.clone(),
        );
        let mut reader = MessageReader::new(Box::new(resource), &cfg, clock_dyn);

        let mut harvested = Vec::new();
        harvested.extend(reader.pop_messages(2).unwrap());
        harvested.extend(reader.pop_messages(expected.len() - 2).unwrap());

        let texts: Vec<&str> = harvested.iter().map(|r| r.as_str()).collect();
        assert_eq!(texts, expected, "write step {step}");
        assert!(reader.pending_fragment().is_empty());
        assert_eq!(reader.buffered_len(), 0);
    }
}

#[test]
fn pop_never_returns_more_or_less_than_requested() {
    let sink = MemorySink::new();
    sink.write("1\n2\n3\n4\n5\n6\n7\n");
    let cfg = config();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
    let resource = MemoryResource::new(SinkIdentifier::from("m"), sink, &cfg, clock.clone());
    let mut reader = MessageReader::new(Box::new(resource), &cfg, clock);

    for n in [3usize, 1, 2] {
        assert_eq!(reader.pop_messages(n).unwrap().len(), n);
    }
    match reader.pop_messages(2) {
        Err(HarvestError::Timeout {
            requested,
            buffered,
            ..
        }) => {
            assert_eq!(requested, 2);
            assert_eq!(buffered, vec!["7".to_string()]);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(reader.pop_messages(1).unwrap()[0], "7");
}

#[test]
fn creation_wait_is_idempotent() {
    let sink = MemorySink::new();
    sink.create();
    let cfg = config();
    let clock = Arc::new(ManualClock::new());
    let mut resource = MemoryResource::new(
        SinkIdentifier::from("m"),
        sink.clone(),
        &cfg,
        clock.clone(),
    );
    resource.wait_for_creation(Duration::from_secs(1)).unwrap();
    sink.remove();
    resource.wait_for_creation(Duration::from_secs(1)).unwrap();
    assert_eq!(clock.sleeps(), 0);
}

#[test]
fn independent_destinations_do_not_share_state() {
    let registry = MemorySinkRegistry::new();
    registry.sink("left").write("l1\nl2\n");
    registry.sink("right").write("r1\n");

    let factory = Arc::new(registry);
    let clock = Arc::new(ManualClock::new());
    let mut left = DestinationReader::with_clock(factory.clone(), config(), clock.clone());
    let mut right = DestinationReader::with_clock(factory, config(), clock);

    let l = SinkIdentifier::from("left");
    let r = SinkIdentifier::from("right");
    assert_eq!(left.read_log(&l).unwrap(), "l1");
    assert_eq!(right.read_log(&r).unwrap(), "r1");
    assert_eq!(left.read_log(&l).unwrap(), "l2");
    assert!(right.read_log(&r).unwrap_err().is_timeout());
}
