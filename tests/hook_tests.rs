//! End-to-end behaviour of the Logstash hook through the public API.

mod test_utils;

use std::{sync::Arc, thread, time::Duration};

use logstash_hook::{
    BackoffPolicy, CallSite, Hook, HookBuilder, HookOptions, Level, LogRecord, LogstashFormatter,
    LogstashHook, TextFormatter,
};
use rstest::rstest;
use serde_json::json;
use test_utils::{MemoryCollector, TcpCollector, tcp_collector};

fn memory_hook(collector: &MemoryCollector, options: HookOptions) -> LogstashHook {
    LogstashHook::with_connector(collector.connector(), LogstashFormatter::default(), options)
        .expect("memory collector accepts the first dial")
}

#[rstest]
fn concurrent_producers_keep_their_own_order(tcp_collector: TcpCollector) {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 50;

    let hook = Arc::new(
        LogstashHook::new("tcp", &tcp_collector.address(), LogstashFormatter::default())
            .expect("connect to collector"),
    );
    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let hook = Arc::clone(&hook);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let record = LogRecord::new(Level::Info, format!("{t}:{i}"))
                        .with_field("producer", t as u64);
                    hook.fire(record).expect("fire");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer thread");
    }
    assert!(hook.flush());

    let lines = tcp_collector.wait_for(THREADS * PER_THREAD, Duration::from_secs(5));
    assert_eq!(lines.len(), THREADS * PER_THREAD);
    for t in 0..THREADS {
        let seen: Vec<usize> = lines
            .iter()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("json line"))
            .filter_map(|value| {
                let message = value["message"].as_str()?.to_owned();
                let (producer, index) = message.split_once(':')?;
                if producer.parse::<usize>().ok()? != t {
                    return None;
                }
                index.parse().ok()
            })
            .collect();
        assert_eq!(seen, (0..PER_THREAD).collect::<Vec<_>>());
    }
}

#[rstest]
fn outage_is_bridged_by_reconnecting() {
    let collector = MemoryCollector::new();
    let options =
        HookOptions::default().with_backoff(BackoffPolicy::fixed(Duration::from_millis(10)));
    let hook = memory_hook(&collector, options);

    hook.fire(LogRecord::new(Level::Info, "before")).expect("fire");
    assert!(hook.flush());

    collector.set_down(true);
    for message in ["during 1", "during 2"] {
        hook.fire(LogRecord::new(Level::Warn, message)).expect("fire");
    }
    thread::sleep(Duration::from_millis(50));
    collector.set_down(false);
    hook.fire(LogRecord::new(Level::Info, "after")).expect("fire");
    assert!(hook.flush());

    let messages: Vec<_> = collector
        .records()
        .iter()
        .map(|record| record["message"].as_str().expect("message").to_owned())
        .collect();
    assert_eq!(messages, ["before", "during 1", "during 2", "after"]);
    assert!(collector.dials() > 2, "hook must have redialled");
}

#[rstest]
fn call_site_and_defaults_reach_the_wire() {
    let collector = MemoryCollector::new();
    let fields = [("app".to_owned(), json!("billing")), ("type".to_owned(), json!("audit"))]
        .into_iter()
        .collect();
    let hook = LogstashHook::with_connector(
        collector.connector(),
        LogstashFormatter::logstash(fields),
        HookOptions::synchronous(),
    )
    .expect("memory dial");

    let record = LogRecord::new(Level::Error, "charge failed")
        .with_field("order", 1042)
        .with_field("file", "ignored.rs")
        .with_call_site(CallSite::new("src/billing.rs", 88, "billing::charge"));
    hook.fire(record).expect("synchronous send");

    let records = collector.records();
    let sent = &records[0];
    assert_eq!(sent["message"], "charge failed");
    assert_eq!(sent["level"], "error");
    assert_eq!(sent["file"], "src/billing.rs:88");
    assert_eq!(sent["function"], "billing::charge");
    assert_eq!(sent["fields"], "order=1042");
    assert_eq!(sent["app"], "billing");
    assert_eq!(sent["type"], "audit");
    assert_eq!(sent["@version"], "1");
}

#[rstest]
fn text_formatter_can_replace_json() {
    let collector = MemoryCollector::new();
    let hook = LogstashHook::with_connector(
        collector.connector(),
        TextFormatter::default(),
        HookOptions::synchronous(),
    )
    .expect("memory dial");

    hook.fire(LogRecord::new(Level::Debug, "cache warm").with_field("hits", 3))
        .expect("synchronous send");

    let lines = collector.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("level=debug"));
    assert!(lines[0].contains("msg=\"cache warm\""));
    assert!(lines[0].ends_with("fields=\"hits=3\""));
}

#[rstest]
fn dropping_the_hook_delivers_queued_records(tcp_collector: TcpCollector) {
    let hook = HookBuilder::new()
        .with_tcp(tcp_collector.address())
        .with_capacity(128)
        .build()
        .expect("connect to collector");
    for i in 0..20 {
        hook.fire(LogRecord::new(Level::Info, format!("queued {i}"))).expect("fire");
    }
    drop(hook);

    let lines = tcp_collector.wait_for(20, Duration::from_secs(5));
    assert_eq!(lines.len(), 20);
}
