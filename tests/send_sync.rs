//! Send/Sync guarantees for core types.

use logstash_hook::{
    HookBuilder, HookOptions, HookSettings, JsonFormatter, LogRecord, LogstashFormatter,
    LogstashHook, NormalizedRecord, SharedFormatter, TextFormatter,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(HookBuilder: Send, Sync);
    assert_impl_all!(HookOptions: Send, Sync);
    assert_impl_all!(HookSettings: Send, Sync);
}

#[rstest]
fn components_are_send_sync() {
    assert_impl_all!(LogstashHook: Send, Sync);
    assert_impl_all!(LogstashFormatter: Send, Sync);
    assert_impl_all!(SharedFormatter: Send, Sync);
    assert_impl_all!(JsonFormatter: Send, Sync);
    assert_impl_all!(TextFormatter: Send, Sync);
}

#[rstest]
fn records_cross_threads() {
    assert_impl_all!(LogRecord: Send, Sync);
    assert_impl_all!(NormalizedRecord: Send, Sync);
}
