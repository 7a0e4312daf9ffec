// src/log/tests/filter.rs

use super::*;

test_case!(test_global_level_filters, {
    let log = LogCore::new(LogLevel::Warning, LogLevel::Emergency);

    test_log!(log, LogLevel::Error, "kept");
    test_log!(log, LogLevel::Info, "dropped");
    test_log!(log, LogLevel::Debug, "dropped");

    kassert!(log._log_len() == 1);
    kassert!(log._read_log().unwrap().message() == "kept");
});

test_case!(test_level_roundtrip, {
    let log = LogCore::new(LogLevel::Info, LogLevel::Warning);

    log._set_global_level(LogLevel::Debug);
    kassert!(log._get_global_level() == LogLevel::Debug);

    log._set_console_level(LogLevel::Error);
    kassert!(log._get_console_level() == LogLevel::Error);

    test_log!(log, LogLevel::Debug, "now visible");
    kassert!(log._log_len() == 1);
});

test_case!(test_level_from_u8_saturates, {
    kassert!(LogLevel::from_u8(3) == LogLevel::Error);
    kassert!(LogLevel::from_u8(42) == LogLevel::Debug);
    kassert!(LogLevel::Warning.as_str() == "[WARNING]");
});

static SINK_HITS: AtomicUsize = AtomicUsize::new(0);

fn counting_sink(entry: &LogEntry) {
    if entry.message().starts_with("sink:") {
        SINK_HITS.fetch_add(1, Ordering::SeqCst);
    }
}

test_case!(test_console_sink_threshold, {
    let log = LogCore::new(LogLevel::Debug, LogLevel::Warning);
    kassert!(log.set_console_sink(counting_sink));
    kassert!(!log.set_console_sink(counting_sink));

    test_log!(log, LogLevel::Error, "sink: page copy out of range");
    test_log!(log, LogLevel::Info, "sink: buffered only");

    kassert!(SINK_HITS.load(Ordering::SeqCst) == 1);
    kassert!(log._log_len() == 2);
});
