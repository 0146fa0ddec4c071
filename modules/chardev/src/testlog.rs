//! Logger for tests that records what the current thread logged.

use std::{boxed::Box, cell::RefCell, string::String, string::ToString, sync::Once, vec::Vec};

use log::{Level, LevelFilter, Log, Metadata, Record};

std::thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

struct Capture {
    inner: env_logger::Logger,
}

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| {
            r.borrow_mut()
                .push((record.level(), record.args().to_string()))
        });
        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs the logger once per test binary and clears this thread's records.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let inner = env_logger::Builder::from_default_env().is_test(true).build();
        if log::set_logger(Box::leak(Box::new(Capture { inner }))).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
    take();
}

/// Drains this thread's records at info level and above.
pub fn take() -> Vec<(Level, String)> {
    RECORDS
        .with(|r| r.take())
        .into_iter()
        .filter(|(level, _)| *level <= Level::Info)
        .collect()
}
