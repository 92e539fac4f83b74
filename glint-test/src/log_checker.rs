use std::{cell::RefCell, sync::Once};

use log::{Level, Log, Metadata, Record};

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(Level, String)>>> = RefCell::new(None);
}

/// Forwards to env_logger and copies records into the capture of the
/// logging thread, if it has one.
struct CapturingLogger {
    inner: env_logger::Logger,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|captured| {
            if let Some(captured) = captured.borrow_mut().as_mut() {
                captured.push((record.level(), record.args().to_string()));
            }
        });
        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn install() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let inner = env_logger::Builder::from_default_env().is_test(true).build();
        if log::set_boxed_logger(Box::new(CapturingLogger { inner })).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

/// Captures everything logged on the current thread while alive.
pub struct LogChecker {
    _private: (),
}

impl LogChecker {
    pub fn start() -> Self {
        install();
        CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
        Self { _private: () }
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        CAPTURED.with(|captured| captured.borrow().clone().unwrap_or_default())
    }

    /// Messages at warning level or more severe.
    pub fn warnings(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(level, _)| *level <= Level::Warn)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, message)| message)
            .collect()
    }

    /// Number of warnings or errors containing `needle`.
    pub fn count_warnings(&self, needle: &str) -> usize {
        self.warnings().iter().filter(|message| message.contains(needle)).count()
    }

    pub fn clear(&self) {
        CAPTURED.with(|captured| {
            if let Some(captured) = captured.borrow_mut().as_mut() {
                captured.clear();
            }
        });
    }
}

impl Drop for LogChecker {
    fn drop(&mut self) {
        CAPTURED.with(|captured| *captured.borrow_mut() = None);
    }
}
