//! Write-only destination for the current code (clipboard, notification).

use std::sync::Mutex;

pub trait CodeSink: Send + Sync {
    /// Hand the code to the platform. Nothing flows back into the core.
    fn push_code(&self, code: &str);
}

/// Sink that discards every code, for hosts without a clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CodeSink for NullSink {
    fn push_code(&self, _code: &str) {}
}

/// Sink that remembers the last code pushed.
#[derive(Debug, Default)]
pub struct MemorySink {
    last: Mutex<Option<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

impl CodeSink for MemorySink {
    fn push_code(&self, code: &str) {
        if let Ok(mut last) = self.last.lock() {
            *last = Some(code.to_string());
        }
    }
}
