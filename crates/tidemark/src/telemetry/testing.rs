// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Captures `tracing` output so tests can assert on emitted cache events.

use std::{io, sync::Arc};

use parking_lot::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt};

/// Buffer of formatted cache events.
///
/// Install per thread with `tracing::subscriber::set_default(capture.subscriber())`.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "`{expected}` not found in captured events:\n{output}");
    }

    pub fn subscriber(&self) -> impl tracing::Subscriber {
        let capture = self.clone();
        tracing_subscriber::registry().with(
            fmt::layer()
                .without_time()
                .with_ansi(false)
                .with_writer(move || capture.clone()),
        )
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
