#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex, Once};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

static INIT: Once = Once::new();

pub fn tracing_init() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_file(false)
            .with_line_number(false)
            .with_thread_names(false)
            .with_target(false)
            .with_max_level(Level::DEBUG)
            .with_timer(ShortTime::default())
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ShortTime {
    epoch: chrono::DateTime<chrono::offset::Local>,
}

impl Default for ShortTime {
    fn default() -> Self {
        Self {
            epoch: chrono::Local::now(),
        }
    }
}

impl FormatTime for ShortTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let e = self.epoch;
        write!(w, "{}", e.format("%H:%M:%S"))
    }
}

/// Collects formatted log lines in memory so tests can assert on them.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        let buffer = self.buffer.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .with_max_level(Level::DEBUG)
            .with_writer(move || CaptureWriter(buffer.clone()))
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
