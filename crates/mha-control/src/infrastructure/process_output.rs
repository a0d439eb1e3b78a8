//! Background capture of a child process's console output.
//!
//! When an MHA server is started as a local process its stdout and stderr
//! must be drained, otherwise the process blocks once the pipe buffer is
//! full.  [`OutputCollector`] drains one such stream on a dedicated thread
//! and either keeps the text for diagnostics or throws it away.
//!
//! The collector knows nothing about [`Session`](super::network::Session).
//! The only state it shares with other threads is the text buffer behind a
//! mutex, read through [`OutputCollector::snapshot`].
//!
//! ```ignore
//! let mut child = Command::new("mha").stdout(Stdio::piped()).spawn()?;
//! let stdout = child.stdout.take().unwrap();
//! let collector = OutputCollector::spawn("mha-stdout", stdout, CaptureMode::Store)?;
//! // ... later
//! println!("{}", collector.snapshot().unwrap_or_default());
//! ```

use std::io::{self, BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

/// What to do with the lines read from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Append every line (plus `\n`) to the shared buffer.
    Store,
    /// Read and drop every line.
    Discard,
}

/// Drains a text stream line by line on its own thread.
#[derive(Debug)]
pub struct OutputCollector {
    storage: Option<Arc<Mutex<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl OutputCollector {
    /// Starts a thread named `name` that reads `reader` until end of stream.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<R>(name: &str, reader: R, mode: CaptureMode) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let storage = match mode {
            CaptureMode::Store => Some(Arc::new(Mutex::new(String::new()))),
            CaptureMode::Discard => None,
        };
        let sink = storage.clone();
        let thread_name = name.to_string();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            match drain_lines(reader, sink.as_deref()) {
                Ok(lines) => debug!("{thread_name}: end of stream after {lines} line(s)"),
                Err(e) => warn!("{thread_name}: stopped reading: {e}"),
            }
        })?;

        Ok(Self {
            storage,
            handle: Some(handle),
        })
    }

    /// Text received so far, or `None` when the collector discards input.
    pub fn snapshot(&self) -> Option<String> {
        self.storage.as_ref().map(|storage| {
            storage
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    /// `true` once the reader thread has reached end of stream or an error.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the reader thread to finish and returns the final text.
    pub fn join(mut self) -> Option<String> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("output collector thread panicked");
            }
        }
        self.snapshot()
    }
}

/// Reads `reader` to the end, appending each line to `sink` when present.
///
/// Line terminators (`\n` or `\r\n`) are normalised to `\n`; invalid UTF-8 is
/// replaced.  Returns the number of lines read.
fn drain_lines<R: Read>(reader: R, sink: Option<&Mutex<String>>) -> io::Result<usize> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(count);
        }
        count += 1;

        let Some(sink) = sink else { continue };
        let mut line = buf.as_slice();
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped.strip_suffix(b"\r").unwrap_or(stripped);
        }
        let mut text = sink.lock().unwrap_or_else(PoisonError::into_inner);
        text.push_str(&String::from_utf8_lossy(line));
        text.push('\n');
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
