//! Output capture for child processes.
//!
//! Each captured stream is drained by its own reader thread into a bounded
//! buffer, so a child that floods its stdout or stderr can never block on a
//! full pipe while the control thread is busy elsewhere.

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Bytes kept per stream; older output is discarded first
pub const DEFAULT_CAPTURE_LIMIT: usize = 64 * 1024;

/// A stream being drained in the background
pub struct StreamCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    closed: mpsc::Receiver<()>,
}

impl StreamCapture {
    /// Start draining `reader` on a background thread, keeping at most `limit` bytes
    pub fn spawn<R>(reader: R, label: String, limit: usize) -> Self
    where
        R: Read + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        let sink = Arc::clone(&buffer);

        let spawned = thread::Builder::new()
            .name(format!("capture-{}", label))
            .spawn(move || {
                drain(reader, &sink, limit);
                let _ = tx.send(());
            });
        if let Err(e) = spawned {
            log::warn!("Could not start output capture for {}: {}", label, e);
        }

        Self { buffer, closed: rx }
    }

    /// Wait until the stream reaches end-of-file, at most `timeout`.
    ///
    /// Returns false if the stream is still open when the timeout expires.
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        match self.closed.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Everything captured so far, lossily decoded
    pub fn contents(&self) -> String {
        let guard = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&guard).into_owned()
    }
}

fn drain<R: Read>(mut reader: R, sink: &Mutex<Vec<u8>>, limit: usize) {
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let mut guard = sink.lock().unwrap_or_else(|e| e.into_inner());
                guard.extend_from_slice(&chunk[..n]);
                if guard.len() > limit {
                    let excess = guard.len() - limit;
                    guard.drain(..excess);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_captures_whole_stream() {
        let capture = StreamCapture::spawn(Cursor::new(b"hello\nworld\n".to_vec()), "t".into(), 1024);
        assert!(capture.wait_closed(Duration::from_secs(5)));
        assert_eq!(capture.contents(), "hello\nworld\n");
        // A second wait after close still reports closed
        assert!(capture.wait_closed(Duration::from_millis(1)));
    }

    #[test]
    fn test_keeps_only_the_tail() {
        let data: Vec<u8> = (0..10_000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let expected = String::from_utf8(data[data.len() - 100..].to_vec()).unwrap();
        let capture = StreamCapture::spawn(Cursor::new(data), "t".into(), 100);
        assert!(capture.wait_closed(Duration::from_secs(5)));
        assert_eq!(capture.contents(), expected);
    }
}
