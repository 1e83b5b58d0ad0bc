//! Newline-delimited JSON record input.

use super::ConnectionRecord;
use crate::error::RecordError;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::info;

/// Yields one record per non-blank line. Undecodable lines come back as errors
/// carrying their line number; iteration continues past them. An I/O error is
/// yielded once and ends the iteration.
pub struct RecordReader<R> {
    inner: R,
    line: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Lines consumed so far, blank ones included.
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<ConnectionRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    self.line += 1;
                    let line = self.line;
                    let text = match std::str::from_utf8(&self.buf) {
                        Ok(text) => text.trim(),
                        Err(_) => return Some(Err(RecordError::Utf8 { line })),
                    };
                    if text.is_empty() {
                        continue;
                    }
                    return Some(
                        ConnectionRecord::from_json(text)
                            .map_err(|source| RecordError::Json { line, source }),
                    );
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for RecordReader<R> {}

/// Run a [`RecordReader`] on its own thread, handing records over a channel
/// holding at most `depth` of them. The channel disconnects at end of input.
pub fn read_in_background<R>(
    input: R,
    depth: usize,
) -> io::Result<Receiver<Result<ConnectionRecord, RecordError>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(depth);
    thread::Builder::new()
        .name("record-reader".into())
        .spawn(move || {
            let mut reader = RecordReader::new(input);
            for item in reader.by_ref() {
                if tx.send(item).is_err() {
                    return;
                }
            }
            info!(lines = reader.lines_read(), "input exhausted");
        })?;
    Ok(rx)
}
