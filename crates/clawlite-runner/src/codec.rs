//! Incremental decoder for marker-framed worker output.
//!
//! Workers print each [`WorkerOutput`] between [`OUTPUT_START_MARKER`] and
//! [`OUTPUT_END_MARKER`]. Pipe reads do not respect those boundaries, so the
//! codec buffers text until a full frame is available. Text outside frames is
//! ignored.

use clawlite_core::protocol::{WorkerOutput, OUTPUT_END_MARKER, OUTPUT_START_MARKER};

/// Streaming frame extractor. One per invocation.
#[derive(Debug)]
pub struct OutputCodec {
    buffer: String,
    /// Largest pending (unterminated) frame kept before it is dropped.
    max_pending: usize,
}

impl OutputCodec {
    pub fn new(max_pending: usize) -> Self {
        Self {
            buffer: String::new(),
            max_pending,
        }
    }

    /// Append a chunk and return the complete records it unlocked, in stream order.
    ///
    /// The iterator is lazy: records are extracted as it is advanced, and any
    /// records not consumed stay buffered for the next call.
    pub fn push(&mut self, chunk: &str) -> Records<'_> {
        self.buffer.push_str(chunk);
        Records { codec: self }
    }

    /// Bytes currently held while waiting for more input.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn next_record(&mut self) -> Option<WorkerOutput> {
        loop {
            let Some(start) = self.buffer.find(OUTPUT_START_MARKER) else {
                self.discard_unframed();
                return None;
            };
            if start > 0 {
                self.buffer.drain(..start);
            }
            let body_start = OUTPUT_START_MARKER.len();
            let Some(end_rel) = self.buffer[body_start..].find(OUTPUT_END_MARKER) else {
                self.enforce_pending_limit();
                return None;
            };
            let end = body_start + end_rel;
            let parsed = serde_json::from_str::<WorkerOutput>(self.buffer[body_start..end].trim());
            self.buffer.drain(..end + OUTPUT_END_MARKER.len());

            match parsed {
                Ok(record) => return Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed output record");
                }
            }
        }
    }

    /// No start marker in the buffer: keep only a tail that could still be the
    /// beginning of a split marker.
    fn discard_unframed(&mut self) {
        let keep = OUTPUT_START_MARKER.len() - 1;
        if self.buffer.len() <= keep {
            return;
        }
        let mut cut = self.buffer.len() - keep;
        while !self.buffer.is_char_boundary(cut) {
            cut += 1;
        }
        self.buffer.drain(..cut);
    }

    fn enforce_pending_limit(&mut self) {
        if self.buffer.len() > self.max_pending {
            tracing::warn!(
                pending_bytes = self.buffer.len(),
                limit = self.max_pending,
                "Unterminated output record exceeded limit, dropping it"
            );
            self.buffer.clear();
        }
    }
}

/// Records unlocked by one [`OutputCodec::push`].
pub struct Records<'a> {
    codec: &'a mut OutputCodec,
}

impl Iterator for Records<'_> {
    type Item = WorkerOutput;

    fn next(&mut self) -> Option<Self::Item> {
        self.codec.next_record()
    }
}

/// Raw text of the terminal record in a fully captured stdout.
///
/// Prefers the last complete start/end frame; without one, falls back to the
/// last non-empty line.
pub fn extract_terminal_record(stdout: &str) -> Option<&str> {
    let mut search_end = stdout.len();
    while let Some(end) = stdout[..search_end].rfind(OUTPUT_END_MARKER) {
        if let Some(start) = stdout[..end].rfind(OUTPUT_START_MARKER) {
            return Some(stdout[start + OUTPUT_START_MARKER.len()..end].trim());
        }
        search_end = end;
    }
    stdout.lines().map(str::trim).rev().find(|l| !l.is_empty())
}
