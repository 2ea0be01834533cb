//! Bounded capture of worker stdout/stderr.

/// Accumulates a stream up to `cap` bytes, then discards the rest.
#[derive(Debug)]
pub struct CappedBuffer {
    data: String,
    cap: usize,
    truncated: bool,
    stream: &'static str,
}

impl CappedBuffer {
    pub fn new(stream: &'static str, cap: usize) -> Self {
        Self {
            data: String::new(),
            cap,
            truncated: false,
            stream,
        }
    }

    /// Append as much of `text` as still fits. Never grows past the cap.
    pub fn push(&mut self, text: &str) {
        if self.truncated {
            return;
        }
        let remaining = self.cap - self.data.len();
        if text.len() <= remaining {
            self.data.push_str(text);
            return;
        }
        let mut cut = remaining;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        self.data.push_str(&text[..cut]);
        self.truncated = true;
        tracing::warn!(stream = self.stream, cap = self.cap, "Worker output truncated at cap");
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Last `max_chars` characters, for error messages.
    pub fn tail(&self, max_chars: usize) -> &str {
        let count = self.data.chars().count();
        if count <= max_chars {
            return &self.data;
        }
        match self.data.char_indices().nth(count - max_chars) {
            Some((idx, _)) => &self.data[idx..],
            None => &self.data,
        }
    }
}

/// Decodes byte chunks as UTF-8, holding back a sequence split across reads.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // error_len() == None: input ends mid-sequence, wait for the rest
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(valid_up_to);
        let ready = std::mem::replace(&mut self.pending, rest);
        String::from_utf8_lossy(&ready).into_owned()
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Splits a stream into lines for logging. A line longer than `max_line`
/// is emitted early rather than buffered without bound.
#[derive(Debug)]
pub struct LineSplitter {
    partial: String,
    max_line: usize,
}

impl LineSplitter {
    pub fn new(max_line: usize) -> Self {
        Self {
            partial: String::new(),
            max_line,
        }
    }

    pub fn push(&mut self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        for piece in text.split_inclusive('\n') {
            self.partial.push_str(piece);
            if self.partial.ends_with('\n') || self.partial.len() >= self.max_line {
                let line = std::mem::take(&mut self.partial);
                lines.push(line.trim_end_matches(['\r', '\n']).to_string());
            }
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}
