//! Reassembly of complete lines from arbitrary output chunks.

/// Per-stream line buffer.
///
/// Bytes are held until a `\r` or `\n` arrives, so a chunk boundary never
/// splits a line or a multi-byte character. Runs of separators count as one
/// and empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

fn is_separator(b: &u8) -> bool {
    *b == b'\r' || *b == b'\n'
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_sep) = self.pending.iter().rposition(is_separator) else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_sep + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(is_separator)
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Returns the trailing partial line, if any, and empties the buffer.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }

    /// Bytes waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
