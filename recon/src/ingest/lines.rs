use bytes::{Buf, Bytes, BytesMut};

/// Reassembles newline-terminated lines from arbitrarily sized chunks.
///
/// Bytes are kept undecoded until a full line is available, so a multi-byte character split
/// across two chunks decodes the same as when delivered whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: BytesMut,
    /// Offset up to which `buffer` is known not to contain a newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk received from the stream.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete line without its terminator.
    ///
    /// A `\r` preceding the `\n` is dropped as well.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let newline = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
            .map(|offset| self.scanned + offset);

        let Some(newline) = newline else {
            self.scanned = self.buffer.len();
            return None;
        };

        let line = self.buffer.split_to(newline).freeze();
        self.buffer.advance(1);
        self.scanned = 0;

        Some(trim_carriage_return(line))
    }

    /// Returns the unterminated remainder once the stream has ended, if it is not empty.
    pub fn finish(self) -> Option<Bytes> {
        let rest = trim_carriage_return(self.buffer.freeze());
        (!rest.is_empty()).then_some(rest)
    }

    /// Number of bytes waiting for a line terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

fn trim_carriage_return(mut line: Bytes) -> Bytes {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line
}
