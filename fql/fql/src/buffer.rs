//! A bounded byte store with a line-extraction primitive, used to chop the
//! child's pipe output into lines.

/// Maximum number of buffered bytes; longer lines invalidate the buffer.
pub const MAX_BUFFER_SIZE: usize = 4096;

#[derive(Debug)]
pub struct LineBuffer {
    data: Vec<u8>,
    valid: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer {
            data: Vec::with_capacity(64),
            valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Drops the content and makes an invalidated buffer usable again.
    pub fn clear(&mut self) {
        self.data.clear();
        self.valid = true;
    }

    /// Append bytes. Returns false and invalidates the buffer when the
    /// content would exceed [`MAX_BUFFER_SIZE`]; an invalid buffer ignores
    /// all fills until cleared.
    pub fn fill(&mut self, bytes: &[u8]) -> bool {
        if !self.valid {
            return false;
        }

        if self.data.len() + bytes.len() > MAX_BUFFER_SIZE {
            self.valid = false;
            return false;
        }

        self.data.extend_from_slice(bytes);
        true
    }

    /// Pop the first complete line, without its line break.
    pub fn read_line(&mut self) -> Option<String> {
        if !self.valid {
            return None;
        }

        let pos = self.data.iter().position(|b| *b == b'\n')?;
        let line = String::from_utf8_lossy(&self.data[..pos]).into_owned();
        self.data.drain(..=pos);

        Some(line)
    }

    /// Drain any remaining bytes as a final, unterminated line.
    pub fn flush(&mut self) -> Option<String> {
        if !self.valid || self.data.is_empty() {
            return None;
        }

        let rest = String::from_utf8_lossy(&self.data).into_owned();
        self.data.clear();

        Some(rest)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_complete_lines() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.fill(b"first\nsec"));
        assert_eq!(buffer.read_line().as_deref(), Some("first"));
        assert_eq!(buffer.read_line(), None);

        assert!(buffer.fill(b"ond\n"));
        assert_eq!(buffer.read_line().as_deref(), Some("second"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn flush_returns_the_remainder() {
        let mut buffer = LineBuffer::new();

        buffer.fill(b"no newline");
        assert_eq!(buffer.flush().as_deref(), Some("no newline"));
        assert_eq!(buffer.flush(), None);
    }

    #[test]
    fn overflow_invalidates() {
        let mut buffer = LineBuffer::new();

        assert!(buffer.fill(&[b'x'; MAX_BUFFER_SIZE]));
        assert!(!buffer.fill(b"y"));
        assert!(!buffer.is_valid());

        // Invalid buffers ignore further fills until cleared.
        assert!(!buffer.fill(b"z"));
        assert_eq!(buffer.read_line(), None);

        buffer.clear();
        assert!(buffer.is_valid());
        assert!(buffer.fill(b"ok\n"));
        assert_eq!(buffer.read_line().as_deref(), Some("ok"));
    }
}
