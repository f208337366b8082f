use crate::error::NoCompleteLine;
use std::borrow::Cow;
use std::fmt;

/// Which of the child's output streams a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Stdout, StreamKind::Stderr];

    pub fn index(self) -> usize {
        match self {
            StreamKind::Stdout => 0,
            StreamKind::Stderr => 1,
        }
    }

    pub fn other(self) -> StreamKind {
        match self {
            StreamKind::Stdout => StreamKind::Stderr,
            StreamKind::Stderr => StreamKind::Stdout,
        }
    }

    pub fn is_stdout(self) -> bool {
        self == StreamKind::Stdout
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complete newline-terminated line of child output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub stream: StreamKind,
    pub bytes: Vec<u8>,
}

impl Line {
    pub fn new(stream: StreamKind, bytes: Vec<u8>) -> Self {
        Self { stream, bytes }
    }

    /// Line text including the trailing newline, invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn is_stdout(&self) -> bool {
        self.stream.is_stdout()
    }
}

/// Accumulates raw reads from one stream and hands out complete lines in order.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    // bytes before this offset are known to contain no newline
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn has_complete_line(&mut self) -> bool {
        self.newline_position().is_some()
    }

    /// True when the buffer ends in bytes that are not yet newline-terminated
    pub fn has_incomplete_line(&self) -> bool {
        self.buf.last().is_some_and(|&b| b != b'\n')
    }

    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Remove and return the earliest complete line, newline included.
    pub fn pop_line(&mut self) -> Result<Vec<u8>, NoCompleteLine> {
        let eol = self.newline_position().ok_or(NoCompleteLine)?;
        let rest = self.buf.split_off(eol + 1);
        self.scanned = 0;
        Ok(std::mem::replace(&mut self.buf, rest))
    }

    fn newline_position(&mut self) -> Option<usize> {
        match self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => Some(self.scanned + offset),
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let mut buffer = LineBuffer::new();
        assert!(!buffer.has_complete_line());
        assert!(!buffer.has_incomplete_line());
        assert_eq!(buffer.pop_line(), Err(NoCompleteLine));
    }

    #[test]
    fn test_lines_come_out_in_order() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"one\ntwo\nthr");

        assert!(buffer.has_complete_line());
        assert!(buffer.has_incomplete_line());
        assert_eq!(buffer.pop_line().unwrap(), b"one\n");
        assert_eq!(buffer.pop_line().unwrap(), b"two\n");
        assert_eq!(buffer.pop_line(), Err(NoCompleteLine));
        assert_eq!(buffer.pending_len(), 3);

        buffer.push(b"ee\n");
        assert!(!buffer.has_incomplete_line());
        assert_eq!(buffer.pop_line().unwrap(), b"three\n");
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_fragment_reassembled_across_pushes() {
        let mut buffer = LineBuffer::new();
        let long = "x".repeat(8191);
        for chunk in long.as_bytes().chunks(1024) {
            buffer.push(chunk);
            assert!(!buffer.has_complete_line());
        }
        buffer.push(b"\n");

        let line = buffer.pop_line().unwrap();
        assert_eq!(line.len(), 8192);
        assert_eq!(line.last(), Some(&b'\n'));
        assert!(!buffer.has_complete_line());
    }

    #[test]
    fn test_empty_lines_are_lines() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"\n\n");
        assert_eq!(buffer.pop_line().unwrap(), b"\n");
        assert_eq!(buffer.pop_line().unwrap(), b"\n");
        assert!(buffer.pop_line().is_err());
    }

    #[test]
    fn test_stream_kind() {
        assert_eq!(StreamKind::Stdout.other(), StreamKind::Stderr);
        assert_eq!(StreamKind::Stderr.index(), 1);
        assert!(StreamKind::Stdout.is_stdout());
        assert_eq!(StreamKind::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_line_text_is_lossy() {
        let line = Line::new(StreamKind::Stdout, vec![b'a', 0xff, b'\n']);
        assert_eq!(line.text(), "a\u{fffd}\n");
        assert!(line.is_stdout());
    }
}
