//! Position-tracked scanning view over the accumulated body bytes.
//!
//! A [`ByteCursor`] borrows the decoder's accumulation buffer for the
//! duration of one decode step. All reads move a local position; the
//! underlying buffer is only consumed by an explicit [`ByteCursor::commit`]
//! once a step fully confirmed what it read. A step that runs out of input
//! simply drops the cursor and nothing was consumed, which is what makes
//! "feed more bytes and retry" safe.

use bytes::{Buf, BytesMut};

pub(crate) struct ByteCursor<'a> {
    src: &'a mut BytesMut,
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(src: &'a mut BytesMut) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn rewind(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    pub(crate) fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    /// Reads one line up to CRLF or LF, without the terminator.
    ///
    /// Returns `None` when no complete line is buffered yet, rewinding to
    /// where the read started. A lone CR at the end of input counts as
    /// incomplete since the matching LF may still arrive.
    pub(crate) fn read_line(&mut self) -> Option<String> {
        let mark = self.position();
        let mut line = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'\n' {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            line.push(b);
        }
        self.rewind(mark);
        None
    }

    /// Advances past leading control characters and spaces.
    pub(crate) fn skip_control_chars(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_control() || b == b' ' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Consumes everything read so far from the underlying buffer.
    pub(crate) fn commit(self) {
        self.src.advance(self.pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_line_handles_both_terminators() {
        let mut buf = BytesMut::from(&b"first\r\nsecond\nrest"[..]);
        let mut cursor = ByteCursor::new(&mut buf);
        assert_eq!(cursor.read_line().unwrap(), "first");
        assert_eq!(cursor.read_line().unwrap(), "second");
        assert_eq!(cursor.read_line(), None);
        cursor.commit();
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn incomplete_line_restores_position() {
        let mut buf = BytesMut::from(&b"no terminator"[..]);
        let mut cursor = ByteCursor::new(&mut buf);
        assert_eq!(cursor.read_line(), None);
        assert_eq!(cursor.position(), 0);

        // a trailing CR is not a complete line either
        let mut buf = BytesMut::from(&b"almost\r"[..]);
        let mut cursor = ByteCursor::new(&mut buf);
        assert_eq!(cursor.read_line(), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn uncommitted_reads_leave_buffer_intact() {
        let mut buf = BytesMut::from(&b"line\r\nmore"[..]);
        {
            let mut cursor = ByteCursor::new(&mut buf);
            assert!(cursor.read_line().is_some());
            // dropped without commit
        }
        assert_eq!(&buf[..], b"line\r\nmore");
    }

    #[test]
    fn skip_control_chars_stops_at_content() {
        let mut buf = BytesMut::from(&b"\r\n\t  --boundary"[..]);
        let mut cursor = ByteCursor::new(&mut buf);
        cursor.skip_control_chars();
        assert_eq!(cursor.read_line(), None);
        assert_eq!(cursor.remaining(), 10);
    }

    #[test]
    fn rewind_restores_a_mark() {
        let mut buf = BytesMut::from(&b"one\r\ntwo\r\n"[..]);
        let mut cursor = ByteCursor::new(&mut buf);
        let mark = cursor.position();
        assert_eq!(cursor.read_line().unwrap(), "one");
        cursor.rewind(mark);
        assert_eq!(cursor.read_line().unwrap(), "one");
    }
}
