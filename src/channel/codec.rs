//! # Bounded line framing.
//!
//! [`LineCodec`] splits a byte stream on `\n`. It is the buffered-read cursor for
//! the supervisor's own input and for every worker channel.
//!
//! ## Rules
//! - A complete line is yielded without its terminator; bytes are kept verbatim
//!   (no UTF-8 validation, `\r` is preserved).
//! - A trailing partial line stays in the buffer until its terminator arrives.
//! - A line longer than `max_length` is **truncated**, not rejected: the first
//!   `max_length` bytes are yielded with [`Line::truncated`] set, and the rest of
//!   that line (up to and including the next `\n`) is skipped.
//! - [`Decoder::decode_eof`] yields a final unterminated line. Worker channels
//!   never call it: their partial lines are discarded when the worker dies.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// A framed line, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line content.
    pub bytes: BytesMut,
    /// Set when the original line exceeded the bound and was cut.
    pub truncated: bool,
}

impl Line {
    /// Returns the content followed by a single `\n`.
    pub fn terminated(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + 1);
        out.extend_from_slice(&self.bytes);
        out.push(b'\n');
        out
    }
}

/// Newline framing with a maximum line length.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_length: usize,
    /// Skipping the tail of a truncated line.
    discarding: bool,
}

impl LineCodec {
    /// Creates a codec that truncates lines longer than `max_length` bytes.
    ///
    /// `max_length` is clamped to a minimum of 1.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            discarding: false,
        }
    }

    /// Forgets any truncation in progress.
    ///
    /// Used together with clearing the buffer when a slot is recycled.
    pub fn reset(&mut self) {
        self.discarding = false;
    }
}

impl Decoder for LineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        loop {
            if self.discarding {
                match buf.iter().position(|b| *b == b'\n') {
                    Some(at) => {
                        buf.advance(at + 1);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
            }

            let window = buf.len().min(self.max_length + 1);
            if let Some(at) = buf[..window].iter().position(|b| *b == b'\n') {
                let mut bytes = buf.split_to(at + 1);
                bytes.truncate(at);
                return Ok(Some(Line {
                    bytes,
                    truncated: false,
                }));
            }

            if buf.len() > self.max_length {
                let bytes = buf.split_to(self.max_length);
                self.discarding = true;
                return Ok(Some(Line {
                    bytes,
                    truncated: true,
                }));
            }

            return Ok(None);
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if self.discarding || buf.is_empty() {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        let bytes = buf.split_to(buf.len());
        Ok(Some(Line {
            bytes,
            truncated: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<Line> {
        let mut out = Vec::new();
        while let Some(line) = codec.decode(buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn splits_complete_lines_and_keeps_the_partial_tail() {
        let mut codec = LineCodec::new(64);
        let mut buf = BytesMut::from(&b"3 4 +\n10 0 /\n5 5"[..]);

        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0].bytes[..], b"3 4 +");
        assert_eq!(&lines[1].bytes[..], b"10 0 /");
        assert_eq!(&buf[..], b"5 5");

        buf.extend_from_slice(b" *\n");
        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(&lines[0].bytes[..], b"5 5 *");
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_line_is_truncated_and_the_tail_skipped() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"abcdefgh\nok\n"[..]);

        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0].bytes[..], b"abcd");
        assert!(lines[0].truncated);
        assert_eq!(&lines[1].bytes[..], b"ok");
        assert!(!lines[1].truncated);
    }

    #[test]
    fn tail_skipping_survives_split_reads() {
        let mut codec = LineCodec::new(3);
        let mut buf = BytesMut::from(&b"xxxxx"[..]);

        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines.len(), 1);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"yyy\nz\n");
        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines.len(), 1);
        assert_eq!(&lines[0].bytes[..], b"z");
    }

    #[test]
    fn line_of_exactly_max_length_is_not_truncated() {
        let mut codec = LineCodec::new(3);
        let mut buf = BytesMut::from(&b"abc\n"[..]);
        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(&lines[0].bytes[..], b"abc");
        assert!(!lines[0].truncated);
    }

    #[test]
    fn eof_flushes_an_unterminated_line() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::from(&b"last"[..]);
        let line = codec.decode_eof(&mut buf).unwrap().expect("line");
        assert_eq!(&line.bytes[..], b"last");
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn bytes_are_kept_verbatim() {
        let mut codec = LineCodec::new(16);
        let mut buf = BytesMut::from(&b"a\r\n\xff\xfe\n"[..]);
        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(&lines[0].bytes[..], b"a\r");
        assert_eq!(&lines[1].bytes[..], b"\xff\xfe");
        assert_eq!(lines[1].terminated(), b"\xff\xfe\n".to_vec());
    }
}
