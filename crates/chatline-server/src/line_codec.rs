//! Inbound line framing.
//!
//! Splits the client byte stream on `\n` with a hard cap on line length.
//! A line longer than the cap is reported once as [`InboundLine::Oversize`]
//! and its bytes are discarded up to and including the next newline, so the
//! server never buffers more than the cap for a single line.
//!
//! Bytes are decoded leniently: invalid UTF-8 becomes U+FFFD instead of
//! ending the connection. A trailing `\r` is stripped.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// One framed unit of client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// Complete line, without its terminator
    Line(String),
    /// Line exceeded the length cap and was dropped
    Oversize,
}

/// Newline decoder with a length cap.
#[derive(Debug)]
pub struct LineCodec {
    max_len: usize,
    /// Dropping bytes of an oversize line until the next newline
    discarding: bool,
    /// Bytes already searched for a newline
    next_index: usize,
}

impl LineCodec {
    /// Decoder accepting lines of at most `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self { max_len, discarding: false, next_index: 0 }
    }
}

impl Decoder for LineCodec {
    type Item = InboundLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (self.discarding, newline) {
                (true, Some(at)) => {
                    buf.advance(at + 1);
                    self.discarding = false;
                    self.next_index = 0;
                },
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                },
                (false, Some(at)) => {
                    let line = buf.split_to(at + 1);
                    self.next_index = 0;

                    let content = strip_cr(&line[..at]);
                    if content.len() > self.max_len {
                        return Ok(Some(InboundLine::Oversize));
                    }
                    return Ok(Some(InboundLine::Line(
                        String::from_utf8_lossy(content).into_owned(),
                    )));
                },
                (false, None) if buf.len() > self.max_len + 1 => {
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(InboundLine::Oversize));
                },
                (false, None) => {
                    self.next_index = buf.len();
                    return Ok(None);
                },
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(buf)? {
            return Ok(Some(item));
        }
        if self.discarding || buf.is_empty() {
            return Ok(None);
        }

        // Unterminated final line
        let line = buf.split();
        self.next_index = 0;
        let content = strip_cr(&line);
        if content.len() > self.max_len {
            return Ok(Some(InboundLine::Oversize));
        }
        Ok(Some(InboundLine::Line(String::from_utf8_lossy(content).into_owned())))
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, input: &[u8]) -> Vec<InboundLine> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(item) = codec.decode(&mut buf).unwrap() {
            out.push(item);
        }
        out
    }

    fn line(text: &str) -> InboundLine {
        InboundLine::Line(text.to_string())
    }

    #[test]
    fn splits_lines_and_strips_cr() {
        let mut codec = LineCodec::new(64);

        let items = decode_all(&mut codec, b"LOGIN alice pw1\r\nhello\n\n");

        assert_eq!(items, vec![line("LOGIN alice pw1"), line("hello"), line("")]);
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut codec = LineCodec::new(64);
        let mut buf = BytesMut::from(&b"hel"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"lo\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line("hello")));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let mut codec = LineCodec::new(64);

        let items = decode_all(&mut codec, b"caf\xe9\nnext\n");

        assert_eq!(items, vec![line("caf\u{FFFD}"), line("next")]);
    }

    #[test]
    fn oversize_line_is_reported_once_and_skipped() {
        let mut codec = LineCodec::new(8);
        let mut buf = BytesMut::new();

        // Arrives in chunks, never buffering the whole line
        buf.extend_from_slice(&[b'x'; 20]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(InboundLine::Oversize));
        assert!(buf.is_empty());

        buf.extend_from_slice(&[b'x'; 20]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"xxxx\nok\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(line("ok")));
    }

    #[test]
    fn complete_oversize_line_is_dropped() {
        let mut codec = LineCodec::new(4);

        let items = decode_all(&mut codec, b"toolong\nfine\n");

        assert_eq!(items, vec![InboundLine::Oversize, line("fine")]);
    }

    #[test]
    fn line_at_cap_is_accepted() {
        let mut codec = LineCodec::new(4);

        let items = decode_all(&mut codec, b"four\r\n");

        assert_eq!(items, vec![line("four")]);
    }

    #[test]
    fn unterminated_final_line_is_delivered_at_eof() {
        let mut codec = LineCodec::new(64);
        let mut buf = BytesMut::from(&b"LOGOUT"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(line("LOGOUT")));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn unterminated_oversize_line_is_dropped_at_eof() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"fives"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(InboundLine::Oversize));
    }
}
