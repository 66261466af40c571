//! Line framing for the RN2483 serial interface.
//!
//! The radio speaks ASCII. Every command and every response is a single
//! line terminated by `\r\n`:
//! ```text
//! > radio rx 0\r\n
//! < ok\r\n
//! < radio_rx  48656C6C6F\r\n
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Line terminator used by the RN2483.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Maximum line length accepted from the radio.
///
/// The longest legitimate line is a received packet: `radio_rx` plus up to
/// 255 payload bytes in hexadecimal.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Encodes a command into a terminated line.
#[must_use]
pub fn encode_line(line: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(line.len() + LINE_TERMINATOR.len());
    buf.put_slice(line.as_bytes());
    buf.put_slice(LINE_TERMINATOR);
    buf.freeze()
}

/// Line decoder that handles partial data.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
}

impl LineDecoder {
    /// Creates a new line decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete line.
    ///
    /// Returns `Ok(Some(line))` without its terminator, `Ok(None)` if more
    /// data is needed. Empty lines are skipped. A lone `\n` terminates a
    /// line as well as `\r\n`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::LineTooLong`] if more than [`MAX_LINE_LENGTH`]
    /// bytes arrive without a terminator. The buffered bytes are discarded.
    pub fn decode(&mut self) -> Result<Option<String>, FrameError> {
        loop {
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    return Err(FrameError::LineTooLong {
                        size,
                        max: MAX_LINE_LENGTH,
                    });
                }
                return Ok(None);
            };

            let mut line = self.buffer.split_to(end);
            self.buffer.advance(1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if line.len() > MAX_LINE_LENGTH {
                return Err(FrameError::LineTooLong {
                    size: line.len(),
                    max: MAX_LINE_LENGTH,
                });
            }

            if line.is_empty() {
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// A response line from the RN2483.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioResponse {
    /// Command accepted.
    Ok,
    /// A packet was received.
    Rx(Bytes),
    /// Reception failed (timeout or CRC error).
    RxError,
    /// Transmission completed.
    TxOk,
    /// Transmission failed.
    TxError,
    /// A command parameter was rejected.
    InvalidParam,
    /// The radio is busy.
    Busy,
    /// Any other line (version strings, numeric replies).
    Other(String),
}

impl RadioResponse {
    /// Classifies a response line.
    ///
    /// A `radio_rx` line with an invalid hexadecimal payload is returned as
    /// [`RadioResponse::Other`] so the caller can report it.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "ok" => Self::Ok,
            "radio_err" => Self::RxError,
            "radio_tx_ok" => Self::TxOk,
            "radio_tx_err" => Self::TxError,
            "invalid_param" => Self::InvalidParam,
            "busy" => Self::Busy,
            _ => match line.strip_prefix("radio_rx") {
                Some(payload) => match hex::decode(payload.trim()) {
                    Ok(bytes) => Self::Rx(Bytes::from(bytes)),
                    Err(_) => Self::Other(line.to_owned()),
                },
                None => Self::Other(line.to_owned()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line() {
        assert_eq!(encode_line("radio rx 0"), Bytes::from_static(b"radio rx 0\r\n"));
    }

    #[test]
    fn test_decode_complete_line() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"ok\r\n");
        assert_eq!(decoder.decode().unwrap(), Some("ok".to_owned()));
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"radio_");
        assert_eq!(decoder.decode().unwrap(), None);

        decoder.feed(b"err\r");
        assert_eq!(decoder.decode().unwrap(), None);

        decoder.feed(b"\n");
        assert_eq!(decoder.decode().unwrap(), Some("radio_err".to_owned()));
    }

    #[test]
    fn test_decode_multiple_lines_and_blanks() {
        let mut decoder = LineDecoder::new();
        decoder.feed(b"ok\r\n\r\n\nradio_tx_ok\n");
        assert_eq!(decoder.decode().unwrap(), Some("ok".to_owned()));
        assert_eq!(decoder.decode().unwrap(), Some("radio_tx_ok".to_owned()));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_decode_line_too_long() {
        let mut decoder = LineDecoder::new();
        decoder.feed(&[b'A'; MAX_LINE_LENGTH + 1]);
        assert!(matches!(
            decoder.decode(),
            Err(FrameError::LineTooLong { size: 1025, .. })
        ));
        assert_eq!(decoder.buffered(), 0);

        decoder.feed(b"ok\r\n");
        assert_eq!(decoder.decode().unwrap(), Some("ok".to_owned()));
    }

    #[test]
    fn test_parse_responses() {
        assert_eq!(RadioResponse::parse("ok"), RadioResponse::Ok);
        assert_eq!(RadioResponse::parse("busy"), RadioResponse::Busy);
        assert_eq!(RadioResponse::parse("invalid_param"), RadioResponse::InvalidParam);
        assert_eq!(RadioResponse::parse("radio_err"), RadioResponse::RxError);
        assert_eq!(RadioResponse::parse("radio_tx_ok"), RadioResponse::TxOk);
        assert_eq!(
            RadioResponse::parse("radio_rx  48656c6c6f"),
            RadioResponse::Rx(Bytes::from_static(b"hello"))
        );
        assert_eq!(
            RadioResponse::parse("RN2483 1.0.5 Oct 31 2018 15:06:52"),
            RadioResponse::Other("RN2483 1.0.5 Oct 31 2018 15:06:52".to_owned())
        );
        assert_eq!(
            RadioResponse::parse("radio_rx zz"),
            RadioResponse::Other("radio_rx zz".to_owned())
        );
    }
}
