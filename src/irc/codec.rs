/// IRC line codec — frames the client's TCP byte stream into IRC messages.
///
/// Splits on `\n` (tolerating an optional preceding `\r`, so both CRLF and
/// bare-LF clients work), parses each line into a [`Message`], and keeps the
/// raw bytes of every decoded line so they can be forwarded to the cluster
/// unmodified. All writes are LF-terminated.
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{Message, ParseError};

/// Maximum line length (including the terminator).
/// RFC 1459 says 512 bytes; IRCv3 `message-tags` can push this to 8191.
const MAX_LINE_LENGTH: usize = 8191;

/// Codec error: either a protocol parse failure or an I/O error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("line exceeds maximum length ({MAX_LINE_LENGTH} bytes)")]
    LineTooLong,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One decoded inbound line: the parsed message plus the exact bytes the
/// client sent, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The line exactly as received (terminator included).
    pub raw: String,
    /// The parsed message.
    pub message: Message,
}

/// A pre-formatted line written verbatim followed by a single LF.
/// Used for cluster payloads, which must not be reserialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(pub String);

/// A tokio codec that frames IRC messages on line boundaries.
#[derive(Debug, Default)]
pub struct IrcCodec;

impl Decoder for IrcCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                // No complete line yet. Check if the buffer is getting too large.
                if src.len() > MAX_LINE_LENGTH {
                    return Err(CodecError::LineTooLong);
                }
                return Ok(None);
            };

            let line = src.split_to(pos + 1);
            let raw = std::str::from_utf8(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
                .to_owned();

            let content = raw.trim_end_matches(['\r', '\n']);
            if content.is_empty() {
                // Blank lines between messages are tolerated, not errors.
                continue;
            }

            let message = Message::parse(content)?;
            return Ok(Some(Frame { raw, message }));
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let wire = item.to_wire();
        dst.reserve(wire.len() + 1);
        dst.put_slice(wire.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Encoder<RawLine> for IrcCodec {
    type Error = CodecError;

    fn encode(&mut self, item: RawLine, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.0.len() + 1);
        dst.put_slice(item.0.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    // ── Decoder ──────────────────────────────────────────────────

    #[test]
    fn decode_complete_line() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from("NICK secure\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.message.command, "NICK");
        assert_eq!(frame.message.params, vec!["secure"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_retains_raw_bytes() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from("PRIVMSG #chaos-hq :hi\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.raw, "PRIVMSG #chaos-hq :hi\r\n");
    }

    #[test]
    fn decode_bare_lf_line() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from("PING :token\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.message.command, "PING");
        assert_eq!(frame.raw, "PING :token\n");
    }

    #[test]
    fn decode_partial_line_then_complete() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from("NICK sec");

        // Not enough data yet.
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // More data arrives.
        buf.extend_from_slice(b"ure\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.message.command, "NICK");
        assert_eq!(frame.message.params, vec!["secure"]);
    }

    #[test]
    fn decode_two_messages_in_one_read() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from("NICK secure\r\nUSER secure 0 * :Michael\r\n");

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.message.command, "NICK");

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.message.command, "USER");
        assert_eq!(second.message.params, vec!["secure", "0", "*", "Michael"]);

        assert!(buf.is_empty());
    }

    #[test]
    fn decode_skips_blank_lines() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from("\r\nQUIT :bye\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.message.command, "QUIT");
    }

    #[test]
    fn decode_rejects_oversized_line() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::from(vec![b'A'; MAX_LINE_LENGTH + 1].as_slice());
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::LineTooLong));
    }

    #[test]
    fn decode_empty_buffer() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    // ── Encoders ─────────────────────────────────────────────────

    #[test]
    fn encode_message_appends_lf() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::new();
        let msg = Message {
            prefix: Some("secure!michael@robust".into()),
            command: "PONG".into(),
            params: vec!["token".into()],
        };
        codec.encode(msg, &mut buf).unwrap();
        assert_eq!(&buf[..], b":secure!michael@robust PONG :token\n");
    }

    #[test]
    fn encode_raw_line_is_verbatim_plus_lf() {
        let mut codec = IrcCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(RawLine(":robustirc.net 001 secure :Welcome".into()), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b":robustirc.net 001 secure :Welcome\n");
    }

    // ── Roundtrip through codec ──────────────────────────────────

    #[test]
    fn roundtrip_through_codec() {
        let mut codec = IrcCodec;

        let original = Message {
            prefix: Some("secure!michael@robust".into()),
            command: "PRIVMSG".into(),
            params: vec!["#chaos-hq".into(), "lunch at noon?".into()],
        };
        let mut buf = BytesMut::new();
        codec.encode(original.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.message, original);
    }
}
