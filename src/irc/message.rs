/// IRC message parsing and serialization.
///
/// Implements the RFC 1459 message format:
///   [`:`prefix SPACE] command [SPACE params] [SPACE `:` trailing]
///
/// Parsing operates on a single line without the terminator; the trailing
/// parameter is folded into the last element of `params`.
use std::fmt;

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Optional prefix (server name or `nick!user@host`).
    pub prefix: Option<String>,
    /// The command (e.g. `PRIVMSG`, `PONG`, `001`).
    pub command: String,
    /// Parameters; the last may have been a trailing param (with spaces).
    pub params: Vec<String>,
}

/// Errors that can occur during message parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("prefix present but missing command")]
    MissingCommand,
}

impl Message {
    /// Parse a single IRC message from a line (without the trailing terminator).
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim_end_matches(['\r', '\n']);

        if input.is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = match input.strip_prefix(':') {
            Some(after) => {
                let (prefix, rest) = after.split_once(' ').ok_or(ParseError::MissingCommand)?;
                (Some(prefix.to_owned()), rest)
            }
            None => (None, input),
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, rest)) => (command, rest),
            None => (rest, ""),
        };

        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        let mut params = Vec::new();
        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                // Trailing parameter: everything after the colon, spaces included.
                params.push(trailing.to_owned());
                break;
            }
            match rest.split_once(' ') {
                Some((param, remainder)) => {
                    params.push(param.to_owned());
                    rest = remainder;
                }
                None => {
                    params.push(rest.to_owned());
                    break;
                }
            }
        }

        Ok(Message {
            prefix,
            command: command.to_owned(),
            params,
        })
    }

    /// Serialize to the IRC wire format (without the trailing terminator).
    pub fn to_wire(&self) -> String {
        let mut out = String::new();

        if let Some(ref prefix) = self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }

        out.push_str(&self.command);

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                out.push(' ');
                out.push_str(param);
            }
            // The last param always gets a `:` so params containing spaces
            // or empty strings survive a reparse.
            out.push(' ');
            out.push(':');
            out.push_str(last);
        }

        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Parsing ──────────────────────────────────────────────────

    #[test]
    fn parse_simple_command() {
        let msg = Message::parse("QUIT").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, "QUIT");
        assert_eq!(msg.params, Vec::<String>::new());
    }

    #[test]
    fn parse_command_with_one_param() {
        let msg = Message::parse("NICK secure").unwrap();
        assert_eq!(msg.command, "NICK");
        assert_eq!(msg.params, vec!["secure"]);
    }

    #[test]
    fn parse_command_with_trailing() {
        let msg = Message::parse("PRIVMSG #chaos-hq :lunch at noon?").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chaos-hq", "lunch at noon?"]);
    }

    #[test]
    fn parse_with_prefix() {
        let msg = Message::parse(":secure!michael@robust PRIVMSG #chaos-hq :hey").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("secure!michael@robust"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chaos-hq", "hey"]);
    }

    #[test]
    fn parse_ping_with_token() {
        let msg = Message::parse("PING :robustirc.bridge").unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["robustirc.bridge"]);
    }

    #[test]
    fn parse_quit_with_reason() {
        let msg = Message::parse("QUIT :gone fishing").unwrap();
        assert_eq!(msg.command, "QUIT");
        assert_eq!(msg.params, vec!["gone fishing"]);
    }

    #[test]
    fn parse_strips_line_terminator() {
        let msg = Message::parse("PONG :token\r\n").unwrap();
        assert_eq!(msg.command, "PONG");
        assert_eq!(msg.params, vec!["token"]);
    }

    #[test]
    fn parse_multiple_middle_params() {
        let msg = Message::parse("MODE #chaos-hq +o secure").unwrap();
        assert_eq!(msg.command, "MODE");
        assert_eq!(msg.params, vec!["#chaos-hq", "+o", "secure"]);
    }

    #[test]
    fn parse_trailing_empty_string() {
        let msg = Message::parse("TOPIC #chaos-hq :").unwrap();
        assert_eq!(msg.params, vec!["#chaos-hq", ""]);
    }

    #[test]
    fn parse_trailing_starts_with_colon() {
        let msg = Message::parse("PRIVMSG #chaos-hq ::)").unwrap();
        assert_eq!(msg.params, vec!["#chaos-hq", ":)"]);
    }

    // ── Parse errors ─────────────────────────────────────────────

    #[test]
    fn parse_empty_input() {
        assert_eq!(Message::parse(""), Err(ParseError::Empty));
    }

    #[test]
    fn parse_prefix_only() {
        assert_eq!(
            Message::parse(":prefix-without-command"),
            Err(ParseError::MissingCommand)
        );
    }

    // ── Serialization ────────────────────────────────────────────

    #[test]
    fn serialize_simple() {
        let msg = Message {
            prefix: None,
            command: "QUIT".into(),
            params: vec![],
        };
        assert_eq!(msg.to_wire(), "QUIT");
    }

    #[test]
    fn serialize_with_prefix_and_trailing() {
        let msg = Message {
            prefix: Some("secure!michael@robust".into()),
            command: "PRIVMSG".into(),
            params: vec!["#chaos-hq".into(), "hello there".into()],
        };
        assert_eq!(
            msg.to_wire(),
            ":secure!michael@robust PRIVMSG #chaos-hq :hello there"
        );
    }

    #[test]
    fn serialize_synthesized_pong() {
        let msg = Message {
            prefix: Some("secure!michael@robust".into()),
            command: "PONG".into(),
            params: vec!["12345".into()],
        };
        assert_eq!(msg.to_wire(), ":secure!michael@robust PONG :12345");
    }

    #[test]
    fn serialize_empty_trailing() {
        let msg = Message {
            prefix: None,
            command: "TOPIC".into(),
            params: vec!["#chaos-hq".into(), "".into()],
        };
        assert_eq!(msg.to_wire(), "TOPIC #chaos-hq :");
    }

    // ── Round-trips ──────────────────────────────────────────────

    #[test]
    fn roundtrip_with_prefix_and_trailing() {
        let input = ":secure!michael@robust PRIVMSG #chaos-hq :lunch at noon?";
        let msg = Message::parse(input).unwrap();
        assert_eq!(msg.to_wire(), input);
    }

    #[test]
    fn roundtrip_error_line() {
        let input = "ERROR :Could not create RobustIRC session: connection refused";
        let msg = Message::parse(input).unwrap();
        assert_eq!(msg.to_wire(), input);
    }

    #[test]
    fn roundtrip_semantic_for_middle_params() {
        // The serializer always uses `:` on the last param; both forms are
        // valid IRC, so round-trip equality is structural, not byte-for-byte.
        let msg = Message::parse("MODE #chaos-hq +o secure").unwrap();
        assert_eq!(msg.to_wire(), "MODE #chaos-hq +o :secure");
        let reparsed = Message::parse(&msg.to_wire()).unwrap();
        assert_eq!(msg, reparsed);
    }

    #[test]
    fn roundtrip_numeric() {
        let input = ":robustirc.net 001 secure :Welcome to RobustIRC";
        let msg = Message::parse(input).unwrap();
        assert_eq!(msg.to_wire(), input);
    }
}
