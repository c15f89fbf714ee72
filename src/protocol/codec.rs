//! Datagram codec: raw bytes to [`Request`], [`Response`] to raw bytes
//!
//! Decoding is pure. It never touches the robot and never allocates on the
//! success path.
//!
//! # Grammar
//!
//! ```text
//! REQUEST := "$K3DRV" "," "REQ" "," TYPE
//! TYPE    := "INIT"
//!          | "DATA"
//!          | "CTRL" "," INT "," INT        ; right_speed, left_speed
//! ```
//!
//! Tokenisation matches the legacy driver: empty tokens produced by repeated
//! commas are skipped, tokens after the last expected one are ignored. The
//! payload ends at the first NUL byte, and trailing `\r`/`\n` are stripped
//! before tokenising.
//!
//! Wheel speeds are parsed `atoi`-style. A token that is not a clean integer
//! yields its leading digits (or 0) instead of an error; a warning is logged
//! whenever that fallback kicks in.

use std::fmt;

/// Fixed first token of every message
const PREAMBLE: &[u8] = b"$K3DRV";

/// Second token of every request
const REQUEST_TAG: &[u8] = b"REQ";

/// Token separator
const DELIMITER: u8 = b',';

/// Number of infrared proximity sensors reported in a data snapshot
pub const IR_CHANNELS: usize = 11;

/// Number of encoder values reported in a data snapshot (right, left)
pub const ENCODER_CHANNELS: usize = 2;

/// Longest datagram a session reads; anything beyond is truncated
pub const MAX_DATAGRAM_SIZE: usize = 255;

/// A decoded client request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Zero both wheel position counters
    Init,
    /// Set wheel speeds, robot-native velocity units
    Ctrl { right_speed: i32, left_speed: i32 },
    /// Read the IR array and odometry deltas
    Data,
}

impl Request {
    /// Protocol keyword of this request
    pub fn keyword(&self) -> &'static str {
        match self {
            Request::Init => "INIT",
            Request::Ctrl { .. } => "CTRL",
            Request::Data => "DATA",
        }
    }
}

/// A reply to a successfully dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    InitAck,
    CtrlAck,
    DataSnapshot {
        ir: [i32; IR_CHANNELS],
        encoder_right: i32,
        encoder_left: i32,
    },
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::InitAck => f.write_str("$K3DRV,RES,INIT"),
            // Field order differs from the other acks; clients depend on it.
            Response::CtrlAck => f.write_str("$K3DRV,CTRL,RES"),
            Response::DataSnapshot {
                ir,
                encoder_right,
                encoder_left,
            } => {
                write!(f, "$K3DRV,RES,DATA,IR,{}", IR_CHANNELS)?;
                for value in ir {
                    write!(f, ",{}", value)?;
                }
                write!(
                    f,
                    ",ENC,{},{},{}",
                    ENCODER_CHANNELS, encoder_right, encoder_left
                )
            }
        }
    }
}

/// Why a datagram did not produce a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// First token is not `$K3DRV` or second is not `REQ`
    #[error("expected $K3DRV,REQ preamble")]
    BadPreamble,

    /// Nothing after the preamble
    #[error("expected request type token")]
    MissingType,

    /// CTRL without both wheel speeds
    #[error("CTRL expected {0} token")]
    MissingArgument(&'static str),

    /// Type token is not INIT, CTRL or DATA, or is not served on this channel
    #[error("unknown request type {0:?}")]
    UnknownRequestType(String),
}

/// Decode one datagram into a request
pub fn decode(datagram: &[u8]) -> Result<Request, ParseError> {
    let payload = strip_terminators(datagram);
    let mut tokens = payload
        .split(|&b| b == DELIMITER)
        .filter(|token| !token.is_empty());

    if tokens.next() != Some(PREAMBLE) || tokens.next() != Some(REQUEST_TAG) {
        return Err(ParseError::BadPreamble);
    }

    let kind = tokens.next().ok_or(ParseError::MissingType)?;
    match kind {
        b"INIT" => Ok(Request::Init),
        b"DATA" => Ok(Request::Data),
        b"CTRL" => {
            let right = tokens
                .next()
                .ok_or(ParseError::MissingArgument("right_speed"))?;
            let left = tokens
                .next()
                .ok_or(ParseError::MissingArgument("left_speed"))?;
            Ok(Request::Ctrl {
                right_speed: parse_speed(right, "right_speed"),
                left_speed: parse_speed(left, "left_speed"),
            })
        }
        other => Err(ParseError::UnknownRequestType(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// Encode a response into reply bytes
pub fn encode(response: &Response) -> Vec<u8> {
    response.to_string().into_bytes()
}

/// Payload up to the first NUL, without trailing line terminators
fn strip_terminators(datagram: &[u8]) -> &[u8] {
    let text = match datagram.iter().position(|&b| b == 0) {
        Some(nul) => &datagram[..nul],
        None => datagram,
    };
    let end = text
        .iter()
        .rposition(|&b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |i| i + 1);
    &text[..end]
}

/// Lenient integer parse with a warning on fallback
fn parse_speed(token: &[u8], field: &str) -> i32 {
    let (value, exact) = atoi(token);
    if !exact {
        log::warn!(
            "CTRL {} token {:?} is not a clean integer, using {}",
            field,
            String::from_utf8_lossy(token),
            value
        );
    }
    value
}

/// `atoi` semantics: leading whitespace, optional sign, leading digits.
///
/// Saturates at the `i32` bounds. The flag is true when the whole token was
/// a well-formed integer.
fn atoi(token: &[u8]) -> (i32, bool) {
    let start = token
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(token.len());
    let mut rest = &token[start..];

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let magnitude = rest[..digits].iter().fold(0i64, |acc, &d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    let signed = if negative { -magnitude } else { magnitude };
    let value = signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;

    let exact = start == 0 && digits > 0 && digits == rest.len() && signed == i64::from(value);
    (value, exact)
}
