use thiserror::Error;

/// A single item of the input stream.
///
/// `event_type` is the symbol matched against the pattern's alphabet;
/// `value` feeds the sum/product semirings; `timestamp` drives the sliding
/// window and must be non-decreasing across a stream (see the selector's
/// concurrency notes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Event {
    pub event_type: char,
    pub value: i64,
    pub timestamp: u64,
}

impl Event {
    pub fn new(event_type: char, value: i64, timestamp: u64) -> Self {
        Event {
            event_type,
            value,
            timestamp,
        }
    }
}

/// Failure tokenizing the textual `type value timestamp` wire form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("truncated event triple: expected `type value timestamp`")]
    Truncated,
    #[error("invalid event type {0:?}: must be exactly one character")]
    InvalidType(String),
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
}

/// Parses a whitespace-separated stream of `type value timestamp` triples.
///
/// `value` may be omitted by callers who only need the count semiring, but
/// the wire grammar itself always expects the triple; an incomplete triple
/// at the end of input is a [`EventParseError::Truncated`].
pub fn parse_events(input: &str) -> Result<Vec<Event>, EventParseError> {
    let mut tokens = input.split_whitespace();
    let mut events = Vec::new();

    loop {
        let Some(ty) = tokens.next() else {
            break;
        };
        let value = tokens.next().ok_or(EventParseError::Truncated)?;
        let timestamp = tokens.next().ok_or(EventParseError::Truncated)?;

        let mut chars = ty.chars();
        let event_type = chars
            .next()
            .filter(|_| chars.next().is_none())
            .ok_or_else(|| EventParseError::InvalidType(ty.to_string()))?;

        let value: i64 = value
            .parse()
            .map_err(|_| EventParseError::InvalidInteger(value.to_string()))?;
        let timestamp: u64 = timestamp
            .parse()
            .map_err(|_| EventParseError::InvalidInteger(timestamp.to_string()))?;

        events.push(Event::new(event_type, value, timestamp));
    }

    Ok(events)
}
