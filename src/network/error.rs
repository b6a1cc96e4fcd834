//! Error types shared by both transports
//!
//! Every error here is recoverable: the bridge logs it and keeps serving.

use core::fmt;

/// Why the broker refused or dropped a connection attempt.
///
/// The classification is used for diagnostics only; every cause is handled
/// by the same retry policy.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectCause {
    /// The broker did not answer within the client's timeout.
    Timeout,
    /// The network connection broke while connected.
    ConnectionLost,
    /// The network connection to the broker could not be opened.
    ConnectFailed,
    /// The client is cleanly disconnected.
    Disconnected,
    /// The broker does not support the requested protocol version.
    BadProtocol,
    /// The broker rejected the client identifier.
    BadClientId,
    /// The broker is unable to accept connections.
    Unavailable,
    /// The username or password were rejected.
    BadCredentials,
    /// The client is not authorized to connect.
    Unauthorized,
    /// A code outside the known set.
    Unknown(i8),
}

impl ConnectCause {
    /// Maps a client state code to a cause.
    ///
    /// Negative codes come from the client itself, positive codes are CONNACK
    /// return codes from the broker.
    pub fn from_code(code: i8) -> Self {
        match code {
            -4 => ConnectCause::Timeout,
            -3 => ConnectCause::ConnectionLost,
            -2 => ConnectCause::ConnectFailed,
            -1 => ConnectCause::Disconnected,
            1 => ConnectCause::BadProtocol,
            2 => ConnectCause::BadClientId,
            3 => ConnectCause::Unavailable,
            4 => ConnectCause::BadCredentials,
            5 => ConnectCause::Unauthorized,
            other => ConnectCause::Unknown(other),
        }
    }

    /// The client state code this cause was built from.
    pub fn code(self) -> i8 {
        match self {
            ConnectCause::Timeout => -4,
            ConnectCause::ConnectionLost => -3,
            ConnectCause::ConnectFailed => -2,
            ConnectCause::Disconnected => -1,
            ConnectCause::BadProtocol => 1,
            ConnectCause::BadClientId => 2,
            ConnectCause::Unavailable => 3,
            ConnectCause::BadCredentials => 4,
            ConnectCause::Unauthorized => 5,
            ConnectCause::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ConnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectCause::Timeout => "connection timeout",
            ConnectCause::ConnectionLost => "connection lost",
            ConnectCause::ConnectFailed => "connect failed",
            ConnectCause::Disconnected => "disconnected",
            ConnectCause::BadProtocol => "bad protocol",
            ConnectCause::BadClientId => "bad client id",
            ConnectCause::Unavailable => "broker unavailable",
            ConnectCause::BadCredentials => "bad credentials",
            ConnectCause::Unauthorized => "unauthorized",
            ConnectCause::Unknown(_) => "unknown error",
        };
        write!(f, "{} (rc={})", name, self.code())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectCause {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectCause::Timeout => defmt::write!(f, "Timeout"),
            ConnectCause::ConnectionLost => defmt::write!(f, "ConnectionLost"),
            ConnectCause::ConnectFailed => defmt::write!(f, "ConnectFailed"),
            ConnectCause::Disconnected => defmt::write!(f, "Disconnected"),
            ConnectCause::BadProtocol => defmt::write!(f, "BadProtocol"),
            ConnectCause::BadClientId => defmt::write!(f, "BadClientId"),
            ConnectCause::Unavailable => defmt::write!(f, "Unavailable"),
            ConnectCause::BadCredentials => defmt::write!(f, "BadCredentials"),
            ConnectCause::Unauthorized => defmt::write!(f, "Unauthorized"),
            ConnectCause::Unknown(code) => defmt::write!(f, "Unknown({})", code),
        }
    }
}

/// A connection could not be established.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectError {
    /// The network link is not up yet.
    LinkDown,
    /// The broker refused the connection.
    Refused(ConnectCause),
    /// The bus interface was already started.
    AlreadyStarted,
    /// The bus interface failed to initialize.
    InterfaceInit,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::LinkDown => f.write_str("network link is down"),
            ConnectError::Refused(cause) => write!(f, "broker refused connection: {}", cause),
            ConnectError::AlreadyStarted => f.write_str("interface already started"),
            ConnectError::InterfaceInit => f.write_str("interface initialization failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectError::LinkDown => defmt::write!(f, "LinkDown"),
            ConnectError::Refused(cause) => defmt::write!(f, "Refused({})", cause),
            ConnectError::AlreadyStarted => defmt::write!(f, "AlreadyStarted"),
            ConnectError::InterfaceInit => defmt::write!(f, "InterfaceInit"),
        }
    }
}

/// A bus telegram could not be sent.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SendError {
    /// `start` has not been called yet.
    NotStarted,
    /// Only 1-byte payloads are supported; the length is carried along.
    UnsupportedPayloadLength(usize),
    /// The bus driver reported a write failure.
    Bus,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NotStarted => f.write_str("bus interface not started"),
            SendError::UnsupportedPayloadLength(len) => {
                write!(f, "unsupported payload length {}", len)
            }
            SendError::Bus => f.write_str("bus write failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SendError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SendError::NotStarted => defmt::write!(f, "NotStarted"),
            SendError::UnsupportedPayloadLength(len) => {
                defmt::write!(f, "UnsupportedPayloadLength({})", len)
            }
            SendError::Bus => defmt::write!(f, "Bus"),
        }
    }
}

/// A document could not be published.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PublishError {
    /// The transport is not connected; nothing was sent.
    NotConnected,
    /// The document does not fit the payload buffer.
    Serialize,
    /// The broker client rejected the publish.
    Broker,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::NotConnected => f.write_str("not connected to broker"),
            PublishError::Serialize => f.write_str("document serialization failed"),
            PublishError::Broker => f.write_str("broker publish failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PublishError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            PublishError::NotConnected => defmt::write!(f, "NotConnected"),
            PublishError::Serialize => defmt::write!(f, "Serialize"),
            PublishError::Broker => defmt::write!(f, "Broker"),
        }
    }
}

/// A subscription could not be recorded.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubscribeError {
    /// The filter is empty, too long, or misuses a wildcard.
    InvalidFilter,
    /// The dispatch table is full.
    TableFull,
    /// No subscription with that id exists.
    UnknownSubscription,
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::InvalidFilter => f.write_str("invalid topic filter"),
            SubscribeError::TableFull => f.write_str("subscription table full"),
            SubscribeError::UnknownSubscription => f.write_str("unknown subscription"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SubscribeError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SubscribeError::InvalidFilter => defmt::write!(f, "InvalidFilter"),
            SubscribeError::TableFull => defmt::write!(f, "TableFull"),
            SubscribeError::UnknownSubscription => defmt::write!(f, "UnknownSubscription"),
        }
    }
}

/// A handler or listener slot could not be filled.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RegistrationError {
    /// Every slot is taken.
    Full,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::Full => f.write_str("no free handler slot"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RegistrationError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            RegistrationError::Full => defmt::write!(f, "Full"),
        }
    }
}

/// An inbound command document was well-formed JSON but not a valid command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValidationError {
    /// The integer `value` field is absent or not an integer.
    MissingValue,
    /// The value does not fit the target payload.
    ValueOutOfRange(i64),
    /// A bus telegram carried no payload byte.
    EmptyTelegram,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingValue => f.write_str("missing integer 'value' field"),
            ValidationError::ValueOutOfRange(v) => write!(f, "value {} out of range", v),
            ValidationError::EmptyTelegram => f.write_str("telegram has no payload"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ValidationError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ValidationError::MissingValue => defmt::write!(f, "MissingValue"),
            ValidationError::ValueOutOfRange(v) => defmt::write!(f, "ValueOutOfRange({})", v),
            ValidationError::EmptyTelegram => defmt::write!(f, "EmptyTelegram"),
        }
    }
}

/// An inbound payload is not a JSON document.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseError {
    /// The payload is not UTF-8.
    Utf8,
    /// The payload is not a JSON object of the expected shape.
    Json,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Utf8 => f.write_str("payload is not valid UTF-8"),
            ParseError::Json => f.write_str("payload is not a JSON document"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ParseError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ParseError::Utf8 => defmt::write!(f, "Utf8"),
            ParseError::Json => defmt::write!(f, "Json"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConnectCause {}
#[cfg(feature = "std")]
impl std::error::Error for ConnectError {}
#[cfg(feature = "std")]
impl std::error::Error for SendError {}
#[cfg(feature = "std")]
impl std::error::Error for PublishError {}
#[cfg(feature = "std")]
impl std::error::Error for SubscribeError {}
#[cfg(feature = "std")]
impl std::error::Error for RegistrationError {}
#[cfg(feature = "std")]
impl std::error::Error for ValidationError {}
#[cfg(feature = "std")]
impl std::error::Error for ParseError {}
