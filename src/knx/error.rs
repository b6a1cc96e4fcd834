//! Error types for KNX addressing and bus access

use core::fmt;

/// An error produced while building or parsing a KNX address.
///
/// Out-of-range components are always rejected; they are never masked down
/// to fit the wire format.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AddressError {
    /// The main group exceeds 31 (group) or the area exceeds 15 (individual).
    MainOutOfRange(u16),
    /// The middle group exceeds 7 (group) or the line exceeds 15 (individual).
    MiddleOutOfRange(u16),
    /// The sub group or device number exceeds 255.
    SubOutOfRange(u16),
    /// The textual form is not `main/middle/sub` or `area.line.device`.
    Malformed,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::MainOutOfRange(v) => write!(f, "main component {} out of range", v),
            AddressError::MiddleOutOfRange(v) => {
                write!(f, "middle component {} out of range", v)
            }
            AddressError::SubOutOfRange(v) => write!(f, "sub component {} out of range", v),
            AddressError::Malformed => f.write_str("malformed address"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AddressError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            AddressError::MainOutOfRange(v) => defmt::write!(f, "MainOutOfRange({})", v),
            AddressError::MiddleOutOfRange(v) => defmt::write!(f, "MiddleOutOfRange({})", v),
            AddressError::SubOutOfRange(v) => defmt::write!(f, "SubOutOfRange({})", v),
            AddressError::Malformed => defmt::write!(f, "Malformed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AddressError {}
