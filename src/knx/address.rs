//! KNX address codec.
//!
//! Group addresses use the 3-level `main/middle/sub` notation and pack into
//! 16 bits as `main(5) | middle(3) | sub(8)`. Individual (physical) addresses
//! use `area.line.device` and pack as `area(4) | line(4) | device(8)`.
//!
//! ```rust
//! use knxbridge::knx::address::{pack, unpack, GroupAddress};
//!
//! let raw = pack(1, 0, 7).unwrap();
//! assert_eq!(raw, 0x0807);
//! assert_eq!(unpack(raw), (1, 0, 7));
//!
//! let ga: GroupAddress = "5/3/128".parse().unwrap();
//! assert_eq!(ga.raw(), 0x2B80);
//! ```

use super::error::AddressError;
use core::fmt::{self, Write as _};
use core::str::FromStr;
use heapless::String;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};

/// Largest valid main group.
pub const MAX_MAIN: u16 = 31;
/// Largest valid middle group.
pub const MAX_MIDDLE: u16 = 7;
/// Largest valid sub group.
pub const MAX_SUB: u16 = 255;

/// Capacity of a formatted segment; fits any three `u8` components.
pub const SEGMENT_LEN: usize = 11;

/// Packs a 3-level group address into its 16-bit wire form.
pub fn pack(main: u16, middle: u16, sub: u16) -> Result<u16, AddressError> {
    if main > MAX_MAIN {
        return Err(AddressError::MainOutOfRange(main));
    }
    if middle > MAX_MIDDLE {
        return Err(AddressError::MiddleOutOfRange(middle));
    }
    if sub > MAX_SUB {
        return Err(AddressError::SubOutOfRange(sub));
    }
    Ok((main << 11) | (middle << 8) | sub)
}

/// Splits a 16-bit wire value into `(main, middle, sub)`.
///
/// Every 16-bit value is a valid group address, so this never fails.
pub fn unpack(value: u16) -> (u8, u8, u8) {
    (
        ((value >> 11) & 0x1F) as u8,
        ((value >> 8) & 0x07) as u8,
        (value & 0xFF) as u8,
    )
}

/// Formats a group address as the `main/middle/sub` topic segment.
pub fn to_topic_segment(main: u8, middle: u8, sub: u8) -> String<SEGMENT_LEN> {
    let mut segment = String::new();
    let _ = write!(segment, "{}/{}/{}", main, middle, sub);
    segment
}

/// A KNX group address.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct GroupAddress(u16);

impl GroupAddress {
    /// Builds a group address from its three components.
    pub fn new(main: u16, middle: u16, sub: u16) -> Result<Self, AddressError> {
        pack(main, middle, sub).map(Self)
    }

    /// Wraps a raw 16-bit wire value.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The packed wire value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Main group (0-31).
    pub fn main(self) -> u8 {
        unpack(self.0).0
    }

    /// Middle group (0-7).
    pub fn middle(self) -> u8 {
        unpack(self.0).1
    }

    /// Sub group (0-255).
    pub fn sub(self) -> u8 {
        unpack(self.0).2
    }

    /// The `main/middle/sub` form used in MQTT documents.
    pub fn to_topic_segment(self) -> String<SEGMENT_LEN> {
        let (main, middle, sub) = unpack(self.0);
        to_topic_segment(main, middle, sub)
    }
}

impl From<u16> for GroupAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<GroupAddress> for u16 {
    fn from(address: GroupAddress) -> Self {
        address.0
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (main, middle, sub) = unpack(self.0);
        write!(f, "{}/{}/{}", main, middle, sub)
    }
}

impl FromStr for GroupAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [main, middle, sub] = split_three(s, '/')?;
        Self::new(main, middle, sub)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for GroupAddress {
    fn format(&self, f: defmt::Formatter) {
        let (main, middle, sub) = unpack(self.0);
        defmt::write!(f, "{}/{}/{}", main, middle, sub)
    }
}

impl Serialize for GroupAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_topic_segment())
    }
}

impl<'de> Deserialize<'de> for GroupAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AddressVisitor::<GroupAddress>::new(
            "a group address like 1/0/7",
        ))
    }
}

/// A KNX individual (physical) address identifying one device on the bus.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct IndividualAddress(u16);

impl IndividualAddress {
    /// Builds an individual address from area (0-15), line (0-15) and device (0-255).
    pub fn new(area: u16, line: u16, device: u16) -> Result<Self, AddressError> {
        if area > 15 {
            return Err(AddressError::MainOutOfRange(area));
        }
        if line > 15 {
            return Err(AddressError::MiddleOutOfRange(line));
        }
        if device > 255 {
            return Err(AddressError::SubOutOfRange(device));
        }
        Ok(Self((area << 12) | (line << 8) | device))
    }

    /// Wraps a raw 16-bit wire value.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// The packed wire value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Area (0-15).
    pub fn area(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Line (0-15).
    pub fn line(self) -> u8 {
        ((self.0 >> 8) & 0x0F) as u8
    }

    /// Device (0-255).
    pub fn device(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl FromStr for IndividualAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [area, line, device] = split_three(s, '.')?;
        Self::new(area, line, device)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for IndividualAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl<'de> Deserialize<'de> for IndividualAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AddressVisitor::<IndividualAddress>::new(
            "an individual address like 1.1.160",
        ))
    }
}

/// Splits `a<sep>b<sep>c` into three numbers, wide enough to report overflow.
fn split_three(s: &str, separator: char) -> Result<[u16; 3], AddressError> {
    let mut parts = s.split(separator);
    let mut out = [0u16; 3];
    for slot in out.iter_mut() {
        let part = parts.next().ok_or(AddressError::Malformed)?;
        *slot = part.parse().map_err(|_| AddressError::Malformed)?;
    }
    if parts.next().is_some() {
        return Err(AddressError::Malformed);
    }
    Ok(out)
}

struct AddressVisitor<T> {
    expecting: &'static str,
    marker: core::marker::PhantomData<T>,
}

impl<T> AddressVisitor<T> {
    fn new(expecting: &'static str) -> Self {
        Self {
            expecting,
            marker: core::marker::PhantomData,
        }
    }
}

impl<T> Visitor<'_> for AddressVisitor<T>
where
    T: FromStr<Err = AddressError>,
{
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expecting)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        v.parse()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}
