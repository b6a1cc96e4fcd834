//! Feature-gated diagnostic macros.
//!
//! `defmt` is used on embedded targets, `tracing` on hosts, and when neither
//! feature is enabled the macros still evaluate their arguments but emit
//! nothing. Every value passed to these macros must implement both
//! `core::fmt::Display` and `defmt::Format`.

#[cfg(feature = "defmt")]
macro_rules! trace { ($($arg:tt)*) => { defmt::trace!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! debug { ($($arg:tt)*) => { defmt::debug!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! info { ($($arg:tt)*) => { defmt::info!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! warn { ($($arg:tt)*) => { defmt::warn!($($arg)*) }; }
#[cfg(feature = "defmt")]
macro_rules! error { ($($arg:tt)*) => { defmt::error!($($arg)*) }; }

#[cfg(all(not(feature = "defmt"), feature = "tracing"))]
macro_rules! trace { ($($arg:tt)*) => { tracing::trace!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "tracing"))]
macro_rules! debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "tracing"))]
macro_rules! info { ($($arg:tt)*) => { tracing::info!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "tracing"))]
macro_rules! warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) }; }
#[cfg(all(not(feature = "defmt"), feature = "tracing"))]
macro_rules! error { ($($arg:tt)*) => { tracing::error!($($arg)*) }; }

#[cfg(all(not(feature = "defmt"), not(feature = "tracing")))]
macro_rules! trace { ($($arg:tt)*) => { let _ = ($($arg)*,); }; }
#[cfg(all(not(feature = "defmt"), not(feature = "tracing")))]
macro_rules! debug { ($($arg:tt)*) => { let _ = ($($arg)*,); }; }
#[cfg(all(not(feature = "defmt"), not(feature = "tracing")))]
macro_rules! info { ($($arg:tt)*) => { let _ = ($($arg)*,); }; }
#[cfg(all(not(feature = "defmt"), not(feature = "tracing")))]
macro_rules! warn { ($($arg:tt)*) => { let _ = ($($arg)*,); }; }
#[cfg(all(not(feature = "defmt"), not(feature = "tracing")))]
macro_rules! error { ($($arg:tt)*) => { let _ = ($($arg)*,); }; }
