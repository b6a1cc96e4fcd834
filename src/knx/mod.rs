//! KNX bus transport.
//!
//! The electrical layer and the TP-UART framing belong to a [`BusDriver`]
//! supplied by the host. [`KnxTransport`] wraps it with the parts the bridge
//! relies on: one-shot initialization, payload-length checks and a set of
//! telegram handlers that are fed from the poll loop.
//!
//! ```rust
//! use knxbridge::knx::{BusDriver, KnxTransport, Telegram};
//! use knxbridge::knx::address::{GroupAddress, IndividualAddress};
//!
//! struct Loopback {
//!     pending: Option<(GroupAddress, [u8; 1])>,
//!     last: [u8; 1],
//! }
//!
//! impl BusDriver for Loopback {
//!     type Error = ();
//!     fn start(&mut self, _address: IndividualAddress) -> Result<(), ()> { Ok(()) }
//!     fn write_group(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), ()> {
//!         self.pending = Some((address, [payload[0]]));
//!         Ok(())
//!     }
//!     fn receive(&mut self) -> Option<Telegram<'_>> {
//!         let (destination, payload) = self.pending.take()?;
//!         self.last = payload;
//!         Some(Telegram { destination, payload: &self.last })
//!     }
//! }
//!
//! fn count(seen: &mut u32, _telegram: &Telegram<'_>) {
//!     *seen += 1;
//! }
//!
//! let mut knx: KnxTransport<_, fn(&mut u32, &Telegram<'_>), 2> =
//!     KnxTransport::new(Loopback { pending: None, last: [0] });
//! knx.on_telegram_received(count).unwrap();
//! knx.start(IndividualAddress::new(1, 1, 160).unwrap()).unwrap();
//! knx.send_telegram("0/0/1".parse().unwrap(), &[1]).unwrap();
//!
//! let mut seen = 0;
//! knx.tick(&mut seen);
//! assert_eq!(seen, 1);
//! ```

use crate::network::error::{ConnectError, RegistrationError, SendError};
use address::{GroupAddress, IndividualAddress};
use heapless::Vec;

/// Group and individual address codec.
pub mod address;

/// Error types for KNX addressing
pub mod error;


/// Payload lengths [`KnxTransport::send_telegram`] accepts.
pub const SUPPORTED_PAYLOAD_LENGTHS: &[usize] = &[1];

/// Upper bound on telegrams drained by a single tick.
pub const MAX_TELEGRAMS_PER_TICK: usize = 16;

/// A group telegram received from the bus.
///
/// The payload is borrowed from the driver and only valid during dispatch.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Telegram<'a> {
    /// Destination group address.
    pub destination: GroupAddress,
    /// Application payload, 0-255 bytes.
    pub payload: &'a [u8],
}

/// The bus interface a [`KnxTransport`] drives.
pub trait BusDriver {
    /// Driver error type
    type Error: core::fmt::Debug;

    /// Sets the physical address and starts the interface.
    fn start(&mut self, address: IndividualAddress) -> Result<(), Self::Error>;

    /// Writes a group value telegram.
    fn write_group(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), Self::Error>;

    /// Returns the next received group telegram, if one is pending.
    fn receive(&mut self) -> Option<Telegram<'_>>;
}

/// Receives bus telegrams.
///
/// `ctx` is supplied by whoever drives [`KnxTransport::tick`].
pub trait TelegramHandler<C: ?Sized> {
    /// Handles one telegram.
    fn on_telegram(&mut self, ctx: &mut C, telegram: &Telegram<'_>);
}

impl<C: ?Sized, F> TelegramHandler<C> for F
where
    F: FnMut(&mut C, &Telegram<'_>),
{
    fn on_telegram(&mut self, ctx: &mut C, telegram: &Telegram<'_>) {
        self(ctx, telegram)
    }
}

/// Token returned by [`KnxTransport::on_telegram_received`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HandlerId(u16);

/// A KNX transport holding up to `N` telegram handlers.
#[derive(Debug)]
pub struct KnxTransport<D: BusDriver, H, const N: usize = 4> {
    driver: D,
    started: bool,
    handlers: Vec<(HandlerId, H), N>,
    next_id: u16,
}

impl<D: BusDriver, H, const N: usize> KnxTransport<D, H, N> {
    /// Wraps a driver. Nothing touches the bus until [`start`](Self::start).
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            started: false,
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// Initializes the bus interface with `address`. Only the first call
    /// does anything.
    pub fn start(&mut self, address: IndividualAddress) -> Result<(), ConnectError> {
        if self.started {
            warn!("KNX interface already started");
            return Err(ConnectError::AlreadyStarted);
        }
        self.driver.start(address).map_err(|_| {
            error!("KNX interface failed to start");
            ConnectError::InterfaceInit
        })?;
        self.started = true;
        info!("KNX interface started as {}", address);
        Ok(())
    }

    /// Writes `payload` to `address`.
    ///
    /// Lengths outside [`SUPPORTED_PAYLOAD_LENGTHS`] are rejected before the
    /// driver is touched.
    pub fn send_telegram(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        if !SUPPORTED_PAYLOAD_LENGTHS.contains(&payload.len()) {
            warn!("Refusing {}-byte telegram to {}", payload.len(), address);
            return Err(SendError::UnsupportedPayloadLength(payload.len()));
        }
        self.driver.write_group(address, payload).map_err(|_| {
            warn!("Bus write to {} failed", address);
            SendError::Bus
        })?;
        debug!("Sent telegram to {}", address);
        Ok(())
    }

    /// Adds a handler. Every handler sees every telegram, in registration order.
    ///
    /// Registration is additive: a new handler does not replace an earlier
    /// one. To swap a handler, pass the old token to
    /// [`remove_handler`](Self::remove_handler) before registering the new one.
    pub fn on_telegram_received(&mut self, handler: H) -> Result<HandlerId, RegistrationError> {
        let id = HandlerId(self.next_id);
        self.handlers
            .push((id, handler))
            .map_err(|_| RegistrationError::Full)?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    /// Removes a handler. Returns whether it was registered.
    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        match self.handlers.iter().position(|(hid, _)| *hid == id) {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether the interface has been started.
    pub fn is_connected(&self) -> bool {
        self.started
    }

    /// Hands pending telegrams to the handlers. Returns how many were dispatched.
    pub fn tick<C: ?Sized>(&mut self, ctx: &mut C) -> usize
    where
        H: TelegramHandler<C>,
    {
        if !self.started {
            return 0;
        }
        let mut dispatched = 0;
        while dispatched < MAX_TELEGRAMS_PER_TICK {
            let Some(telegram) = self.driver.receive() else {
                break;
            };
            trace!(
                "Telegram to {} with {} bytes",
                telegram.destination,
                telegram.payload.len()
            );
            for (_, handler) in self.handlers.iter_mut() {
                handler.on_telegram(ctx, &telegram);
            }
            dispatched += 1;
        }
        dispatched
    }

    /// Get the underlying bus driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the underlying bus driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
