//! Channel configuration
//!
//! A [`Config`] describes one transfer and the channel settings that go
//! with it. The driver turns it into a [`Descriptor`] and a handful of
//! channel register writes. The `Config` is yours; it's only read during
//! configuration.

use crate::{
    descriptor::{Arbitration, Control, CycleControl, Descriptor, Half, Increment, Width, MAX_ELEMENTS},
    element::Element,
    error::ConfigError,
    trigger::Trigger,
};

/// Channel arbitration priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Default priority. Lower channel numbers win among default channels.
    #[default]
    Default,
    /// High priority. Served before any default priority channel.
    High,
}

/// A transfer and channel configuration
///
/// Fields are public. Start from one of the constructors, then adjust.
///
/// ```
/// use es32_dma::{Config, Increment, Priority, Width};
///
/// let source = [0u32; 4];
/// let mut config = Config::memory_to_memory(&source, &mut [0u32; 4]);
/// config.priority = Priority::High;
/// assert_eq!(config.width, Width::Word);
/// assert_eq!(config.destination_increment, Increment::Word);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Address of the first source element, or the fixed source register
    pub source: *const (),
    /// Address of the first destination element, or the fixed destination register
    pub destination: *mut (),
    /// Number of elements to move, `1..=1024`
    pub count: usize,
    /// Element width for both sides
    pub width: Width,
    pub source_increment: Increment,
    pub destination_increment: Increment,
    /// Elements between re-arbitration
    pub arbitration: Arbitration,
    /// Only respond to burst requests from the peripheral
    pub burst: bool,
    /// The descriptor half to write, and to select for the channel
    pub half: Half,
    pub priority: Priority,
    /// Signal an interrupt when the channel completes
    pub interrupt: bool,
    /// What drives the channel's requests
    pub trigger: Trigger,
}

impl Config {
    /// A configuration with null addresses and a single byte element
    pub const fn new() -> Self {
        Config {
            source: core::ptr::null(),
            destination: core::ptr::null_mut(),
            count: 1,
            width: Width::Byte,
            source_increment: Increment::Byte,
            destination_increment: Increment::Byte,
            arbitration: Arbitration::After1,
            burst: false,
            half: Half::Primary,
            priority: Priority::Default,
            interrupt: false,
            trigger: Trigger::SOFTWARE,
        }
    }

    /// Copy between two buffers
    ///
    /// Moves the smaller of the two lengths. Both sides increment, and the
    /// channel re-arbitrates only once every 1024 elements.
    pub fn memory_to_memory<E: Element>(source: &[E], destination: &mut [E]) -> Self {
        Config {
            source: source.as_ptr().cast(),
            destination: destination.as_mut_ptr().cast(),
            count: source.len().min(destination.len()),
            width: E::WIDTH,
            source_increment: Increment::element(E::WIDTH),
            destination_increment: Increment::element(E::WIDTH),
            arbitration: Arbitration::After1024,
            ..Config::new()
        }
    }

    /// Receive a buffer from a peripheral register
    ///
    /// Each `trigger` request moves one element.
    pub fn peripheral_to_memory<E: Element>(
        register: *const E,
        destination: &mut [E],
        trigger: Trigger,
    ) -> Self {
        Config {
            source: register.cast(),
            destination: destination.as_mut_ptr().cast(),
            count: destination.len(),
            width: E::WIDTH,
            source_increment: Increment::None,
            destination_increment: Increment::element(E::WIDTH),
            trigger,
            ..Config::new()
        }
    }

    /// Send a buffer to a peripheral register
    ///
    /// Each `trigger` request moves one element.
    pub fn memory_to_peripheral<E: Element>(
        source: &[E],
        register: *const E,
        trigger: Trigger,
    ) -> Self {
        Config {
            source: source.as_ptr().cast(),
            destination: register.cast_mut().cast(),
            count: source.len(),
            width: E::WIDTH,
            source_increment: Increment::element(E::WIDTH),
            destination_increment: Increment::None,
            trigger,
            ..Config::new()
        }
    }

    /// Check the configuration without building anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.end_addresses().map(|_| ())
    }

    /// Compute the source and destination end addresses
    ///
    /// A fixed side keeps its address. An incrementing side points at its
    /// last element: `start + (count - 1) * width`.
    pub fn end_addresses(&self) -> Result<(u32, u32), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::EmptyTransfer);
        }
        if self.count > MAX_ELEMENTS {
            return Err(ConfigError::TooManyElements(self.count));
        }
        let source = end_address(
            self.source as usize,
            self.count,
            self.width,
            self.source_increment,
        )?;
        let destination = end_address(
            self.destination as usize,
            self.count,
            self.width,
            self.destination_increment,
        )?;
        Ok((source, destination))
    }

    /// Build the descriptor for this transfer in `mode`
    ///
    /// `next_useburst` is left clear. The scatter-gather builder is the
    /// only place that sets it.
    pub fn descriptor(&self, mode: CycleControl) -> Result<Descriptor, ConfigError> {
        let (source_end, destination_end) = self.end_addresses()?;
        let control = Control::new()
            .set_cycle_control(mode)
            .set_count(self.count)
            .set_arbitration(self.arbitration)
            .set_source_width(self.width)
            .set_source_increment(self.source_increment)
            .set_destination_width(self.width)
            .set_destination_increment(self.destination_increment);
        Ok(Descriptor {
            source_end,
            destination_end,
            control,
            user: 0,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

/// Convert a pointer to the controller's 32-bit address
pub(crate) fn bus_address(address: usize) -> Result<u32, ConfigError> {
    u32::try_from(address).map_err(|_| ConfigError::AddressOverflow)
}

fn end_address(
    start: usize,
    count: usize,
    width: Width,
    increment: Increment,
) -> Result<u32, ConfigError> {
    if start % width.bytes() != 0 {
        return Err(ConfigError::Misaligned(start));
    }
    let start = bus_address(start)?;
    if increment == Increment::None {
        return Ok(start);
    }
    if increment != Increment::element(width) {
        return Err(ConfigError::IncrementMismatch);
    }
    let span = ((count - 1) << width as usize) as u32;
    start
        .checked_add(span)
        .ok_or(ConfigError::AddressOverflow)
}
