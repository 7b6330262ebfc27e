//! DMA errors

use core::fmt::{self, Debug, Display};

/// Why a configuration was refused
///
/// These are detected before the driver writes any descriptor or
/// register.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The transfer moves zero elements
    EmptyTransfer,
    /// The transfer moves more than 1024 elements
    TooManyElements(usize),
    /// An address isn't aligned to the element width
    Misaligned(usize),
    /// An incrementing side doesn't step by exactly one element
    IncrementMismatch,
    /// An address, or the last element of a side, is beyond the 32-bit
    /// address space
    AddressOverflow,
    /// The trigger signal doesn't belong to the trigger source
    InvalidTrigger,
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyTransfer => f.write_str("EmptyTransfer"),
            ConfigError::TooManyElements(count) => write!(f, "TooManyElements({count})"),
            ConfigError::Misaligned(address) => write!(f, "Misaligned({address:#010X})"),
            ConfigError::IncrementMismatch => f.write_str("IncrementMismatch"),
            ConfigError::AddressOverflow => f.write_str("AddressOverflow"),
            ConfigError::InvalidTrigger => f.write_str("InvalidTrigger"),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyTransfer => f.write_str("transfer moves no elements"),
            ConfigError::TooManyElements(count) => {
                write!(f, "transfer of {count} elements exceeds 1024")
            }
            ConfigError::Misaligned(address) => {
                write!(f, "address {address:#010X} is not aligned to the element width")
            }
            ConfigError::IncrementMismatch => {
                f.write_str("address increment must be none, or one element")
            }
            ConfigError::AddressOverflow => {
                f.write_str("transfer address is beyond the 32-bit address space")
            }
            ConfigError::InvalidTrigger => {
                f.write_str("trigger signal does not belong to trigger source")
            }
        }
    }
}

/// A DMA error
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The configuration can't be expressed by a descriptor
    InvalidConfig(ConfigError),
    /// The channel index is beyond the controller's channels
    InvalidChannel(usize),
    /// The channel, or the descriptor half, is in use by the controller
    Busy,
    /// The controller flagged a bus error
    ///
    /// The error flag is global. It may have been raised by a channel
    /// other than the one reporting it.
    Transfer,
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::InvalidConfig(err)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(err) => write!(f, "DMA_CONFIG({err:?})"),
            Error::InvalidChannel(channel) => write!(f, "DMA_CHANNEL({channel})"),
            Error::Busy => f.write_str("DMA_BUSY"),
            Error::Transfer => f.write_str("DMA_ERR"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(err) => write!(f, "invalid DMA configuration: {err}"),
            Error::InvalidChannel(channel) => write!(f, "DMA channel {channel} does not exist"),
            Error::Busy => f.write_str("DMA channel is busy"),
            Error::Transfer => f.write_str("DMA bus error"),
        }
    }
}
