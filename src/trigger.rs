//! Hardware trigger selection
//!
//! Each channel's request line is routed from one peripheral event. The
//! routing is two numbers: the source (`msel`) picks the peripheral, and
//! the signal (`msigsel`) picks the event within that peripheral. The same
//! signal number means different things for different sources. For
//! example, signal 1 is "receive ready" for a UART, but "transmit empty"
//! for a USART.
//!
//! [`Trigger`] pairs a [`Source`] with a [`Signal`] that belongs to it.

use crate::error::ConfigError;

/// Trigger source (`msel`)
///
/// Discriminants are the register encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Source {
    /// No peripheral. Software requests only.
    None = 0x00,
    Gpio = 0x01,
    Crypt = 0x02,
    Acmp = 0x03,
    Dac0 = 0x04,
    Adc0 = 0x06,
    Crc = 0x07,
    Uart0 = 0x08,
    Uart1 = 0x09,
    Uart2 = 0x0A,
    Uart3 = 0x0B,
    Usart0 = 0x0C,
    Usart1 = 0x0D,
    Spi0 = 0x0E,
    Spi1 = 0x0F,
    I2c0 = 0x10,
    I2c1 = 0x11,
    Timer0 = 0x12,
    Timer1 = 0x13,
    Timer2 = 0x14,
    Timer3 = 0x15,
    Rtc = 0x16,
    Lptim0 = 0x17,
    Lpuart0 = 0x18,
    Dma = 0x19,
    Spi2 = 0x1A,
    Timer4 = 0x1B,
    Timer5 = 0x1C,
    Timer6 = 0x1D,
    Timer7 = 0x1E,
    Adc1 = 0x1F,
    Pis = 0x20,
    Trng = 0x21,
}

impl Source {
    /// Returns the `msel` encoding
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Decode an `msel` value
    pub const fn from_raw(raw: u32) -> Option<Self> {
        use Source::*;
        Some(match raw {
            0x00 => None,
            0x01 => Gpio,
            0x02 => Crypt,
            0x03 => Acmp,
            0x04 => Dac0,
            0x06 => Adc0,
            0x07 => Crc,
            0x08 => Uart0,
            0x09 => Uart1,
            0x0A => Uart2,
            0x0B => Uart3,
            0x0C => Usart0,
            0x0D => Usart1,
            0x0E => Spi0,
            0x0F => Spi1,
            0x10 => I2c0,
            0x11 => I2c1,
            0x12 => Timer0,
            0x13 => Timer1,
            0x14 => Timer2,
            0x15 => Timer3,
            0x16 => Rtc,
            0x17 => Lptim0,
            0x18 => Lpuart0,
            0x19 => Dma,
            0x1A => Spi2,
            0x1B => Timer4,
            0x1C => Timer5,
            0x1D => Timer6,
            0x1E => Timer7,
            0x1F => Adc1,
            0x20 => Pis,
            0x21 => Trng,
            _ => return Option::None,
        })
    }
}

/// Trigger signal (`msigsel`)
///
/// The encoding depends on the source. See [`Signal::raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    /// Software requests only
    None,
    /// GPIO external interrupt line, `0..=15`
    Pin(u8),
    CryptWrite,
    CryptRead,
    ComparatorOutput,
    DacChannel0,
    /// ADC normal (regular) conversion complete
    AdcNormal,
    /// ADC inserted (injected) conversion complete
    AdcInsert,
    CrcReady,
    UartTransmitEmpty,
    UartReceive,
    UsartReceive,
    UsartTransmitEmpty,
    SpiReceive,
    SpiTransmitEmpty,
    I2cReceive,
    I2cTransmitEmpty,
    /// Timer capture / compare channel, `1..=4`
    TimerChannel(u8),
    TimerTrigger,
    TimerCommutation,
    TimerUpdate,
    RtcEvent,
    LptimUpdate,
    LpuartReceive,
    LpuartTransmitEmpty,
    /// Completion of another µDMA channel
    DmaDone,
    /// PIS channel, `0..=15`
    PisChannel(u8),
    TrngReady,
}

impl Signal {
    /// Returns the `msigsel` encoding
    pub const fn raw(self) -> u32 {
        use Signal::*;
        match self {
            None | CryptWrite | ComparatorOutput | DacChannel0 | AdcNormal | CrcReady => 0,
            CryptRead | AdcInsert => 1,
            UartTransmitEmpty | UsartReceive | SpiReceive | I2cReceive => 0,
            UartReceive | UsartTransmitEmpty | SpiTransmitEmpty | I2cTransmitEmpty => 1,
            TimerChannel(n) => n.wrapping_sub(1) as u32 & 0xF,
            TimerTrigger => 4,
            TimerCommutation => 5,
            TimerUpdate => 6,
            RtcEvent | LptimUpdate | DmaDone | TrngReady => 0,
            LpuartReceive => 0,
            LpuartTransmitEmpty => 1,
            Pin(n) | PisChannel(n) => n as u32 & 0xF,
        }
    }

    /// Returns `true` if this signal is one of `source`'s events
    pub const fn belongs_to(self, source: Source) -> bool {
        use Signal as S;
        use Source::*;
        match source {
            None => matches!(self, S::None),
            Gpio => matches!(self, S::Pin(n) if n < 16),
            Crypt => matches!(self, S::CryptWrite | S::CryptRead),
            Acmp => matches!(self, S::ComparatorOutput),
            Dac0 => matches!(self, S::DacChannel0),
            Adc0 | Adc1 => matches!(self, S::AdcNormal | S::AdcInsert),
            Crc => matches!(self, S::CrcReady),
            Uart0 | Uart1 | Uart2 | Uart3 => {
                matches!(self, S::UartTransmitEmpty | S::UartReceive)
            }
            Usart0 | Usart1 => matches!(self, S::UsartReceive | S::UsartTransmitEmpty),
            Spi0 | Spi1 | Spi2 => matches!(self, S::SpiReceive | S::SpiTransmitEmpty),
            I2c0 | I2c1 => matches!(self, S::I2cReceive | S::I2cTransmitEmpty),
            Timer0 | Timer1 | Timer2 | Timer3 | Timer4 | Timer5 | Timer6 | Timer7 => matches!(
                self,
                S::TimerChannel(1..=4) | S::TimerTrigger | S::TimerCommutation | S::TimerUpdate
            ),
            Rtc => matches!(self, S::RtcEvent),
            Lptim0 => matches!(self, S::LptimUpdate),
            Lpuart0 => matches!(self, S::LpuartReceive | S::LpuartTransmitEmpty),
            Dma => matches!(self, S::DmaDone),
            Pis => matches!(self, S::PisChannel(n) if n < 16),
            Trng => matches!(self, S::TrngReady),
        }
    }
}

/// A channel's request routing
///
/// ```
/// use es32_dma::trigger::{Signal, Source, Trigger};
///
/// let rx = Trigger::new(Source::Uart1, Signal::UartReceive).unwrap();
/// assert_eq!((rx.source().raw(), rx.signal().raw()), (0x09, 1));
///
/// assert!(Trigger::new(Source::Uart1, Signal::SpiReceive).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trigger {
    source: Source,
    signal: Signal,
}

impl Trigger {
    /// No hardware trigger
    ///
    /// The channel moves data only on software requests.
    pub const SOFTWARE: Trigger = Trigger {
        source: Source::None,
        signal: Signal::None,
    };

    /// Route `source`'s `signal` to the channel
    pub const fn new(source: Source, signal: Signal) -> Result<Self, ConfigError> {
        if signal.belongs_to(source) {
            Ok(Trigger { source, signal })
        } else {
            Err(ConfigError::InvalidTrigger)
        }
    }

    pub const fn source(self) -> Source {
        self.source
    }

    pub const fn signal(self) -> Signal {
        self.signal
    }

    /// Returns `true` if no peripheral drives the channel
    pub const fn is_software(self) -> bool {
        matches!(self.source, Source::None)
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::SOFTWARE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_signals_share_numbers_across_sources() {
        let uart_rx = Trigger::new(Source::Uart0, Signal::UartReceive).unwrap();
        let usart_tx = Trigger::new(Source::Usart0, Signal::UsartTransmitEmpty).unwrap();
        assert_eq!(uart_rx.signal().raw(), usart_tx.signal().raw());
        assert_ne!(uart_rx.source().raw(), usart_tx.source().raw());
    }

    #[test]
    fn signal_must_match_source() {
        assert_eq!(
            Trigger::new(Source::Spi0, Signal::UartReceive),
            Err(ConfigError::InvalidTrigger)
        );
        assert_eq!(
            Trigger::new(Source::Gpio, Signal::Pin(16)),
            Err(ConfigError::InvalidTrigger)
        );
        assert_eq!(
            Trigger::new(Source::Timer2, Signal::TimerChannel(0)),
            Err(ConfigError::InvalidTrigger)
        );
        assert!(Trigger::new(Source::Timer2, Signal::TimerChannel(4)).is_ok());
    }

    #[test]
    fn timer_channels_are_zero_based_on_the_wire() {
        assert_eq!(Signal::TimerChannel(1).raw(), 0);
        assert_eq!(Signal::TimerChannel(4).raw(), 3);
        assert_eq!(Signal::TimerUpdate.raw(), 6);
    }

    #[test]
    fn source_encoding_round_trips() {
        for raw in 0..0x40 {
            if let Some(source) = Source::from_raw(raw) {
                assert_eq!(source.raw(), raw);
            }
        }
        assert_eq!(Source::from_raw(0x05), None);
        assert_eq!(Source::from_raw(0x21), Some(Source::Trng));
    }
}
