//! DMA support for hardware peripherals.
//!
//! If a driver is compatible with this API, it implements some or all of
//! the traits in this module. Consult your HAL for more information.
//!
//! Each future documents when it resolves. To wake the executor, you can
//! route the DMA interrupt handler to [`on_interrupt()`](crate::Dma::on_interrupt).
//! Otherwise, you can poll the future in a loop.

use crate::{
    channel::Channel, trigger::Trigger, Config, CycleControl, Element, Error, Result, Transfer,
};

use core::{
    future::Future,
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
};

/// A peripheral that can be the source of DMA data
///
/// By 'source,' we mean that it provides data for a DMA transfer.
/// A source would be a hardware device writing data into memory,
/// like a UART receiver.
///
/// # Safety
///
/// `Source` should only be implemented on peripherals that are
/// DMA capable. This trait should be implemented by HAL authors
/// who are exposing DMA capable peripherals.
pub unsafe trait Source<E: Element> {
    /// The trigger that requests a read from this peripheral
    ///
    /// A receive source usually pairs the peripheral's `msel` with a
    /// signal like [`UartReceive`](crate::trigger::Signal::UartReceive).
    fn source_trigger(&self) -> Trigger;
    /// Returns a pointer to the register from which the DMA channel
    /// reads data
    ///
    /// This is the register that software reads to acquire data from
    /// a device. The type of the pointer describes the type of reads
    /// the DMA channel performs when transferring data.
    ///
    /// This memory is assumed to be static. Repeated `source` calls
    /// should always return the same address.
    fn source_address(&self) -> *const E;
    /// Perform any actions necessary to enable DMA transfers
    ///
    /// Callers use this method to put the peripheral in a state where
    /// it can supply the DMA channel with data.
    fn enable_source(&mut self);
    /// Perform any actions necessary to disable or cancel DMA transfers
    ///
    /// This may include undoing the actions in `enable_source`.
    fn disable_source(&mut self);
}

/// A peripheral that can be the destination for DMA data
///
/// By 'destination,' we mean that it receives data from a DMA transfer.
/// A destination would be a peripheral that could send data out of
/// processor memory, like a UART transmitter.
///
/// # Safety
///
/// `Destination` should only be implemented on peripherals that are
/// DMA capable. This trait should be implemented by HAL authors
/// who are exposing DMA capable peripherals.
pub unsafe trait Destination<E: Element> {
    /// The trigger that requests a write to this peripheral
    fn destination_trigger(&self) -> Trigger;
    /// Returns a pointer to the register into which the DMA channel
    /// writes data
    ///
    /// This is the register that software writes to when sending data to a
    /// device. The type of the pointer describes the type of writes the
    /// DMA channel performs when transferring data.
    fn destination_address(&self) -> *const E;
    /// Perform any actions necessary to enable DMA transfers
    ///
    /// Callers use this method to put the peripheral into a state where
    /// it can accept transfers from a DMA channel.
    fn enable_destination(&mut self);
    /// Perform any actions necessary to disable or cancel DMA transfers
    ///
    /// This may include undoing the actions in `enable_destination`.
    fn disable_destination(&mut self);
}

/// A DMA transfer that receives data from hardware
///
/// The future resolves when the peripheral has provided all
/// expected data. Use [`read()`](crate::peripheral::read) to construct
/// this future.
pub struct Read<'a, S, E>
where
    S: Source<E>,
    E: Element,
{
    source: &'a mut S,
    transfer: Transfer<'a>,
    _elem: PhantomData<&'a mut E>,
}

impl<S, E> Future for Read<'_, S, E>
where
    S: Source<E>,
    E: Element,
{
    type Output = core::result::Result<(), Error>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: no movement from transfer future...
        unsafe { self.map_unchecked_mut(|this| &mut this.transfer) }.poll(cx)
    }
}

impl<S, E> Drop for Read<'_, S, E>
where
    S: Source<E>,
    E: Element,
{
    fn drop(&mut self) {
        self.source.disable_source();
        // Drop `transfer` to finish cancellation...
    }
}

/// Program a basic cycle for `config`
///
/// The channel keeps its own priority and interrupt setting.
fn prepare(channel: &mut Channel, config: Config) -> Result<()> {
    channel.disable();
    let config = Config {
        priority: channel.priority(),
        interrupt: channel.is_interrupt_on_completion(),
        ..config
    };
    channel.configure(CycleControl::Basic, &config)
}

impl<'a, S, E> Read<'a, S, E>
where
    S: Source<E>,
    E: Element,
{
    /// # Safety
    ///
    /// The buffer that `config` describes must stay valid for `'a`.
    unsafe fn new(channel: &'a mut Channel, source: &'a mut S, config: Config) -> Result<Self> {
        prepare(channel, config)?;
        source.enable_source();
        Ok(Read {
            transfer: Transfer::new(channel),
            source,
            _elem: PhantomData,
        })
    }
}

/// Use a DMA channel to receive a `buffer` of elements from the source peripheral.
///
/// The channel runs a basic cycle. Each request from the peripheral moves
/// one element. The channel keeps its priority and completion interrupt
/// setting.
///
/// Consider using a DMA interrupt handler that calls [`on_interrupt()`](crate::Dma::on_interrupt)
/// to wake the executor when the transfer completes. Otherwise, poll the future.
///
/// # Example
///
/// Receive 32 bytes from a UART peripheral. Wake the executor when the transfer completes.
///
/// ```no_run
/// use es32_dma::{peripheral, channel::Channel, trigger::Trigger};
/// # static DESCRIPTORS: es32_dma::DescriptorTable = es32_dma::DescriptorTable::new();
/// # static DMA: es32_dma::Dma<6> = unsafe { es32_dma::Dma::new(core::ptr::null(), &DESCRIPTORS) };
/// # struct X;
/// # unsafe impl peripheral::Source<u8> for X {
/// #   fn source_trigger(&self) -> Trigger { Trigger::SOFTWARE }
/// #   fn source_address(&self) -> *const u8 { panic!() }
/// #   fn enable_source(&mut self) { panic!() }
/// #   fn disable_source(&mut self) { panic!() }
/// # }
///
/// // #[cortex_m_rt::interrupt]
/// fn DMA_IRQHandler() {
///     // Safety: DMA channel 2 valid and used by a future.
///     unsafe { DMA.on_interrupt(2) };
/// }
///
/// # async fn f() -> es32_dma::Result<()> {
/// let mut uart = // A UART peripheral
///     # X;
/// let mut channel_2: Channel = // DMA channel 2
///     # unsafe { DMA.channel(2) };
/// channel_2.set_interrupt_on_completion(true);
/// // TODO unmask interrupts in NVIC!
///
/// let mut buffer = [0u8; 32];
///
/// peripheral::read(
///     &mut channel_2,
///     &mut uart,
///     &mut buffer,
/// )?.await?;
/// # Ok(()) }
/// ```
///
/// # Errors
///
/// Fails if `buffer` is empty, or longer than 1024 elements. The peripheral
/// isn't enabled on failure.
pub fn read<'a, S, E>(
    channel: &'a mut Channel,
    source: &'a mut S,
    buffer: &'a mut [E],
) -> Result<Read<'a, S, E>>
where
    S: Source<E>,
    E: Element,
{
    let config =
        Config::peripheral_to_memory(source.source_address(), buffer, source.source_trigger());
    // Safety: the future borrows the buffer.
    unsafe { Read::new(channel, source, config) }
}

/// A DMA transfer that sends data to hardware
///
/// The future resolves when the DMA channel has moved all provided data.
/// Use [`write()`](crate::peripheral::write) to construct this future.
pub struct Write<'a, D, E>
where
    D: Destination<E>,
    E: Element,
{
    destination: &'a mut D,
    transfer: Transfer<'a>,
    _elem: PhantomData<&'a E>,
}

impl<D, E> Future for Write<'_, D, E>
where
    D: Destination<E>,
    E: Element,
{
    type Output = core::result::Result<(), Error>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: no movement from transfer future...
        unsafe { self.map_unchecked_mut(|this| &mut this.transfer) }.poll(cx)
    }
}

impl<D, E> Drop for Write<'_, D, E>
where
    D: Destination<E>,
    E: Element,
{
    fn drop(&mut self) {
        self.destination.disable_destination();
        // Drop `transfer` to finish cancellation...
    }
}

impl<'a, D, E> Write<'a, D, E>
where
    D: Destination<E>,
    E: Element,
{
    /// # Safety
    ///
    /// The buffer that `config` describes must stay valid for `'a`.
    unsafe fn new(
        channel: &'a mut Channel,
        destination: &'a mut D,
        config: Config,
    ) -> Result<Self> {
        prepare(channel, config)?;
        destination.enable_destination();
        Ok(Write {
            destination,
            transfer: Transfer::new(channel),
            _elem: PhantomData,
        })
    }
}

/// Use a DMA channel to send a `buffer` of data to the destination peripheral.
///
/// The channel runs a basic cycle. Each request from the peripheral moves
/// one element.
///
/// Consider using a DMA interrupt handler that calls [`on_interrupt()`](crate::Dma::on_interrupt)
/// to wake the executor when the transfer completes. Otherwise, poll the future.
///
/// # Example
///
/// Send five bytes to a UART device. Wake the executor when the transfer completes.
///
/// ```no_run
/// use es32_dma::{peripheral, channel::Channel, trigger::Trigger};
/// # static DESCRIPTORS: es32_dma::DescriptorTable = es32_dma::DescriptorTable::new();
/// # static DMA: es32_dma::Dma<6> = unsafe { es32_dma::Dma::new(core::ptr::null(), &DESCRIPTORS) };
/// # struct X;
/// # unsafe impl peripheral::Destination<u8> for X {
/// #   fn destination_trigger(&self) -> Trigger { Trigger::SOFTWARE }
/// #   fn destination_address(&self) -> *const u8 { panic!() }
/// #   fn enable_destination(&mut self) { panic!() }
/// #   fn disable_destination(&mut self) { panic!() }
/// # }
///
/// // #[cortex_m_rt::interrupt]
/// fn DMA_IRQHandler() {
///     // Safety: DMA channel 2 valid and used by a future.
///     unsafe { DMA.on_interrupt(2) };
/// }
///
/// # async fn f() -> es32_dma::Result<()> {
/// let mut uart = // A UART peripheral
///     # X;
/// let mut channel_2: Channel = // DMA channel 2
///     # unsafe { DMA.channel(2) };
///
/// channel_2.set_interrupt_on_completion(true);
/// // TODO unmask interrupts in NVIC!
///
/// let buffer = [4u8, 5, 6, 7, 8];
///
/// peripheral::write(
///     &mut channel_2,
///     &buffer,
///     &mut uart,
/// )?.await?;
/// # Ok(()) }
/// ```
///
/// # Errors
///
/// See [`read`].
pub fn write<'a, D, E>(
    channel: &'a mut Channel,
    buffer: &'a [E],
    destination: &'a mut D,
) -> Result<Write<'a, D, E>>
where
    D: Destination<E>,
    E: Element,
{
    let config = Config::memory_to_peripheral(
        buffer,
        destination.destination_address(),
        destination.destination_trigger(),
    );
    // Safety: the future borrows the buffer.
    unsafe { Write::new(channel, destination, config) }
}
