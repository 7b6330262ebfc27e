//! Direct Memory Access (DMA) driver for ES32 microcontrollers.
//!
//! ES32 parts carry a µDMA controller in the style of the ARM PL230. The
//! controller doesn't hold transfer state in registers. Instead, each
//! channel owns two 16-byte descriptors in a table in normal memory: a
//! primary and an alternate. The controller fetches a descriptor when the
//! channel is requested, moves data, and writes the descriptor back.
//!
//! `es32-dma` provides
//!
//! - the [`Descriptor`] and [`DescriptorTable`] data model.
//! - [`Config`], which turns a transfer description into a descriptor,
//!   and the channel register programming that goes with it.
//! - an unsafe API for scheduling transfers with DMA [`Channel`](crate::channel::Channel)s.
//! - ping-pong and scatter-gather helpers.
//! - safe DMA futures for memcpy, peripheral-to-memory, and memory-to-peripheral
//!   transfers.
//!
//! This DMA driver may be re-exported from a hardware abstraction layer
//! (HAL). If it is, you should use the safer APIs provided by your HAL.
//!
//! # Getting started
//!
//! To allocate a [`Dma`] driver, you'll need
//!
//! 1. the location of the µDMA registers.
//! 2. a static [`DescriptorTable`].
//! 3. the number of DMA channels supported by your chip.
//!
//! Assign the `Dma` to a static. Reset it once, enable it, then use it to
//! create DMA [`Channel`](crate::channel::Channel)s.
//!
//! ```no_run
//! use es32_dma::{Dma, DescriptorTable};
//! # const DMA_PTR: *const () = core::ptr::null() as _;
//!
//! static DESCRIPTORS: DescriptorTable = DescriptorTable::new();
//! // Safety: address and channel count are valid for this target.
//! static DMA: Dma<6> = unsafe { Dma::new(DMA_PTR, &DESCRIPTORS) };
//!
//! DMA.reset();
//! DMA.enable();
//!
//! // Safety: we only allocate one DMA channel 2 object.
//! let mut channel = unsafe { DMA.channel(2) };
//! ```
//!
//! Once you have a channel, you can use the higher-level DMA APIs, like
//!
//! - [`memcpy`](crate::memcpy::memcpy) for memory copies.
//! - [`write`](crate::peripheral::write) to transmit data from memory to
//!   a peripheral.
//! - [`read`](crate::peripheral::read) to receive data from a peripheral.
//! - [`PingPong`](crate::ping_pong::PingPong) for continuous double-buffered
//!   transfers.
//!
//! For a lower-level API, use [`Channel::configure`](crate::channel::Channel::configure)
//! and the [`scatter_gather`] builders.
//!
//! # Descriptor ownership
//!
//! There's no lock between software and the controller. A descriptor may
//! only be written when its channel is disabled, or when the channel's
//! completion flag shows that the controller finished with that half.
//! The driver refuses to configure an enabled channel, and
//! [`PingPong`](crate::ping_pong::PingPong) only refills the half that just
//! completed. Everything else is on you.
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod channel;
mod config;
pub mod descriptor;
mod element;
mod error;
#[cfg(test)]
mod fake;
mod interrupt;
pub mod memcpy;
pub mod peripheral;
pub mod ping_pong;
mod ral;
pub mod scatter_gather;
pub mod trigger;

pub use config::{Config, Priority};
pub use descriptor::{
    Arbitration, Control, CycleControl, Descriptor, DescriptorTable, Half, Increment, Width,
};
pub use element::Element;
pub use error::{ConfigError, Error};
pub use interrupt::Transfer;

/// A DMA result
pub type Result<T> = core::result::Result<T, Error>;

use core::cell::Cell;
use critical_section::Mutex;
use interrupt::{SharedWaker, NO_WAKER};
use ral::dma::ERR_FLAG;

/// A DMA driver.
///
/// This DMA driver manages the µDMA controller and its descriptor table.
///
/// `Dma` allocates [`Channel`](channel::Channel)s. `Channel` provides
/// the interface for scheduling transfers. The methods on `Dma` act on
/// channel bitmasks: bit `n` is channel `n`. Bits at or above `CHANNELS`
/// are ignored.
pub struct Dma<const CHANNELS: usize> {
    registers: ral::Static<ral::dma::RegisterBlock>,
    table: &'static DescriptorTable,
    wakers: [SharedWaker; CHANNELS],
    /// Completion and error flags taken from the hardware by an interrupt
    /// handler, and not yet observed by their channel.
    latched: Mutex<Cell<u32>>,
}

// Safety: OK to allocate a DMA driver in a static context.
unsafe impl<const CHANNELS: usize> Sync for Dma<CHANNELS> {}

impl<const CHANNELS: usize> Dma<CHANNELS> {
    /// Create the DMA driver.
    ///
    /// Note that this can evaluate at compile time. Consider using this to
    /// expose a `Dma` through your higher-level API that you can use to
    /// allocate DMA channels.
    ///
    /// `CHANNELS` specifies the total number of channels supported by the DMA
    /// controller. It's referenced when allocating channels.
    ///
    /// # Safety
    ///
    /// Caller must make sure that `controller` is a pointer to the start of the
    /// µDMA register block, and that `table` is used by no other driver.
    ///
    /// An incorrect `CHANNELS` value prevents proper bounds checking when
    /// allocating channels.
    ///
    /// # Panics
    ///
    /// Panics if `CHANNELS` exceeds the table's [`SLOTS`](descriptor::SLOTS).
    pub const unsafe fn new(controller: *const (), table: &'static DescriptorTable) -> Self {
        assert!(CHANNELS <= descriptor::SLOTS);
        Self {
            registers: ral::Static(controller.cast()),
            table,
            wakers: [NO_WAKER; CHANNELS],
            latched: Mutex::new(Cell::new(0)),
        }
    }

    const fn all_channels() -> u32 {
        ((1u64 << CHANNELS) - 1) as u32
    }

    /// Put the controller into its power-on state
    ///
    /// Disables the controller and every channel; clears all request masks,
    /// priorities, primary/alternate selections, burst settings, interrupt
    /// enables, and flags; stops every descriptor; then points the
    /// controller at the descriptor table.
    ///
    /// Call this once, before allocating channels. Don't call it while a
    /// transfer is in flight.
    pub fn reset(&self) {
        let all = Self::all_channels();
        ral::write_reg!(ral::dma, self.registers, CFG, MASTER_ENABLE: 0);
        self.registers.CHENCLR.write(all);
        self.registers.CHREQMASKCLR.write(all);
        self.registers.CHPRCLR.write(all);
        self.registers.CHPRIALTCLR.write(all);
        self.registers.CHUSEBURSTCLR.write(all);
        self.registers.IDR.write(all | ERR_FLAG);
        self.registers.ICFR.write(all | ERR_FLAG);
        ral::write_reg!(ral::dma, self.registers, ERRCLR, ERR_CLR: 1);
        for selcon in &self.registers.CH_SELCON[..CHANNELS] {
            selcon.SELCON.write(0);
        }
        critical_section::with(|cs| self.latched.borrow(cs).set(0));

        // Safety: every channel is disabled.
        unsafe { self.table.clear() };
        ral::barrier();
        self.registers
            .CTRLBASE
            .write(self.table.primary_base() as usize as u32);
        self.registers
            .ALTCTRLBASE
            .write(self.table.alternate_base() as usize as u32);
        log::debug!(
            "DMA reset, descriptors at {:#010X}",
            self.table.primary_base() as usize
        );
    }

    /// Enable the controller
    ///
    /// Channels don't move data until the controller is enabled.
    pub fn enable(&self) {
        ral::write_reg!(ral::dma, self.registers, CFG, MASTER_ENABLE: 1);
    }

    /// Disable the controller
    pub fn disable(&self) {
        ral::write_reg!(ral::dma, self.registers, CFG, MASTER_ENABLE: 0);
    }

    /// Returns `true` if the controller is enabled
    pub fn is_enabled(&self) -> bool {
        ral::read_reg!(ral::dma, self.registers, STATUS, MASTER_ENABLE == 1)
    }

    /// Returns the number of channels the silicon implements
    pub fn channel_count(&self) -> usize {
        ral::read_reg!(ral::dma, self.registers, STATUS, CHNLS_MINUS1) as usize + 1
    }

    /// Returns the descriptor table used by this driver
    pub fn descriptors(&self) -> &'static DescriptorTable {
        self.table
    }

    /// Enable every channel in `mask`
    ///
    /// # Safety
    ///
    /// Enabled channels run their descriptors. Caller must ensure that the
    /// addresses in those descriptors are valid for the lifetime of the
    /// transfers.
    pub unsafe fn enable_channels(&self, mask: u32) {
        ral::barrier();
        self.registers.CHENSET.write(mask & Self::all_channels());
    }

    /// Disable every channel in `mask`
    ///
    /// A channel stops at an element boundary.
    pub fn disable_channels(&self, mask: u32) {
        self.registers.CHENCLR.write(mask & Self::all_channels());
    }

    /// Returns the bitmask of enabled channels
    pub fn enabled_channels(&self) -> u32 {
        self.registers.CHENSET.read() & Self::all_channels()
    }

    /// Issue a software request on every channel in `mask`
    ///
    /// # Safety
    ///
    /// See [`enable_channels`](Self::enable_channels).
    pub unsafe fn software_request(&self, mask: u32) {
        ral::barrier();
        self.registers.CHSWREQ.write(mask & Self::all_channels());
    }

    /// Ignore hardware requests on every channel in `mask`
    ///
    /// Software requests still work on a masked channel.
    pub fn mask_requests(&self, mask: u32) {
        self.registers.CHREQMASKSET.write(mask & Self::all_channels());
    }

    /// Accept hardware requests on every channel in `mask`
    pub fn unmask_requests(&self, mask: u32) {
        self.registers.CHREQMASKCLR.write(mask & Self::all_channels());
    }

    /// Returns the bitmask of channels with a completion flag
    ///
    /// Includes flags that an interrupt handler took from the hardware
    /// but no one has cleared yet.
    pub fn completed(&self) -> u32 {
        let latched = critical_section::with(|cs| self.latched.borrow(cs).get());
        (self.registers.IFLAG.read() | latched) & Self::all_channels()
    }

    /// Clear the completion flag of every channel in `mask`
    pub fn clear_completed(&self, mask: u32) {
        let mask = mask & Self::all_channels();
        self.registers.ICFR.write(mask);
        critical_section::with(|cs| {
            let latched = self.latched.borrow(cs);
            latched.set(latched.get() & !mask);
        });
    }

    /// Returns `true` if the controller flagged a bus error
    ///
    /// There's one error flag for the whole controller.
    pub fn is_error(&self) -> bool {
        let latched = critical_section::with(|cs| self.latched.borrow(cs).get());
        (self.registers.IFLAG.read() | latched) & ERR_FLAG != 0
    }

    /// Clear the bus error flag
    pub fn clear_error(&self) {
        self.registers.ICFR.write(ERR_FLAG);
        ral::write_reg!(ral::dma, self.registers, ERRCLR, ERR_CLR: 1);
        critical_section::with(|cs| {
            let latched = self.latched.borrow(cs);
            latched.set(latched.get() & !ERR_FLAG);
        });
    }

    /// Enable or disable the bus error interrupt
    pub fn set_error_interrupt(&self, enable: bool) {
        if enable {
            self.registers.IER.write(ERR_FLAG);
        } else {
            self.registers.IDR.write(ERR_FLAG);
        }
    }

    /// Configure a channel's descriptor and registers
    ///
    /// This is the low-level form of [`Channel::configure`](channel::Channel::configure),
    /// addressed by channel index. See that method for the effects.
    ///
    /// # Safety
    ///
    /// This writes to a channel that may be owned by a [`Channel`](channel::Channel)
    /// object. Caller must make sure that no one else is using `channel`.
    pub unsafe fn configure_base(
        &self,
        channel: usize,
        mode: CycleControl,
        config: &Config,
    ) -> Result<()> {
        if channel >= CHANNELS {
            return Err(Error::InvalidChannel(channel));
        }
        channel::program(self.registers, self.table, channel, mode, config)
    }
}

use core::{future::Future, pin::Pin, task::Poll};

/// Poll a future with a dummy waker.
///
/// Use `poll_no_wake` when you want to drive a future to completion, but you
/// don't care about the future waking an executor. It may be used to initiate
/// a DMA transfer that will later be awaited with [`block`].
///
/// Do not use `poll_no_wake` if you want an executor to be woken when the DMA
/// transfer completes.
pub fn poll_no_wake<F>(future: Pin<&mut F>) -> Poll<F::Output>
where
    F: Future,
{
    use core::task::{Context, RawWaker, RawWakerVTable, Waker};
    const VTABLE: RawWakerVTable = RawWakerVTable::new(|_| RAW_WAKER, |_| {}, |_| {}, |_| {});

    const RAW_WAKER: RawWaker = RawWaker::new(core::ptr::null(), &VTABLE);
    // Safety: raw waker meets documented requirements.
    let waker = unsafe { Waker::from_raw(RAW_WAKER) };
    let mut context = Context::from_waker(&waker);
    future.poll(&mut context)
}

/// Block until the future returns a result.
///
/// `block` invokes [`poll_no_wake`] in a loop until the future
/// returns a result. Consider using `block` after starting a transfer
/// with `poll_no_wake`, and after doing other work.
pub fn block<F>(mut future: Pin<&mut F>) -> F::Output
where
    F: Future,
{
    loop {
        match poll_no_wake(future.as_mut()) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fake::Fake;
    use crate::{Config, CycleControl, Error, Half, Priority};

    #[test]
    fn reset_clears_every_channel_bit() {
        let fake = Fake::new();
        let dma = fake.dma;
        dma.enable();
        unsafe { dma.enable_channels(0b11_1111) };
        fake.settle();
        dma.mask_requests(0b10_1010);
        fake.settle();
        dma.set_error_interrupt(true);
        fake.settle();
        for index in 0..6 {
            let mut channel = unsafe { dma.channel(index) };
            channel.set_priority(Priority::High);
            fake.settle();
            channel.select_half(Half::Alternate);
            fake.settle();
            channel.set_burst(true);
            fake.settle();
            channel.set_interrupt_on_completion(true);
            fake.settle();
        }
        fake.complete(3);
        fake.raise_error();

        dma.reset();
        fake.settle();

        assert!(!dma.is_enabled());
        assert_eq!(dma.enabled_channels(), 0);
        assert_eq!(dma.completed(), 0);
        assert!(!dma.is_error());
        for index in 0..6 {
            let channel = unsafe { dma.channel(index) };
            assert!(!channel.is_enabled());
            assert!(!channel.is_request_masked());
            assert_eq!(channel.priority(), Priority::Default);
            assert_eq!(channel.selected_half(), Half::Primary);
            assert!(!channel.is_burst());
            assert!(!channel.is_interrupt_on_completion());
            assert_eq!(channel.trigger_raw(), (0, 0));
        }
        assert_eq!(fake.interrupt_enables(), 0);
    }

    #[test]
    fn reset_points_at_the_table() {
        let fake = Fake::new();
        fake.dma.reset();
        let primary = fake.table.primary_base() as usize as u32;
        assert_eq!(fake.read(0x08), primary);
        assert_eq!(fake.read(0x0C), primary + 0x100);
    }

    #[test]
    fn master_enable() {
        let fake = Fake::new();
        fake.dma.enable();
        fake.settle();
        assert!(fake.dma.is_enabled());
        fake.dma.disable();
        fake.settle();
        assert!(!fake.dma.is_enabled());
    }

    #[test]
    fn channel_count_from_status() {
        let fake = Fake::new();
        assert_eq!(fake.dma.channel_count(), 6);
    }

    #[test]
    fn masks_ignore_missing_channels() {
        let fake = Fake::new();
        unsafe { fake.dma.enable_channels(u32::MAX) };
        fake.settle();
        assert_eq!(fake.dma.enabled_channels(), 0b11_1111);
        fake.dma.disable_channels(0b00_0110);
        fake.settle();
        assert_eq!(fake.dma.enabled_channels(), 0b11_1001);
    }

    #[test]
    fn software_request_writes_the_mask() {
        let fake = Fake::new();
        unsafe { fake.dma.software_request(0b100) };
        assert_eq!(fake.read(0x14), 0b100);
    }

    #[test]
    fn configure_base_checks_the_index() {
        let fake = Fake::new();
        let config = Config {
            source: 0x2000_0000 as *const (),
            destination: 0x2000_1000 as *mut (),
            count: 4,
            ..Config::new()
        };
        assert_eq!(
            unsafe { fake.dma.configure_base(6, CycleControl::Basic, &config) },
            Err(Error::InvalidChannel(6))
        );
        assert!(unsafe { fake.dma.configure_base(5, CycleControl::Basic, &config) }.is_ok());
    }

    #[test]
    fn error_flag_is_global() {
        let fake = Fake::new();
        fake.raise_error();
        assert!(fake.dma.is_error());
        let channel = unsafe { fake.dma.channel(4) };
        assert!(channel.is_error());
        fake.dma.clear_error();
        fake.settle();
        assert!(!fake.dma.is_error());
        assert!(!channel.is_error());
    }

    #[test]
    fn completion_flags() {
        let fake = Fake::new();
        fake.complete(1);
        fake.complete(4);
        assert_eq!(fake.dma.completed(), 0b1_0010);
        fake.dma.clear_completed(0b10);
        fake.settle();
        assert_eq!(fake.dma.completed(), 0b1_0000);
    }
}
