//! Ping-pong transfers
//!
//! In a ping-pong cycle, the controller runs the primary descriptor, then
//! the alternate, then the primary again, and so on. While it runs one
//! half, software refills the other. The controller stops when it finds a
//! half that isn't in ping-pong mode.
//!
//! There's no lock between the two. The completion flag is the only
//! signal that the controller finished a half, and software has until the
//! running half completes to refill the finished one. Miss that deadline,
//! and the controller either stops, or re-runs a stale descriptor.
//!
//! [`PingPong`] tracks which half is safe to write, and only moves that
//! knowledge forward when it observes a completion flag.

use crate::{
    channel::Channel,
    config::Config,
    descriptor::{CycleControl, Descriptor, Half},
    Error, Result,
};

/// A channel running ping-pong cycles
///
/// ```no_run
/// use es32_dma::{ping_pong::PingPong, Config, Half};
/// # use es32_dma::{Dma, DescriptorTable};
/// # static DESCRIPTORS: DescriptorTable = DescriptorTable::new();
/// # static DMA: Dma<6> = unsafe { Dma::new(core::ptr::null(), &DESCRIPTORS) };
/// # fn fill(_: Half) -> Config { Config::new() }
///
/// let channel = unsafe { DMA.channel(0) };
/// let mut ping_pong = PingPong::new(channel, &fill(Half::Primary), &fill(Half::Alternate))?;
/// unsafe { ping_pong.start() };
///
/// loop {
///     if let Some(half) = ping_pong.poll_complete() {
///         ping_pong.refill(half, &fill(half))?;
///     }
/// }
/// # Ok::<(), es32_dma::Error>(())
/// ```
pub struct PingPong {
    channel: Channel,
    /// The half the controller is running, or runs next
    running: Half,
}

impl PingPong {
    /// Prepare `channel` for ping-pong cycles
    ///
    /// `first` goes into the primary half, and `second` into the alternate
    /// half. The channel's settings (priority, interrupt, trigger, burst)
    /// come from `first`. The `half` fields are ignored.
    ///
    /// The channel is disabled first. It's not enabled; see [`start`](Self::start).
    pub fn new(mut channel: Channel, first: &Config, second: &Config) -> Result<Self> {
        channel.disable();
        let alternate = second.descriptor(CycleControl::PingPong)?;
        let primary = Config {
            half: Half::Primary,
            ..*first
        };
        // Check the primary before touching the alternate slot.
        primary.validate()?;
        // Safety: channel is disabled.
        unsafe { channel.write_descriptor(Half::Alternate, alternate) };
        channel.configure(CycleControl::PingPong, &primary)?;
        Ok(PingPong {
            channel,
            running: Half::Primary,
        })
    }

    /// Enable the channel
    ///
    /// # Safety
    ///
    /// Caller must ensure that the buffers in both halves are valid for
    /// the lifetime of the transfers.
    pub unsafe fn start(&mut self) {
        self.channel.clear_complete();
        self.channel.enable();
    }

    /// Returns the half the controller is using
    pub fn running(&self) -> Half {
        self.running
    }

    /// Check for a completed half
    ///
    /// If the channel's completion flag is set, `poll_complete` clears it
    /// and returns the half that the controller finished. That half may
    /// now be refilled.
    pub fn poll_complete(&mut self) -> Option<Half> {
        if !self.channel.is_complete() {
            return None;
        }
        self.channel.clear_complete();
        let done = self.running;
        self.running = done.other();
        if self.channel.is_enabled() && self.channel.selected_half() != self.running {
            log::warn!(
                "DMA{} ping-pong out of step, controller on {:?}",
                self.channel.channel(),
                self.channel.selected_half()
            );
        }
        Some(done)
    }

    /// Refill a finished half with the next transfer
    ///
    /// Fails with [`Error::Busy`] if `half` is the one the controller is
    /// running. Only the transfer fields of `config` are used.
    pub fn refill(&mut self, half: Half, config: &Config) -> Result<()> {
        self.write(half, config, CycleControl::PingPong)
    }

    /// Refill a finished half with the final transfer
    ///
    /// The controller stops after it runs this half, and the channel
    /// signals completion one more time.
    pub fn finish(&mut self, half: Half, config: &Config) -> Result<()> {
        self.write(half, config, CycleControl::Basic)
    }

    fn write(&mut self, half: Half, config: &Config, mode: CycleControl) -> Result<()> {
        if half == self.running {
            return Err(Error::Busy);
        }
        let descriptor = config.descriptor(mode)?;
        // Safety: the controller finished this half, and it's
        // running the other one.
        unsafe { self.channel.write_descriptor(half, descriptor) };
        Ok(())
    }

    /// Returns a descriptor, as the controller last wrote it
    pub fn descriptor(&self, half: Half) -> Descriptor {
        self.channel.descriptor(half)
    }

    /// Stop the cycles, and return the channel
    pub fn release(self) -> Channel {
        self.channel.disable();
        self.channel.clear_complete();
        self.channel
    }
}
