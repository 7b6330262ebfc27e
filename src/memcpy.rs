//! DMA-powered memcpy

use crate::{channel::Channel, interrupt::Transfer, Config, CycleControl, Element, Error, Result};

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// A memcpy operation
///
/// The future yields when the copy is complete.
pub struct Memcpy<'a> {
    transfer: Transfer<'a>,
    channel: &'a Channel,
    requested: bool,
}

/// Perform a DMA-powered `memcpy` between the `source` and `destination` buffers
///
/// Copies the minimum number of elements between the two buffers, at most
/// 1024. The channel runs an auto cycle, so one software request moves
/// every element.
///
/// The channel keeps its priority and completion interrupt setting. You're
/// responsible for calling [`on_interrupt`](crate::Dma::on_interrupt) if the
/// interrupt fires.
///
/// # Errors
///
/// Fails if either buffer is empty, or if the copy is too long for one
/// descriptor.
pub fn memcpy<'a, E: Element>(
    source: &'a [E],
    destination: &'a mut [E],
    channel: &'a mut Channel,
) -> Result<Memcpy<'a>> {
    let config = Config::memory_to_memory(source, destination);
    // Safety: the future borrows both buffers.
    unsafe { Memcpy::new(channel, &config) }
}

impl<'a> Memcpy<'a> {
    /// # Safety
    ///
    /// The memory that `config` describes must stay valid for `'a`.
    unsafe fn new(channel: &'a mut Channel, config: &Config) -> Result<Self> {
        channel.disable();
        let config = Config {
            priority: channel.priority(),
            interrupt: channel.is_interrupt_on_completion(),
            ..*config
        };
        channel.configure(CycleControl::Auto, &config)?;

        let channel: &'a Channel = channel;
        Ok(Memcpy {
            // Safety: transfer is properly prepared
            transfer: Transfer::new(channel),
            channel,
            requested: false,
        })
    }
}

impl Future for Memcpy<'_> {
    type Output = core::result::Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: data not moved
        let transfer = unsafe { self.as_mut().map_unchecked_mut(|this| &mut this.transfer) };
        let poll = transfer.poll(cx);
        if poll.is_pending() && !self.requested {
            // Safety: memory properly prepared, and the channel is enabled.
            unsafe { self.channel.software_request() };
            // Safety: OK to toggle a bool...
            unsafe { self.as_mut().get_unchecked_mut().requested = true };
        }
        poll
    }
}

// Drop handled by Transfer impl
