//! DMA interrupt support

use crate::{channel::Channel, ral, Dma, Error};
use core::{
    cell::RefCell,
    future::Future,
    marker::PhantomPinned,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use critical_section::Mutex;

pub(crate) type SharedWaker = Mutex<RefCell<Option<Waker>>>;
#[allow(clippy::declare_interior_mutable_const)]
pub(crate) const NO_WAKER: SharedWaker = Mutex::new(RefCell::new(None));

impl<const CHANNELS: usize> Dma<CHANNELS> {
    /// Handle a DMA channel's completion interrupt
    ///
    /// Checks the completion flag for the channel identified by `channel`.
    /// If the channel completed its transfer, `on_interrupt` takes the
    /// flag from the hardware, so that the interrupt stops pending, and
    /// wakes the channel's waker. The channel still reads as complete
    /// until someone calls [`clear_complete`](Channel::clear_complete).
    ///
    /// Consider calling `on_interrupt` in the DMA interrupt handler:
    ///
    /// ```no_run
    /// use es32_dma::{Dma, DescriptorTable};
    /// # static DESCRIPTORS: DescriptorTable = DescriptorTable::new();
    /// # static DMA: Dma<6> = unsafe { Dma::new(core::ptr::null(), &DESCRIPTORS) };
    ///
    /// // #[cortex_m_rt::interrupt]
    /// fn DMA_IRQHandler() {
    ///     // Safety: channels 0 and 1 are valid, and they're
    ///     // used by futures.
    ///     unsafe {
    ///         DMA.on_interrupt(0);
    ///         DMA.on_interrupt(1);
    ///     }
    /// }
    /// ```
    ///
    /// # Safety
    ///
    /// This acts on a channel that may be owned by a [`Channel`] object.
    /// Caller must make sure that `on_interrupt` runs in the DMA interrupt
    /// handler, where it can't be preempted by that channel's owner.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is greater than or equal to `CHANNELS`.
    pub unsafe fn on_interrupt(&'static self, channel: usize) {
        let channel = self.channel(channel);
        if channel.latch_complete() {
            wake(channel.waker);
        }
    }

    /// Handle a DMA bus error
    ///
    /// The error flag is shared by all channels. `on_error` takes the
    /// flag from the hardware, then wakes every channel's waker. Each
    /// [`Transfer`] that polls afterwards sees the error, until one of
    /// them clears it.
    ///
    /// # Safety
    ///
    /// See [`on_interrupt`](Self::on_interrupt).
    pub unsafe fn on_error(&'static self) {
        if self.registers.IFLAG.read() & ral::dma::ERR_FLAG != 0 {
            critical_section::with(|cs| {
                let latched = self.latched.borrow(cs);
                latched.set(latched.get() | ral::dma::ERR_FLAG);
            });
            self.registers.ICFR.write(ral::dma::ERR_FLAG);
            log::warn!("DMA bus error");
        }
        if self.is_error() {
            self.wakers.iter().for_each(wake);
        }
    }

    /// Handle every pending DMA interrupt
    ///
    /// Calls [`on_interrupt`](Self::on_interrupt) for each channel with an
    /// enabled, pending completion interrupt, and [`on_error`](Self::on_error)
    /// when the error interrupt is pending.
    ///
    /// # Safety
    ///
    /// See [`on_interrupt`](Self::on_interrupt).
    pub unsafe fn on_interrupts(&'static self) {
        let pending = self.registers.IFLAG.read() & self.registers.IVS.read();
        (0..CHANNELS)
            .filter(|channel| pending & (1 << channel) != 0)
            .for_each(|channel| self.on_interrupt(channel));
        if pending & ral::dma::ERR_FLAG != 0 {
            self.on_error();
        }
    }
}

fn wake(waker: &SharedWaker) {
    let waker = critical_section::with(|cs| waker.borrow(cs).borrow_mut().take());
    if let Some(waker) = waker {
        waker.wake();
    }
}

/// The root DMA transfer future
///
/// `Transfer` enables the channel the first time it's polled. It resolves
/// when the channel completes, or when the controller flags an error.
/// It's woken by a call to `on_interrupt` once the transfer is complete.
///
/// Dropping the `Transfer` disables the channel.
pub struct Transfer<'a> {
    channel: &'a Channel,
    _pinned: PhantomPinned,
}

impl<'a> Transfer<'a> {
    /// # Safety
    ///
    /// Assumes that the transfer is correctly defined in the DMA channel memory.
    /// The transfer enables after the first call to `poll()`.
    pub unsafe fn new(channel: &'a Channel) -> Self {
        Transfer {
            channel,
            _pinned: PhantomPinned,
        }
    }
}

impl Future for Transfer<'_> {
    type Output = Result<(), Error>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        critical_section::with(|cs| {
            let waker = self.channel.waker.borrow(cs);
            let mut waker = waker.borrow_mut();
            *waker = Some(cx.waker().clone());
        });

        loop {
            if self.channel.is_error() {
                self.channel.clear_error();
                return Poll::Ready(Err(Error::Transfer));
            } else if self.channel.is_complete() {
                self.channel.clear_complete();
                return Poll::Ready(Ok(()));
            } else if self.channel.is_enabled() {
                return Poll::Pending;
            } else {
                // Safety: transfer is correctly defined, per `new`.
                unsafe { self.channel.enable() };
            }
        }
    }
}

impl Drop for Transfer<'_> {
    fn drop(&mut self) {
        self.channel.disable();
        self.channel.clear_complete();
        critical_section::with(|cs| {
            let waker = self.channel.waker.borrow(cs);
            let mut waker = waker.borrow_mut();
            *waker = None;
        });
    }
}
