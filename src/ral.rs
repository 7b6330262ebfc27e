//! A RAL-like module to support µDMA register access
//!
//! The vendor headers describe the controller as a flat list of registers,
//! with the per-channel trigger selectors spelled out one by one. This
//! module groups them into a register block with an array of selectors,
//! so that a channel index is all we need to reach a channel's state.
//!
//! Fields follow the RAL layout (`REG::FIELD::{offset, mask}`), so the
//! `ral-registers` macros work on them.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals,
    dead_code,
)]

pub mod dma;

pub use ral_registers::{read_reg, write_reg};
use ral_registers::{RORegister, RWRegister, WORegister};

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

/// Order all prior memory accesses before the next register write.
///
/// Descriptors live in normal memory, but the controller fetches them
/// on its own bus. Call this between writing a descriptor and enabling
/// or requesting the channel.
#[inline(always)]
pub(crate) fn barrier() {
    cfg_if::cfg_if! {
        if #[cfg(all(target_arch = "arm", target_os = "none"))] {
            cortex_m::asm::dsb();
        } else {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}
