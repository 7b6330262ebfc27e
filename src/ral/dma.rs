//! µDMA register block and fields
//!
//! The first 0x50 bytes follow the PL230 programmer's model. The interrupt
//! registers and the per-channel trigger selectors are ES32 additions that
//! live in the same peripheral window.

use super::{RORegister, RWRegister, WORegister};

/// µDMA registers.
#[repr(C)]
pub struct RegisterBlock {
    /// Controller status
    pub STATUS: RORegister<u32>,
    /// Controller configuration
    pub CFG: WORegister<u32>,
    /// Primary descriptor table base pointer
    pub CTRLBASE: RWRegister<u32>,
    /// Alternate descriptor table base pointer
    pub ALTCTRLBASE: RWRegister<u32>,
    /// Channel wait-on-request status
    pub WAITONREQ: RORegister<u32>,
    /// Channel software request
    pub CHSWREQ: WORegister<u32>,
    /// Channel useburst set (reads back the useburst status)
    pub CHUSEBURSTSET: RWRegister<u32>,
    /// Channel useburst clear
    pub CHUSEBURSTCLR: WORegister<u32>,
    /// Channel request mask set (reads back the mask status)
    pub CHREQMASKSET: RWRegister<u32>,
    /// Channel request mask clear
    pub CHREQMASKCLR: WORegister<u32>,
    /// Channel enable set (reads back the enable status)
    pub CHENSET: RWRegister<u32>,
    /// Channel enable clear
    pub CHENCLR: WORegister<u32>,
    /// Channel primary-alternate set (reads back the selection)
    pub CHPRIALTSET: RWRegister<u32>,
    /// Channel primary-alternate clear
    pub CHPRIALTCLR: WORegister<u32>,
    /// Channel priority set (reads back the priority status)
    pub CHPRSET: RWRegister<u32>,
    /// Channel priority clear
    pub CHPRCLR: WORegister<u32>,
    _reserved0: [u32; 3],
    /// Bus error clear (reads back the bus error status)
    pub ERRCLR: RWRegister<u32>,
    _reserved1: [u8; 0x1000 - 0x50],
    /// Interrupt enable
    pub IER: WORegister<u32>,
    /// Interrupt disable
    pub IDR: WORegister<u32>,
    /// Interrupt valid status
    pub IVS: RORegister<u32>,
    /// Raw interrupt flags
    pub IFLAG: RORegister<u32>,
    /// Interrupt flag clear
    pub ICFR: WORegister<u32>,
    _reserved2: [u8; 0x1100 - 0x1014],
    /// Channel trigger selectors
    pub CH_SELCON: [selcon::RegisterBlock; 32],
}

const _: () = assert!(core::mem::offset_of!(RegisterBlock, ERRCLR) == 0x4C);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, IER) == 0x1000);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, ICFR) == 0x1010);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, CH_SELCON) == 0x1100);

/// Flag bit shared by the interrupt registers for the global error.
pub const ERR_FLAG: u32 = 1 << 31;

pub mod STATUS {
    /// The controller is enabled
    pub mod MASTER_ENABLE {
        pub const offset: u32 = 0;
        pub const mask: u32 = 0x1 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
    /// State machine
    pub mod STATE {
        pub const offset: u32 = 4;
        pub const mask: u32 = 0xF << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
    /// Number of implemented channels, minus one
    pub mod CHNLS_MINUS1 {
        pub const offset: u32 = 16;
        pub const mask: u32 = 0x1F << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

pub mod CFG {
    /// Enable the controller
    pub mod MASTER_ENABLE {
        pub const offset: u32 = 0;
        pub const mask: u32 = 0x1 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
    /// HPROT for descriptor fetches
    pub mod CHNL_PROT_CTRL {
        pub const offset: u32 = 5;
        pub const mask: u32 = 0x7 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

pub mod CTRLBASE {
    /// Only the bits above the table size are writable
    pub mod CTRL_BASE_PTR {
        pub const offset: u32 = 9;
        pub const mask: u32 = 0x7F_FFFF << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

pub mod ALTCTRLBASE {
    pub mod ALT_CTRL_BASE_PTR {
        pub const offset: u32 = 8;
        pub const mask: u32 = 0xFF_FFFF << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

pub mod ERRCLR {
    pub mod ERR_CLR {
        pub const offset: u32 = 0;
        pub const mask: u32 = 0x1 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

/// Channel trigger selector.
pub mod selcon {
    use super::RWRegister;

    #[repr(C)]
    pub struct RegisterBlock {
        /// Trigger source and signal for one channel
        pub SELCON: RWRegister<u32>,
    }

    pub mod SELCON {
        /// Trigger source (`msel`)
        pub mod MSEL {
            pub const offset: u32 = 0;
            pub const mask: u32 = 0x3F << offset;
            pub mod R {}
            pub mod W {}
            pub mod RW {}
        }
        /// Trigger signal (`msigsel`)
        pub mod MSIGSEL {
            pub const offset: u32 = 8;
            pub const mask: u32 = 0xF << offset;
            pub mod R {}
            pub mod W {}
            pub mod RW {}
        }
    }
}
