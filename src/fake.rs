//! A RAM-backed stand-in for the µDMA controller
//!
//! Register writes land in plain memory. [`Fake::settle`] then does what
//! the silicon does with them: set / clear pairs fold into the state the
//! set register reads back, write-one-to-clear registers clear their flags,
//! and the configuration register shows up in the status register. Call
//! it after each driver call that writes registers.
//!
//! A set register reads back as state, so a pending set can't be told
//! from a settled one. Pending clears win. Settle between a clear and a
//! later set of the same bit.

use crate::{ral::dma::RegisterBlock, Dma, DescriptorTable};

use std::{boxed::Box, cell::Cell, vec};

const STATUS: usize = 0x000;
const CFG: usize = 0x004;
const ERRCLR: usize = 0x04C;
const IER: usize = 0x1000;
const IDR: usize = 0x1004;
const IVS: usize = 0x1008;
const IFLAG: usize = 0x100C;
const ICFR: usize = 0x1010;

/// (set, clear) offsets
const PAIRS: [(usize, usize); 5] = [
    (0x018, 0x01C), // CHUSEBURST
    (0x020, 0x024), // CHREQMASK
    (0x028, 0x02C), // CHEN
    (0x030, 0x034), // CHPRIALT
    (0x038, 0x03C), // CHPR
];

pub(crate) struct Fake {
    base: *mut u32,
    pub dma: &'static Dma<6>,
    pub table: &'static DescriptorTable,
    state: [Cell<u32>; 5],
}

impl Fake {
    pub fn new() -> Self {
        let words = core::mem::size_of::<RegisterBlock>() / 4;
        let memory: &'static mut [u32] = Box::leak(vec![0u32; words].into_boxed_slice());
        let base = memory.as_mut_ptr();
        let table: &'static DescriptorTable = Box::leak(Box::new(DescriptorTable::new()));
        // Safety: memory is as large as the register block, and lives forever.
        let dma: &'static Dma<6> = Box::leak(Box::new(unsafe { Dma::new(base as *const (), table) }));
        let fake = Fake {
            base,
            dma,
            table,
            state: Default::default(),
        };
        fake.write(STATUS, 5 << 16);
        fake
    }

    pub fn read(&self, offset: usize) -> u32 {
        // Safety: offset is within the leaked register memory.
        unsafe { core::ptr::read_volatile(self.base.add(offset / 4)) }
    }

    pub fn write(&self, offset: usize, value: u32) {
        // Safety: see read.
        unsafe { core::ptr::write_volatile(self.base.add(offset / 4), value) }
    }

    /// Apply pending register writes, like the hardware would.
    pub fn settle(&self) {
        for ((set, clear), state) in PAIRS.iter().zip(&self.state) {
            let value = (state.get() | self.read(*set)) & !self.read(*clear);
            state.set(value);
            self.write(*set, value);
            self.write(*clear, 0);
        }

        let ivs = (self.read(IVS) | self.read(IER)) & !self.read(IDR);
        self.write(IVS, ivs);
        self.write(IER, 0);
        self.write(IDR, 0);

        let iflag = self.read(IFLAG) & !self.read(ICFR);
        self.write(IFLAG, iflag);
        self.write(ICFR, 0);

        self.write(ERRCLR, 0);

        let status = (self.read(STATUS) & !1) | (self.read(CFG) & 1);
        self.write(STATUS, status);
    }

    /// The controller finished a basic cycle on `channel`.
    pub fn complete(&self, channel: usize) {
        self.settle();
        let bit = 1 << channel;
        let (enable, _) = PAIRS[2];
        let state = &self.state[2];
        state.set(state.get() & !bit);
        self.write(enable, state.get());
        self.write(IFLAG, self.read(IFLAG) | bit);
    }

    /// The controller finished one half of a ping-pong cycle on `channel`.
    pub fn flag(&self, channel: usize) {
        self.settle();
        self.write(IFLAG, self.read(IFLAG) | 1 << channel);
    }

    /// The controller flipped `channel` to its other descriptor.
    pub fn flip(&self, channel: usize) {
        self.settle();
        let bit = 1 << channel;
        let (alternate, _) = PAIRS[3];
        let state = &self.state[3];
        state.set(state.get() ^ bit);
        self.write(alternate, state.get());
    }

    /// The controller hit a bus error.
    pub fn raise_error(&self) {
        self.write(IFLAG, self.read(IFLAG) | crate::ral::dma::ERR_FLAG);
    }

    /// Interrupt enable state, as the hardware sees it
    pub fn interrupt_enables(&self) -> u32 {
        self.read(IVS)
    }
}
