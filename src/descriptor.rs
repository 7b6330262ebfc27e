//! Transfer descriptors and the descriptor table
//!
//! A descriptor is the 16-byte record the controller fetches to learn what
//! to move. Each channel owns two of them: a primary and an alternate. The
//! controller decides which one it runs next, and software reads that
//! decision back from the channel's primary / alternate bit.

use core::cell::UnsafeCell;

/// Number of descriptor slots in each half of the table.
///
/// The controller finds the alternate half 0x100 bytes past the primary
/// half when it implements up to 16 channels.
pub const SLOTS: usize = 16;

/// The largest number of elements a single descriptor can move.
pub const MAX_ELEMENTS: usize = 1024;

/// Element width for both sides of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Width {
    /// 8 bit elements
    Byte = 0,
    /// 16 bit elements
    HalfWord = 1,
    /// 32 bit elements
    Word = 2,
}

impl Width {
    /// Returns the element size in bytes
    pub const fn bytes(self) -> usize {
        1 << self as usize
    }
    const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Width::Byte),
            1 => Some(Width::HalfWord),
            2 => Some(Width::Word),
            _ => None,
        }
    }
}

/// Address increment applied after each element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Increment {
    /// Step by one byte
    Byte = 0,
    /// Step by two bytes
    HalfWord = 1,
    /// Step by four bytes
    Word = 2,
    /// Keep the address fixed, like a peripheral data register
    None = 3,
}

impl Increment {
    /// The increment that steps over one element of `width`
    pub const fn element(width: Width) -> Self {
        match width {
            Width::Byte => Increment::Byte,
            Width::HalfWord => Increment::HalfWord,
            Width::Word => Increment::Word,
        }
    }
    const fn from_raw(raw: u32) -> Self {
        match raw & 0b11 {
            0 => Increment::Byte,
            1 => Increment::HalfWord,
            2 => Increment::Word,
            _ => Increment::None,
        }
    }
}

/// How many elements move before the controller re-arbitrates
///
/// Stored as `R_power`: the channel transfers `2^R_power` elements, then
/// the controller checks for a higher priority request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[rustfmt::skip]
pub enum Arbitration {
    After1    = 0,
    After2    = 1,
    After4    = 2,
    After8    = 3,
    After16   = 4,
    After32   = 5,
    After64   = 6,
    After128  = 7,
    After256  = 8,
    After512  = 9,
    After1024 = 10,
}

impl Arbitration {
    /// Returns the number of elements between arbitrations
    pub const fn elements(self) -> usize {
        1 << self as usize
    }
    const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Arbitration::After1,
            1 => Arbitration::After2,
            2 => Arbitration::After4,
            3 => Arbitration::After8,
            4 => Arbitration::After16,
            5 => Arbitration::After32,
            6 => Arbitration::After64,
            7 => Arbitration::After128,
            8 => Arbitration::After256,
            9 => Arbitration::After512,
            // 11 through 15 also mean "never"; the channel runs to completion.
            _ => Arbitration::After1024,
        }
    }
}

/// Cycle mode of a descriptor
///
/// Hardware moves a descriptor from one of the running modes back to
/// [`Stop`](CycleControl::Stop) when it finishes it. Software re-arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CycleControl {
    /// Channel stopped, or descriptor consumed
    Stop = 0,
    /// One descriptor, one request per arbitration batch
    Basic = 1,
    /// One descriptor, a single request runs the whole transfer
    Auto = 2,
    /// Primary and alternate run back to back, software refills the idle half
    PingPong = 3,
    /// Primary copies the next memory task into the alternate slot
    MemoryScatterGatherPrimary = 4,
    /// A memory task, run right after it's copied
    MemoryScatterGatherAlternate = 5,
    /// Primary copies the next peripheral task into the alternate slot
    PeripheralScatterGatherPrimary = 6,
    /// A peripheral task, run on the next peripheral request
    PeripheralScatterGatherAlternate = 7,
}

impl CycleControl {
    const fn from_raw(raw: u32) -> Self {
        match raw & 0b111 {
            0 => CycleControl::Stop,
            1 => CycleControl::Basic,
            2 => CycleControl::Auto,
            3 => CycleControl::PingPong,
            4 => CycleControl::MemoryScatterGatherPrimary,
            5 => CycleControl::MemoryScatterGatherAlternate,
            6 => CycleControl::PeripheralScatterGatherPrimary,
            _ => CycleControl::PeripheralScatterGatherAlternate,
        }
    }
}

/// Which half of the descriptor table a channel uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    Primary,
    Alternate,
}

impl Half {
    /// Returns the other half
    pub const fn other(self) -> Self {
        match self {
            Half::Primary => Half::Alternate,
            Half::Alternate => Half::Primary,
        }
    }
}

/// The packed descriptor control word
///
/// | bits   | field           |
/// |--------|-----------------|
/// | 0..3   | `cycle_ctrl`    |
/// | 3      | `next_useburst` |
/// | 4..14  | `n_minus_1`     |
/// | 14..18 | `R_power`       |
/// | 18..21 | `src_prot_ctrl` |
/// | 21..24 | `dst_prot_ctrl` |
/// | 24..26 | `src_size`      |
/// | 26..28 | `src_inc`       |
/// | 28..30 | `dst_size`      |
/// | 30..32 | `dst_inc`       |
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Control(u32);

macro_rules! field {
    ($get:ident, $set:ident, $offset:expr, $width:expr) => {
        const fn $get(self) -> u32 {
            (self.0 >> $offset) & ((1 << $width) - 1)
        }
        const fn $set(self, value: u32) -> Self {
            let mask = ((1 << $width) - 1) << $offset;
            Control((self.0 & !mask) | ((value << $offset) & mask))
        }
    };
}

impl Control {
    field!(cycle_ctrl, with_cycle_ctrl, 0, 3);
    field!(next_useburst, with_next_useburst, 3, 1);
    field!(n_minus_1, with_n_minus_1, 4, 10);
    field!(r_power, with_r_power, 14, 4);
    field!(src_size, with_src_size, 24, 2);
    field!(src_inc, with_src_inc, 26, 2);
    field!(dst_size, with_dst_size, 28, 2);
    field!(dst_inc, with_dst_inc, 30, 2);

    /// A control word with every field zero (`Stop`, one byte element)
    pub const fn new() -> Self {
        Control(0)
    }
    /// Wrap a raw control word
    pub const fn from_raw(raw: u32) -> Self {
        Control(raw)
    }
    /// Returns the raw control word
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn cycle_control(self) -> CycleControl {
        CycleControl::from_raw(self.cycle_ctrl())
    }
    pub const fn set_cycle_control(self, mode: CycleControl) -> Self {
        self.with_cycle_ctrl(mode as u32)
    }

    /// Run the cycle after this one in burst mode
    pub const fn next_burst(self) -> bool {
        self.next_useburst() != 0
    }
    pub const fn set_next_burst(self, burst: bool) -> Self {
        self.with_next_useburst(burst as u32)
    }

    /// Number of elements described, `1..=1024`
    pub const fn count(self) -> usize {
        self.n_minus_1() as usize + 1
    }
    /// Set the number of elements
    ///
    /// `count` is stored as `count - 1` in ten bits. Callers validate the
    /// range; values outside of `1..=1024` are truncated.
    pub const fn set_count(self, count: usize) -> Self {
        self.with_n_minus_1(count.wrapping_sub(1) as u32)
    }

    pub const fn arbitration(self) -> Arbitration {
        Arbitration::from_raw(self.r_power())
    }
    pub const fn set_arbitration(self, arbitration: Arbitration) -> Self {
        self.with_r_power(arbitration as u32)
    }

    /// Source element width, or `None` for the reserved encoding
    pub const fn source_width(self) -> Option<Width> {
        Width::from_raw(self.src_size())
    }
    pub const fn set_source_width(self, width: Width) -> Self {
        self.with_src_size(width as u32)
    }

    pub const fn source_increment(self) -> Increment {
        Increment::from_raw(self.src_inc())
    }
    pub const fn set_source_increment(self, increment: Increment) -> Self {
        self.with_src_inc(increment as u32)
    }

    /// Destination element width, or `None` for the reserved encoding
    pub const fn destination_width(self) -> Option<Width> {
        Width::from_raw(self.dst_size())
    }
    pub const fn set_destination_width(self, width: Width) -> Self {
        self.with_dst_size(width as u32)
    }

    pub const fn destination_increment(self) -> Increment {
        Increment::from_raw(self.dst_inc())
    }
    pub const fn set_destination_increment(self, increment: Increment) -> Self {
        self.with_dst_inc(increment as u32)
    }
}

impl core::fmt::Debug for Control {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Control")
            .field("cycle_ctrl", &self.cycle_control())
            .field("next_useburst", &self.next_burst())
            .field("n_minus_1", &self.n_minus_1())
            .field("R_power", &self.r_power())
            .field("src_size", &self.src_size())
            .field("src_inc", &self.source_increment())
            .field("dst_size", &self.dst_size())
            .field("dst_inc", &self.destination_increment())
            .finish()
    }
}

/// A transfer descriptor
///
/// The controller wants the address of the *last* element of each side.
/// Build descriptors with [`Config::descriptor`](crate::Config::descriptor),
/// which does that bookkeeping, or with the scatter-gather builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C, align(16))]
pub struct Descriptor {
    /// Source end address
    pub source_end: u32,
    /// Destination end address
    pub destination_end: u32,
    /// Control word
    pub control: Control,
    /// Unused by software. The controller may use it as scratch space.
    pub user: u32,
}

const _: () = assert!(core::mem::size_of::<Descriptor>() == 16);

impl Descriptor {
    /// A descriptor that describes nothing (`Stop`)
    pub const fn new() -> Self {
        Descriptor {
            source_end: 0,
            destination_end: 0,
            control: Control::new(),
            user: 0,
        }
    }
}

/// The descriptor table shared between software and the controller
///
/// Allocate one of these in a `static`, and hand it to [`Dma::new`](crate::Dma::new).
/// [`Dma::reset`](crate::Dma::reset) programs the controller's base pointers
/// with the table's address.
///
/// ```
/// use es32_dma::DescriptorTable;
///
/// static DESCRIPTORS: DescriptorTable = DescriptorTable::new();
/// ```
///
/// The controller reads and writes the slots on its own. Slots are only
/// touched through volatile accesses, and the driver only writes a slot
/// when the owning channel is disabled, or when the completion flag says
/// the controller moved on to the other half.
#[repr(C, align(512))]
pub struct DescriptorTable {
    primary: [UnsafeCell<Descriptor>; SLOTS],
    alternate: [UnsafeCell<Descriptor>; SLOTS],
}

const _: () = assert!(core::mem::size_of::<DescriptorTable>() == 512);

// Safety: all slot access is volatile, and the driver allocates one
// channel per slot index.
unsafe impl Sync for DescriptorTable {}

impl DescriptorTable {
    /// Create a table of stopped descriptors
    pub const fn new() -> Self {
        const STOPPED: UnsafeCell<Descriptor> = UnsafeCell::new(Descriptor::new());
        DescriptorTable {
            primary: [STOPPED; SLOTS],
            alternate: [STOPPED; SLOTS],
        }
    }

    fn slot(&self, channel: usize, half: Half) -> *mut Descriptor {
        match half {
            Half::Primary => self.primary[channel].get(),
            Half::Alternate => self.alternate[channel].get(),
        }
    }

    /// Returns the address of the primary half
    pub fn primary_base(&self) -> *const Descriptor {
        self.primary.as_ptr().cast()
    }

    /// Returns the address of the alternate half
    pub fn alternate_base(&self) -> *const Descriptor {
        self.alternate.as_ptr().cast()
    }

    /// Returns the address of one slot
    pub fn slot_address(&self, channel: usize, half: Half) -> *const Descriptor {
        self.slot(channel, half)
    }

    /// Read a channel's descriptor
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not less than [`SLOTS`].
    pub fn read(&self, channel: usize, half: Half) -> Descriptor {
        // Safety: slot pointer is valid and aligned; volatile because
        // the controller writes back the slot while it runs.
        unsafe { core::ptr::read_volatile(self.slot(channel, half)) }
    }

    /// Write a channel's descriptor
    ///
    /// # Safety
    ///
    /// The controller must not be using this slot. That means the channel
    /// is disabled, or the channel completed this half and is running the
    /// other one. The caller must also be the only writer of this channel's
    /// slots.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not less than [`SLOTS`].
    pub unsafe fn write(&self, channel: usize, half: Half, descriptor: Descriptor) {
        core::ptr::write_volatile(self.slot(channel, half), descriptor);
    }

    /// Stop every descriptor in the table
    ///
    /// # Safety
    ///
    /// No channel may be enabled.
    pub(crate) unsafe fn clear(&self) {
        for channel in 0..SLOTS {
            self.write(channel, Half::Primary, Descriptor::new());
            self.write(channel, Half::Alternate, Descriptor::new());
        }
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_fields_pack_in_place() {
        let ctrl = Control::new()
            .set_cycle_control(CycleControl::PingPong)
            .set_next_burst(true)
            .set_count(1024)
            .set_arbitration(Arbitration::After8)
            .set_source_width(Width::Word)
            .set_source_increment(Increment::Word)
            .set_destination_width(Width::Word)
            .set_destination_increment(Increment::None);

        assert_eq!(ctrl.raw() & 0b111, 3);
        assert_eq!((ctrl.raw() >> 3) & 1, 1);
        assert_eq!((ctrl.raw() >> 4) & 0x3FF, 1023);
        assert_eq!((ctrl.raw() >> 14) & 0xF, 3);
        assert_eq!((ctrl.raw() >> 24) & 0b11, 2);
        assert_eq!((ctrl.raw() >> 26) & 0b11, 2);
        assert_eq!((ctrl.raw() >> 28) & 0b11, 2);
        assert_eq!((ctrl.raw() >> 30) & 0b11, 3);

        assert_eq!(ctrl.cycle_control(), CycleControl::PingPong);
        assert_eq!(ctrl.count(), 1024);
        assert_eq!(ctrl.arbitration(), Arbitration::After8);
        assert_eq!(ctrl.destination_increment(), Increment::None);
    }

    #[test]
    fn setters_leave_neighbors_alone() {
        let ctrl = Control::from_raw(u32::MAX).set_count(1);
        assert_eq!(ctrl.n_minus_1(), 0);
        assert_eq!(ctrl.raw() | (0x3FF << 4), u32::MAX);

        let ctrl = Control::from_raw(u32::MAX).set_cycle_control(CycleControl::Stop);
        assert_eq!(ctrl.raw(), u32::MAX & !0b111);
    }

    #[test]
    fn reserved_size_decodes_to_none() {
        let ctrl = Control::from_raw(0b11 << 24);
        assert_eq!(ctrl.source_width(), None);
        assert_eq!(ctrl.destination_width(), Some(Width::Byte));
    }

    #[test]
    fn table_layout() {
        let table = DescriptorTable::new();
        let primary = table.primary_base() as usize;
        assert_eq!(primary % 512, 0);
        assert_eq!(table.alternate_base() as usize - primary, 0x100);
        assert_eq!(
            table.slot_address(5, Half::Alternate) as usize - primary,
            0x100 + 5 * 16
        );
    }

    #[test]
    fn table_slots_are_independent() {
        let table = DescriptorTable::new();
        let descriptor = Descriptor {
            source_end: 0x2000_0010,
            destination_end: 0x4000_0000,
            control: Control::new().set_cycle_control(CycleControl::Basic),
            user: 0,
        };
        unsafe { table.write(3, Half::Primary, descriptor) };
        assert_eq!(table.read(3, Half::Primary), descriptor);
        assert_eq!(table.read(3, Half::Alternate), Descriptor::new());
        assert_eq!(table.read(2, Half::Primary), Descriptor::new());
    }
}
