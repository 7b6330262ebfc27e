//! DMA channels
//!
//! A [`Channel`] is the handle for one of the controller's channels. It
//! owns the channel's two descriptor slots and the channel's bit in each
//! of the controller's set / clear registers.

use crate::{
    config::{Config, Priority},
    descriptor::{CycleControl, Descriptor, DescriptorTable, Half},
    interrupt::SharedWaker,
    ral::{self, dma::ERR_FLAG, Static},
    trigger::Trigger,
    Error, Result,
};

use core::cell::Cell;
use critical_section::Mutex;

impl<const CHANNELS: usize> crate::Dma<CHANNELS> {
    /// Creates the DMA channel described by `index`.
    ///
    /// # Safety
    ///
    /// This will create a handle that may alias global, mutable state. You should only create
    /// one channel per index. If there are multiple channels for the same index, you're
    /// responsible for ensuring synchronized access.
    ///
    /// # Panics
    ///
    /// Panics if `index` is greater than or equal to the maximum number of channels.
    pub unsafe fn channel(&'static self, index: usize) -> Channel {
        assert!(index < CHANNELS);
        Channel {
            index,
            registers: self.registers,
            table: self.table,
            waker: &self.wakers[index],
            latched: &self.latched,
        }
    }
}

/// A DMA channel
///
/// You should rely on your HAL to allocate `Channel`s. If your HAL does not allocate channels,
/// or if you're desigining the HAL, use [`Dma`](crate::Dma) to create channels.
///
/// The `Channel` stores memory addresses independent of the memory lifetime. You must make
/// sure that the channel's state is valid before enabling a transfer!
pub struct Channel {
    /// Our channel number, expected to be between [0, 16)
    index: usize,
    /// Reference to the DMA registers
    registers: Static<ral::dma::RegisterBlock>,
    /// The descriptor table shared with the controller
    table: &'static DescriptorTable,
    /// This channel's waker.
    pub(crate) waker: &'static SharedWaker,
    /// Flags latched by interrupt handlers, shared by all channels
    latched: &'static Mutex<Cell<u32>>,
}

// It's OK to send a channel across an execution context.
// They can't be cloned or copied, so there's no chance of
// them being (mutably) shared.
unsafe impl Send for Channel {}

impl Channel {
    fn bit(&self) -> u32 {
        1 << self.index
    }

    /// Returns the DMA channel number
    ///
    /// Channels are unique and numbered within the half-open range `[0, CHANNELS)`.
    pub fn channel(&self) -> usize {
        self.index
    }

    /// Configure this channel for a transfer
    ///
    /// Writes the descriptor for `config` into the half named by
    /// `config.half`, with cycle mode `mode`. Then it
    ///
    /// - selects that half,
    /// - sets or clears burst-only requests,
    /// - sets the priority,
    /// - enables or disables the completion interrupt,
    /// - routes `config.trigger` to the channel,
    /// - masks hardware requests for software triggers, and unmasks them
    ///   otherwise.
    ///
    /// The channel is not enabled. Nothing is written if the configuration
    /// is invalid, or if the channel is enabled.
    pub fn configure(&mut self, mode: CycleControl, config: &Config) -> Result<()> {
        program(self.registers, self.table, self.index, mode, config)
    }

    /// Write a prebuilt descriptor, then apply the channel settings of `config`
    ///
    /// Like [`configure`](Self::configure), for descriptors that a `Config`
    /// can't describe.
    pub(crate) fn configure_descriptor(
        &mut self,
        descriptor: Descriptor,
        config: &Config,
    ) -> Result<()> {
        apply(self.registers, self.table, self.index, descriptor, config)
    }

    /// Read one of this channel's descriptors
    ///
    /// While the channel runs, the controller writes back the descriptor
    /// it's using. The value may be stale as soon as it's read.
    pub fn descriptor(&self, half: Half) -> Descriptor {
        self.table.read(self.index, half)
    }

    /// Write one of this channel's descriptors
    ///
    /// No channel registers change.
    ///
    /// # Safety
    ///
    /// The controller must not be using `half`. Either the channel is
    /// disabled, or the channel completed `half` and moved to the other half.
    pub unsafe fn write_descriptor(&mut self, half: Half, descriptor: Descriptor) {
        self.table.write(self.index, half, descriptor);
    }

    /// Returns the address of one of this channel's descriptor slots
    pub fn descriptor_address(&self, half: Half) -> *const Descriptor {
        self.table.slot_address(self.index, half)
    }

    /// Enable the DMA channel
    ///
    /// The channel runs once it sees a request, and the controller is enabled.
    ///
    /// # Safety
    ///
    /// This could initiate a DMA transaction that uses an invalid source or destination.
    /// Caller must ensure that the source and destination set in the channel are valid for
    /// the lifetime of the transfer.
    pub unsafe fn enable(&self) {
        // Immutable write OK. Set / clear registers only touch our bit.
        ral::barrier();
        self.registers.CHENSET.write(self.bit());
        log::trace!("DMA{} enabled", self.index);
    }

    /// Disable the DMA channel, preventing any DMA transfers
    ///
    /// An in-flight transfer stops at an element boundary. Don't assume
    /// anything about which element was last moved.
    pub fn disable(&self) {
        self.registers.CHENCLR.write(self.bit());
        log::trace!("DMA{} disabled", self.index);
    }

    /// Indicates if this DMA channel is enabled
    ///
    /// The controller disables a channel when it finishes a basic or auto
    /// cycle.
    pub fn is_enabled(&self) -> bool {
        self.registers.CHENSET.read() & self.bit() != 0
    }

    /// Request service from the DMA controller
    ///
    /// Use this for memory-to-memory transfers. Peripheral transfers
    /// rely on the peripheral to request service.
    ///
    /// # Safety
    ///
    /// This could initiate a DMA transaction that uses an invalid source or destination.
    /// Caller must ensure that the source and destination set in the channel are valid for
    /// the lifetime of the transfer.
    pub unsafe fn software_request(&self) {
        ral::barrier();
        self.registers.CHSWREQ.write(self.bit());
    }

    /// Returns `true` if the channel is waiting for a request
    pub fn is_waiting_on_request(&self) -> bool {
        self.registers.WAITONREQ.read() & self.bit() != 0
    }

    /// Mask, or unmask, this channel's hardware request line
    ///
    /// Software requests work on a masked channel.
    pub fn set_request_mask(&mut self, mask: bool) {
        if mask {
            self.registers.CHREQMASKSET.write(self.bit());
        } else {
            self.registers.CHREQMASKCLR.write(self.bit());
        }
    }

    /// Returns `true` if this channel ignores hardware requests
    pub fn is_request_masked(&self) -> bool {
        self.registers.CHREQMASKSET.read() & self.bit() != 0
    }

    /// Select which descriptor the controller uses next
    pub fn select_half(&mut self, half: Half) {
        match half {
            Half::Primary => self.registers.CHPRIALTCLR.write(self.bit()),
            Half::Alternate => self.registers.CHPRIALTSET.write(self.bit()),
        }
    }

    /// Returns the descriptor that the controller uses next
    ///
    /// The controller flips this in ping-pong and scatter-gather cycles.
    pub fn selected_half(&self) -> Half {
        if self.registers.CHPRIALTSET.read() & self.bit() != 0 {
            Half::Alternate
        } else {
            Half::Primary
        }
    }

    /// Set this channel's arbitration priority
    pub fn set_priority(&mut self, priority: Priority) {
        match priority {
            Priority::Default => self.registers.CHPRCLR.write(self.bit()),
            Priority::High => self.registers.CHPRSET.write(self.bit()),
        }
    }

    /// Returns this channel's arbitration priority
    pub fn priority(&self) -> Priority {
        if self.registers.CHPRSET.read() & self.bit() != 0 {
            Priority::High
        } else {
            Priority::Default
        }
    }

    /// Only respond to burst requests
    ///
    /// When set, the peripheral's single requests are ignored.
    pub fn set_burst(&mut self, burst: bool) {
        if burst {
            self.registers.CHUSEBURSTSET.write(self.bit());
        } else {
            self.registers.CHUSEBURSTCLR.write(self.bit());
        }
    }

    /// Returns `true` if the channel only responds to burst requests
    ///
    /// The controller clears this itself during some scatter-gather
    /// cycles, depending on the descriptor's `next_useburst`.
    pub fn is_burst(&self) -> bool {
        self.registers.CHUSEBURSTSET.read() & self.bit() != 0
    }

    /// Enable or disable interrupt generation when the transfer completes
    ///
    /// You're responsible for registering your interrupt handler.
    pub fn set_interrupt_on_completion(&mut self, intr: bool) {
        if intr {
            self.registers.IER.write(self.bit());
        } else {
            self.registers.IDR.write(self.bit());
        }
    }

    /// Returns `true` if the channel interrupts when it completes
    pub fn is_interrupt_on_completion(&self) -> bool {
        self.registers.IVS.read() & self.bit() != 0
    }

    /// Route a hardware trigger to this channel
    pub fn set_trigger(&mut self, trigger: Trigger) {
        route(self.registers, self.index, trigger);
    }

    /// Returns the raw `(msel, msigsel)` routed to this channel
    pub fn trigger_raw(&self) -> (u32, u32) {
        let selcon = &self.registers.CH_SELCON[self.index];
        ral::read_reg!(crate::ral::dma::selcon, selcon, SELCON, MSEL, MSIGSEL)
    }

    /// Indicates if the DMA transfer has completed
    ///
    /// This includes a completion taken by [`on_interrupt`](crate::Dma::on_interrupt).
    pub fn is_complete(&self) -> bool {
        let latched = critical_section::with(|cs| self.latched.borrow(cs).get());
        (self.registers.IFLAG.read() | latched) & self.bit() != 0
    }

    /// Clears completion indication
    pub fn clear_complete(&self) {
        // Immutable write OK. ICFR is write-one-to-clear.
        self.registers.ICFR.write(self.bit());
        let bit = self.bit();
        critical_section::with(|cs| {
            let latched = self.latched.borrow(cs);
            latched.set(latched.get() & !bit);
        });
    }

    /// Indicates if the DMA controller is in an error state
    ///
    /// The error flag is shared by all channels. It may not be related to
    /// this channel.
    pub fn is_error(&self) -> bool {
        let latched = critical_section::with(|cs| self.latched.borrow(cs).get());
        (self.registers.IFLAG.read() | latched) & ERR_FLAG != 0
    }

    /// Clears the controller's error flag
    pub fn clear_error(&self) {
        self.registers.ICFR.write(ERR_FLAG);
        ral::write_reg!(crate::ral::dma, self.registers, ERRCLR, ERR_CLR: 1);
        critical_section::with(|cs| {
            let latched = self.latched.borrow(cs);
            latched.set(latched.get() & !ERR_FLAG);
        });
    }

    /// Move a hardware completion flag into the latch
    ///
    /// Returns `true` if the channel had a completion flag.
    pub(crate) fn latch_complete(&self) -> bool {
        let bit = self.bit();
        if self.registers.IFLAG.read() & bit != 0 {
            critical_section::with(|cs| {
                let latched = self.latched.borrow(cs);
                latched.set(latched.get() | bit);
            });
            self.registers.ICFR.write(bit);
        }
        self.is_complete()
    }
}

fn route(registers: Static<ral::dma::RegisterBlock>, index: usize, trigger: Trigger) {
    let selcon = &registers.CH_SELCON[index];
    ral::write_reg!(
        crate::ral::dma::selcon,
        selcon,
        SELCON,
        MSEL: trigger.source().raw(),
        MSIGSEL: trigger.signal().raw()
    );
}

/// Build the descriptor for `config`, then write it and the channel's registers
pub(crate) fn program(
    registers: Static<ral::dma::RegisterBlock>,
    table: &DescriptorTable,
    index: usize,
    mode: CycleControl,
    config: &Config,
) -> Result<()> {
    let descriptor = config.descriptor(mode)?;
    apply(registers, table, index, descriptor, config)
}

/// Write a channel's descriptor into `config.half`, then its registers
///
/// Only the channel settings of `config` are used.
fn apply(
    registers: Static<ral::dma::RegisterBlock>,
    table: &DescriptorTable,
    index: usize,
    descriptor: Descriptor,
    config: &Config,
) -> Result<()> {
    let bit = 1 << index;
    if registers.CHENSET.read() & bit != 0 {
        return Err(Error::Busy);
    }
    log::debug!(
        "DMA{} {:?} {:?} src {:#010X} dst {:#010X} n {}",
        index,
        config.half,
        descriptor.control.cycle_control(),
        descriptor.source_end,
        descriptor.destination_end,
        descriptor.control.count()
    );

    // Safety: the channel is disabled, so the controller isn't
    // using either half.
    unsafe { table.write(index, config.half, descriptor) };

    match config.half {
        Half::Primary => registers.CHPRIALTCLR.write(bit),
        Half::Alternate => registers.CHPRIALTSET.write(bit),
    }
    if config.burst {
        registers.CHUSEBURSTSET.write(bit);
    } else {
        registers.CHUSEBURSTCLR.write(bit);
    }
    match config.priority {
        Priority::Default => registers.CHPRCLR.write(bit),
        Priority::High => registers.CHPRSET.write(bit),
    }
    if config.interrupt {
        registers.IER.write(bit);
    } else {
        registers.IDR.write(bit);
    }
    route(registers, index, config.trigger);
    if config.trigger.is_software() {
        registers.CHREQMASKSET.write(bit);
    } else {
        registers.CHREQMASKCLR.write(bit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fake::Fake;
    use crate::trigger::{Signal, Source, Trigger};
    use crate::{
        Arbitration, Config, ConfigError, CycleControl, Descriptor, Error, Half, Increment,
        Priority, Width,
    };

    fn config() -> Config {
        Config {
            source: 0x2000_0000 as *const (),
            destination: 0x4000_0010 as *mut (),
            count: 4,
            width: Width::Word,
            source_increment: Increment::Word,
            destination_increment: Increment::None,
            ..Config::new()
        }
    }

    #[test]
    fn ping_pong_primary_word_to_port() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(0) };
        channel.configure(CycleControl::PingPong, &config()).unwrap();

        let descriptor = channel.descriptor(Half::Primary);
        assert_eq!(descriptor.source_end, 0x2000_0000 + 12);
        assert_eq!(descriptor.destination_end, 0x4000_0010);
        assert_eq!(descriptor.control.cycle_control(), CycleControl::PingPong);
        assert_eq!(descriptor.control.count(), 4);
    }

    #[test]
    fn writing_one_half_leaves_the_other_alone() {
        let fake = Fake::new();
        for index in 0..6 {
            let sentinel = Descriptor {
                source_end: 0xDEAD_0000 | index as u32,
                destination_end: 0xBEEF_0000,
                control: crate::Control::from_raw(0xA5A5_A5A5),
                user: 0x1234_5678,
            };
            let mut channel = unsafe { fake.dma.channel(index) };
            unsafe { channel.write_descriptor(Half::Alternate, sentinel) };

            channel.configure(CycleControl::Basic, &config()).unwrap();
            fake.settle();
            assert_eq!(channel.selected_half(), Half::Primary);
            assert_eq!(channel.descriptor(Half::Alternate), sentinel);
            assert_ne!(channel.descriptor(Half::Primary), sentinel);
        }
    }

    #[test]
    fn configuration_reads_back() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(3) };

        let trigger = Trigger::new(Source::Uart1, Signal::UartReceive).unwrap();
        let high = Config {
            half: Half::Alternate,
            priority: Priority::High,
            interrupt: true,
            burst: true,
            trigger,
            ..config()
        };
        channel.configure(CycleControl::Basic, &high).unwrap();
        fake.settle();
        assert_eq!(channel.selected_half(), Half::Alternate);
        assert_eq!(channel.priority(), Priority::High);
        assert!(channel.is_interrupt_on_completion());
        assert!(channel.is_burst());
        assert!(!channel.is_request_masked());
        assert_eq!(channel.trigger_raw(), (0x09, 1));

        let low = Config {
            half: Half::Primary,
            priority: Priority::Default,
            interrupt: false,
            burst: false,
            trigger: Trigger::SOFTWARE,
            ..config()
        };
        channel.configure(CycleControl::Basic, &low).unwrap();
        fake.settle();
        assert_eq!(channel.selected_half(), Half::Primary);
        assert_eq!(channel.priority(), Priority::Default);
        assert!(!channel.is_interrupt_on_completion());
        assert!(!channel.is_burst());
        assert!(channel.is_request_masked());
        assert_eq!(channel.trigger_raw(), (0, 0));

        // Configuring twice gives the same state.
        channel.configure(CycleControl::Basic, &low).unwrap();
        fake.settle();
        assert_eq!(channel.priority(), Priority::Default);
        assert!(channel.is_request_masked());
    }

    #[test]
    fn other_channels_keep_their_bits() {
        let fake = Fake::new();
        let mut zero = unsafe { fake.dma.channel(0) };
        let mut one = unsafe { fake.dma.channel(1) };
        zero.configure(
            CycleControl::Basic,
            &Config {
                priority: Priority::High,
                ..config()
            },
        )
        .unwrap();
        fake.settle();
        one.configure(CycleControl::Basic, &config()).unwrap();
        fake.settle();
        assert_eq!(zero.priority(), Priority::High);
        assert_eq!(one.priority(), Priority::Default);
    }

    #[test]
    fn invalid_configuration_writes_nothing() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(2) };
        let before = channel.descriptor(Half::Primary);
        let too_many = Config {
            count: 1025,
            priority: Priority::High,
            ..config()
        };
        assert_eq!(
            channel.configure(CycleControl::Basic, &too_many),
            Err(Error::InvalidConfig(ConfigError::TooManyElements(1025)))
        );
        fake.settle();
        assert_eq!(channel.descriptor(Half::Primary), before);
        assert_eq!(channel.priority(), Priority::Default);
        assert_eq!(fake.read(0x38), 0);
    }

    #[test]
    fn enabled_channel_is_busy() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(1) };
        channel.configure(CycleControl::Basic, &config()).unwrap();
        unsafe { channel.enable() };
        fake.settle();
        let descriptor = channel.descriptor(Half::Primary);
        let other = Config {
            count: 2,
            arbitration: Arbitration::After2,
            ..config()
        };
        assert_eq!(
            channel.configure(CycleControl::Basic, &other),
            Err(Error::Busy)
        );
        assert_eq!(channel.descriptor(Half::Primary), descriptor);

        channel.disable();
        fake.settle();
        assert!(channel.configure(CycleControl::Basic, &other).is_ok());
    }

    #[test]
    fn request_controls() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(5) };
        channel.set_request_mask(true);
        fake.settle();
        assert!(channel.is_request_masked());
        channel.set_request_mask(false);
        fake.settle();
        assert!(!channel.is_request_masked());

        unsafe { channel.software_request() };
        assert_eq!(fake.read(0x14), 1 << 5);
    }

    #[test]
    fn completion_flag() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(2) };
        channel.configure(CycleControl::Basic, &config()).unwrap();
        unsafe { channel.enable() };
        fake.settle();
        assert!(!channel.is_complete());

        fake.complete(2);
        assert!(channel.is_complete());
        assert!(!channel.is_enabled());
        channel.clear_complete();
        fake.settle();
        assert!(!channel.is_complete());
    }
}
