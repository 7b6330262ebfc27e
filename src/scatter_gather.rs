//! Scatter-gather descriptors
//!
//! In a scatter-gather cycle, the channel's primary descriptor doesn't
//! move data. It copies the next *task*, a descriptor from a list in
//! memory, into the channel's alternate slot. The controller then runs
//! that alternate descriptor, and returns to the primary for the next
//! task.
//!
//! - In a memory scatter-gather cycle, each task runs as soon as it's
//!   copied.
//! - In a peripheral scatter-gather cycle, each task waits for the next
//!   peripheral request.
//!
//! Build tasks with [`alternate`]. End the list with [`last`], so that the
//! channel stops after the final task. Start the chain with
//! [`Channel::configure_scatter_gather`].
//!
//! ```
//! use es32_dma::{scatter_gather, Config, Descriptor, Increment, Width};
//!
//! // Gather two blocks of SRAM into one.
//! let block = |source: usize, destination: usize, count| Config {
//!     source: source as *const (),
//!     destination: destination as *mut (),
//!     count,
//!     width: Width::Word,
//!     source_increment: Increment::Word,
//!     destination_increment: Increment::Word,
//!     ..Config::new()
//! };
//!
//! let mut tasks = [Descriptor::new(); 2];
//! scatter_gather::alternate(&mut tasks[0], &block(0x2000_0000, 0x2000_2000, 8), true)?;
//! scatter_gather::last(&mut tasks[1], &block(0x2000_1000, 0x2000_2020, 4), true)?;
//! # Ok::<(), es32_dma::Error>(())
//! ```

use crate::{
    channel::Channel,
    config::{bus_address, Config},
    descriptor::{Arbitration, CycleControl, Descriptor, Half, Increment, Width, MAX_ELEMENTS},
    error::ConfigError,
    Result,
};

/// Words in one task. The primary descriptor copies a task four words at a time.
const TASK_WORDS: usize = core::mem::size_of::<Descriptor>() / 4;

/// The longest task list one primary descriptor can copy
pub const MAX_TASKS: usize = MAX_ELEMENTS / TASK_WORDS;

/// Build an alternate descriptor for a scatter-gather chain
///
/// The cycle mode is forced to
/// [`MemoryScatterGatherAlternate`](CycleControl::MemoryScatterGatherAlternate)
/// when `memory` is `true`, and to
/// [`PeripheralScatterGatherAlternate`](CycleControl::PeripheralScatterGatherAlternate)
/// otherwise. `next_useburst` is forced to `memory`: a memory chain keeps
/// going in burst mode, a peripheral chain doesn't.
///
/// Only `descriptor` is written. `config`'s channel settings (half, priority,
/// interrupt, trigger, burst) are ignored.
pub fn alternate(descriptor: &mut Descriptor, config: &Config, memory: bool) -> Result<()> {
    let mode = if memory {
        CycleControl::MemoryScatterGatherAlternate
    } else {
        CycleControl::PeripheralScatterGatherAlternate
    };
    let mut task = config.descriptor(mode)?;
    task.control = task.control.set_next_burst(memory);
    *descriptor = task;
    Ok(())
}

/// Build the final task of a scatter-gather chain
///
/// The final task runs in auto mode for a memory chain, and in basic mode
/// for a peripheral chain. Either way, the channel stops after it, and
/// signals completion.
pub fn last(descriptor: &mut Descriptor, config: &Config, memory: bool) -> Result<()> {
    let mode = if memory {
        CycleControl::Auto
    } else {
        CycleControl::Basic
    };
    *descriptor = config.descriptor(mode)?;
    Ok(())
}

/// Build the primary descriptor that copies `tasks` task descriptors,
/// starting at `source`, into the alternate slot at `slot`
///
/// The source walks the task list. The destination end is the slot's last
/// word, whatever the task count.
fn copy_tasks(
    source: *const Descriptor,
    tasks: usize,
    slot: *const Descriptor,
    mode: CycleControl,
) -> Result<Descriptor> {
    if tasks > MAX_TASKS {
        return Err(ConfigError::TooManyElements(tasks * TASK_WORDS).into());
    }
    let copy = Config {
        source: source.cast(),
        destination: slot.cast_mut().cast(),
        count: tasks * TASK_WORDS,
        width: Width::Word,
        source_increment: Increment::Word,
        destination_increment: Increment::Word,
        arbitration: Arbitration::After4,
        ..Config::new()
    };
    let mut descriptor = copy.descriptor(mode)?;
    descriptor.destination_end = bus_address(slot as usize)?
        .checked_add(((TASK_WORDS - 1) * 4) as u32)
        .ok_or(ConfigError::AddressOverflow)?;
    Ok(descriptor)
}

impl Channel {
    /// Start a scatter-gather chain over `tasks`
    ///
    /// Writes the primary descriptor that copies each task into this
    /// channel's alternate slot, then applies `options` like
    /// [`configure`](Self::configure). Only the channel settings of `options`
    /// are used: priority, interrupt, trigger, and burst. The channel is not
    /// enabled.
    ///
    /// `tasks` must stay in place, unchanged, until the chain completes.
    ///
    /// # Errors
    ///
    /// Fails if `tasks` is empty, or holds more than [`MAX_TASKS`].
    pub fn configure_scatter_gather(
        &mut self,
        tasks: &[Descriptor],
        memory: bool,
        options: &Config,
    ) -> Result<()> {
        let mode = if memory {
            CycleControl::MemoryScatterGatherPrimary
        } else {
            CycleControl::PeripheralScatterGatherPrimary
        };
        let primary = copy_tasks(
            tasks.as_ptr(),
            tasks.len(),
            self.descriptor_address(Half::Alternate),
            mode,
        )?;
        let options = Config {
            half: Half::Primary,
            ..*options
        };
        self.configure_descriptor(primary, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fake::Fake, ConfigError, Error, Priority};

    fn chunk() -> Config {
        Config {
            source: 0x2000_0000 as *const (),
            destination: 0x2000_0800 as *mut (),
            count: 32,
            width: Width::HalfWord,
            source_increment: Increment::HalfWord,
            destination_increment: Increment::HalfWord,
            ..Config::new()
        }
    }

    #[test]
    fn memory_continuation() {
        let mut descriptor = Descriptor::new();
        alternate(&mut descriptor, &chunk(), true).unwrap();
        assert_eq!(
            descriptor.control.cycle_control(),
            CycleControl::MemoryScatterGatherAlternate
        );
        assert!(descriptor.control.next_burst());
        assert_eq!(descriptor.source_end, 0x2000_0000 + 62);
        assert_eq!(descriptor.destination_end, 0x2000_0800 + 62);
    }

    #[test]
    fn peripheral_continuation() {
        let mut descriptor = Descriptor::new();
        alternate(&mut descriptor, &chunk(), false).unwrap();
        assert_eq!(
            descriptor.control.cycle_control(),
            CycleControl::PeripheralScatterGatherAlternate
        );
        assert!(!descriptor.control.next_burst());
    }

    #[test]
    fn bad_chunk_leaves_descriptor() {
        let mut descriptor = Descriptor::new();
        let empty = Config {
            count: 0,
            ..chunk()
        };
        assert_eq!(
            alternate(&mut descriptor, &empty, true),
            Err(Error::InvalidConfig(ConfigError::EmptyTransfer))
        );
        assert_eq!(descriptor, Descriptor::new());
    }

    #[test]
    fn last_task_stops_the_chain() {
        let mut descriptor = Descriptor::new();
        last(&mut descriptor, &chunk(), true).unwrap();
        assert_eq!(descriptor.control.cycle_control(), CycleControl::Auto);
        last(&mut descriptor, &chunk(), false).unwrap();
        assert_eq!(descriptor.control.cycle_control(), CycleControl::Basic);
    }

    const TASKS: usize = 0x2000_1000;
    const SLOT: usize = 0x2000_4120;

    fn chain(tasks: usize) -> Descriptor {
        copy_tasks(
            TASKS as *const Descriptor,
            tasks,
            SLOT as *const Descriptor,
            CycleControl::MemoryScatterGatherPrimary,
        )
        .unwrap()
    }

    #[test]
    fn primary_copies_tasks_into_the_alternate_slot() {
        let primary = chain(3);
        let control = primary.control;
        assert_eq!(
            control.cycle_control(),
            CycleControl::MemoryScatterGatherPrimary
        );
        assert_eq!(control.count(), 12);
        assert_eq!(control.arbitration(), Arbitration::After4);
        assert_eq!(control.source_width(), Some(Width::Word));
        assert_eq!(control.destination_increment(), Increment::Word);
        assert_eq!(primary.source_end as usize, TASKS + 3 * 16 - 4);
        assert_eq!(primary.destination_end as usize, SLOT + 12);
    }

    #[test]
    fn destination_ends_on_the_slot_for_any_task_count() {
        for tasks in [1, 2, 3, 64, MAX_TASKS] {
            let primary = chain(tasks);
            assert_eq!(primary.control.count(), tasks * 4);
            assert_eq!(primary.source_end as usize, TASKS + tasks * 16 - 4);
            assert_eq!(primary.destination_end as usize - SLOT, 12);
        }
    }

    #[test]
    fn chain_primary_applies_the_channel_settings() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(2) };
        let options = Config {
            priority: Priority::High,
            half: Half::Alternate,
            ..Config::new()
        };
        channel
            .configure_descriptor(
                chain(3),
                &Config {
                    half: Half::Primary,
                    ..options
                },
            )
            .unwrap();
        fake.settle();
        assert_eq!(channel.descriptor(Half::Primary), chain(3));
        assert_eq!(channel.selected_half(), Half::Primary);
        assert_eq!(channel.priority(), Priority::High);
        assert!(channel.is_request_masked());

        unsafe { channel.enable() };
        fake.settle();
        assert_eq!(
            channel.configure_descriptor(chain(1), &options),
            Err(Error::Busy)
        );
        assert_eq!(channel.descriptor(Half::Primary), chain(3));
    }

    #[test]
    fn task_list_limit() {
        let fake = Fake::new();
        let mut channel = unsafe { fake.dma.channel(0) };
        let tasks = std::vec![Descriptor::new(); MAX_TASKS + 1];
        assert_eq!(
            channel.configure_scatter_gather(&tasks, false, &Config::new()),
            Err(Error::InvalidConfig(ConfigError::TooManyElements(1028)))
        );
        assert_eq!(
            channel.configure_scatter_gather(&[], false, &Config::new()),
            Err(Error::InvalidConfig(ConfigError::EmptyTransfer))
        );
    }
}
