//! LPC55 hardware behind the `bootcore` traits, and the memory map the
//! bootloader and the application agree on.

#![no_std]

pub mod bsp;
pub mod entropy;
pub mod flash;
pub mod radio;
pub mod settings;
pub mod watchdog;

use core::mem::size_of;

use bootcore::handoff::{Handoff, ResetCause};
use static_assertions::const_assert;

/// Start of the application region. The application's vector table sits here,
/// and "offset 0" everywhere in `bootcore` means this address.
pub const APP_BASE: u32 = 0x0000_8000;

/// Size of the application region.
pub const APP_SIZE: u32 = 0x0009_0000;

/// The page holding the persisted round counter, right after the application.
pub const ROUND_BASE: u32 = APP_BASE + APP_SIZE;

/// Erase and program granularity of the internal flash.
pub const PAGE_SIZE: usize = 512;

/// Core clock as the boot ROM leaves it. Nothing here reconfigures it.
pub const CORE_CLOCK_HZ: u32 = 96_000_000;

/// Where the linker puts the [`Handoff`] block. The application has to leave
/// these bytes alone and finds its reset cause at `HANDOFF_BASE + 8`.
pub const HANDOFF_BASE: u32 = 0x2000_0000;

/// Space reserved for the handoff block by `memory.x`.
const HANDOFF_REGION: usize = 16;

const_assert!(size_of::<Handoff>() <= HANDOFF_REGION);
const_assert!(APP_BASE as usize % PAGE_SIZE == 0 && APP_SIZE as usize % PAGE_SIZE == 0);

/// Bits of the PMC `AOREG1` reset cause register.
pub mod reset_cause {
    pub const POR: u32 = 1 << 4;
    pub const PADRESET: u32 = 1 << 5;
    pub const BODRESET: u32 = 1 << 6;
    pub const SYSTEMRESET: u32 = 1 << 7;
    pub const WDTRESET: u32 = 1 << 8;
    pub const SWRRESET: u32 = 1 << 9;

    pub const ALL: u32 = POR | PADRESET | BODRESET | SYSTEMRESET | WDTRESET | SWRRESET;
}

/// The reset cause bits of the PMC's `AOREG1`. The boot ROM ORs in the cause
/// of every reset; only power loss or software clears them.
pub struct Aoreg1<'a>(pub &'a lpc55_pac::pmc::RegisterBlock);

impl ResetCause for Aoreg1<'_> {
    fn read(&mut self) -> u32 {
        self.0.aoreg1.read().bits() & reset_cause::ALL
    }

    fn clear(&mut self) {
        self.0
            .aoreg1
            .modify(|r, w| unsafe { w.bits(r.bits() & !reset_cause::ALL) });
    }
}
