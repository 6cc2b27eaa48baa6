//! State passed from one boot of the bootloader to the next.
//!
//! The firmware keeps a single [`Handoff`] in RAM that the runtime never
//! initializes. A watchdog or software reset leaves it as it was; after
//! power-on it holds whatever the RAM came up with. Every field is a plain
//! integer, so any bit pattern is a valid (if meaningless) value, and nothing
//! in the boot decision trusts it on its own.

use zerocopy::{AsBytes, FromBytes};

/// Value of [`Handoff::boot_origin_marker`] meaning "the bootloader reset the
/// chip on purpose, intending to start the application".
pub const SELF_RESET: u32 = 0xd831_7bc2;

/// Anything else. Written when the marker is consumed.
pub const NOT_SELF_RESET: u32 = 0;

#[derive(Copy, Clone, Debug, Default, AsBytes, FromBytes)]
#[repr(C)]
pub struct Handoff {
    /// [`SELF_RESET`] if and only if the last reset was our own.
    pub boot_origin_marker: u32,
    /// Reset cause of the boot *before* our own reset, forwarded to the
    /// application instead of the watchdog reset we cause ourselves.
    pub saved_reset_cause: u32,
    /// Hardware reset cause of this boot, captured before anything else runs.
    /// Single writer (the early capture hook, or the arbiter when it restores
    /// the saved cause), and this is where the application looks.
    pub reset_cause_mirror: u32,
}

/// The hardware's record of why the chip reset. Its bits accumulate over
/// resets until software clears them.
pub trait ResetCause {
    fn read(&mut self) -> u32;
    fn clear(&mut self);
}

impl<T: ResetCause + ?Sized> ResetCause for &mut T {
    fn read(&mut self) -> u32 {
        T::read(self)
    }

    fn clear(&mut self) {
        T::clear(self)
    }
}

impl Handoff {
    /// Moves the hardware reset cause into the mirror and clears the
    /// register, so that the next boot sees only its own reset. Called from
    /// the early startup hook, before any interrupt source is armed.
    pub fn capture<R: ResetCause>(&mut self, mut register: R) {
        self.reset_cause_mirror = register.read();
        register.clear();
    }

    pub fn is_self_reset(&self) -> bool {
        self.boot_origin_marker == SELF_RESET
    }
}

static_assertions::const_assert_ne!(SELF_RESET, NOT_SELF_RESET);
