//! The watchdog, which is both our timeout and our only way out.
//!
//! Once upload mode starts the watchdog is never disabled. Every path out of
//! the bootloader (a finished session, a failed one, a stalled one) ends in
//! [`Supervisor::abort_and_restart`], so the next boot always starts from
//! hardware reset state, and only the arbiter ever starts the application.

use crate::handoff::{Handoff, SELF_RESET};

/// Watchdog periods the bootloader uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Period {
    /// Several seconds. Armed for normal upload-mode operation.
    Upload,
    /// Tens of milliseconds. Armed to force a reset.
    Restart,
}

pub trait Watchdog {
    /// Enables the watchdog with a reset after `period`, or changes the period
    /// of an already running one. Either way, restarts the countdown.
    fn start(&mut self, period: Period);

    fn feed(&mut self);
}

impl<T: Watchdog + ?Sized> Watchdog for &mut T {
    fn start(&mut self, period: Period) {
        T::start(self, period)
    }

    fn feed(&mut self) {
        T::feed(self)
    }
}

pub struct Supervisor<'a, W> {
    watchdog: W,
    handoff: &'a mut Handoff,
}

impl<'a, W: Watchdog> Supervisor<'a, W> {
    /// Takes over the watchdog and arms it for upload mode.
    pub fn new(mut watchdog: W, handoff: &'a mut Handoff) -> Self {
        watchdog.start(Period::Upload);
        Self { watchdog, handoff }
    }

    /// Keeps the upload-mode watchdog from firing during long waits.
    pub fn keepalive(&mut self) {
        self.watchdog.feed();
    }

    /// Leaves word for the next boot that this reset was ours, and arms the
    /// short watchdog period.
    pub fn arm_restart(&mut self) {
        self.handoff.saved_reset_cause = self.handoff.reset_cause_mirror;
        self.handoff.boot_origin_marker = SELF_RESET;
        self.watchdog.start(Period::Restart);
    }

    /// Resets the processor via the watchdog. Never returns.
    pub fn abort_and_restart(&mut self) -> ! {
        self.arm_restart();
        debug!("waiting for watchdog reset");
        loop {
            core::hint::spin_loop();
        }
    }
}
