//! Bounded busy-wait loops.
//!
//! Every wait in the bootloader is a countdown of poll iterations with a fixed
//! delay between them, never a wall-clock deadline. The real-time length of a
//! wait is `budget * interval_us`, give or take the time spent in the poll
//! itself.

use embedded_hal::blocking::delay::DelayUs;

/// A countdown budget and the delay between polls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoundedWait {
    pub budget: u16,
    pub interval_us: u32,
    /// Whether a rejected packet also feeds the watchdog. The wait for the
    /// header request deliberately doesn't, so that a stream of noise can't
    /// hold the bootloader in that state forever.
    pub feed_on_noise: bool,
}

/// Waiting for the uploader to open a session, and for the start header:
/// 250 polls, 1 ms apart.
pub const HEADER_REQUEST_WAIT: BoundedWait = BoundedWait {
    budget: 250,
    interval_us: 1000,
    feed_on_noise: false,
};

pub const HEADER_WAIT: BoundedWait = BoundedWait {
    feed_on_noise: true,
    ..HEADER_REQUEST_WAIT
};

/// Waiting for one data packet: 400 polls, 0.5 ms apart.
pub const DATA_WAIT: BoundedWait = BoundedWait {
    budget: 400,
    interval_us: 500,
    feed_on_noise: true,
};

/// Polls between repeats of an unanswered packet request (20 ms).
pub const RESEND_EVERY: u16 = 40;

/// Outcome of one poll.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Got what we were waiting for.
    Ready,
    /// Got something, but not that. Refills the budget.
    Noise,
    /// Nothing happened.
    Idle,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timeout;

impl BoundedWait {
    /// Calls `poll` until it returns [`Step::Ready`] or the budget runs out.
    ///
    /// `poll` receives the number of polls since the wait started or was last
    /// refilled by noise.
    pub fn run<D: DelayUs<u32>>(
        &self,
        delay: &mut D,
        mut poll: impl FnMut(u16) -> Step,
    ) -> Result<(), Timeout> {
        let mut remaining = self.budget;
        loop {
            match poll(self.budget - remaining) {
                Step::Ready => return Ok(()),
                Step::Noise => remaining = self.budget,
                Step::Idle => {}
            }

            remaining -= 1;
            if remaining == 0 {
                return Err(Timeout);
            }
            delay.delay_us(self.interval_us);
        }
    }
}
