//! The windowed watchdog (WWDT), clocked from the 1 MHz FRO through the
//! watchdog's fixed divide-by-4.

use bootcore::supervisor::{Period, Watchdog};

/// Watchdog counter rate.
const TICK_HZ: u32 = 1_000_000 / 4;

const UPLOAD_TICKS: u32 = TICK_HZ * 2;
const RESTART_TICKS: u32 = TICK_HZ * 15 / 1000;

/// `AHBCLKCTRL0.WWDT`.
const AHBCLK_WWDT: u32 = 1 << 22;
/// `CLOCK_CTRL.FRO1MHZ_CLK_ENA`.
const FRO1MHZ_CLK_ENA: u32 = 1 << 6;

/// `MOD.WDEN`.
const WDEN: u32 = 1 << 0;
/// `MOD.WDRESET`.
const WDRESET: u32 = 1 << 1;

pub struct Wwdt<'a> {
    wwdt: &'a lpc55_pac::WWDT,
}

impl<'a> Wwdt<'a> {
    /// Gives the watchdog a clock. It stays disabled until [`Watchdog::start`].
    pub fn new(syscon: &lpc55_pac::SYSCON, wwdt: &'a lpc55_pac::WWDT) -> Self {
        syscon
            .clock_ctrl
            .modify(|r, w| unsafe { w.bits(r.bits() | FRO1MHZ_CLK_ENA) });
        syscon
            .ahbclkctrl0
            .modify(|r, w| unsafe { w.bits(r.bits() | AHBCLK_WWDT) });
        // Undivided.
        syscon.wdtclkdiv.write(|w| unsafe { w.bits(0) });

        Self { wwdt }
    }
}

impl Watchdog for Wwdt<'_> {
    fn start(&mut self, period: Period) {
        let ticks = match period {
            Period::Upload => UPLOAD_TICKS,
            Period::Restart => RESTART_TICKS,
        };
        self.wwdt.tc.write(|w| unsafe { w.bits(ticks) });
        // Once set, WDEN and WDRESET can only be cleared by a reset.
        self.wwdt
            .mod_
            .modify(|r, w| unsafe { w.bits(r.bits() | WDEN | WDRESET) });
        // A new TC value only takes effect on the next feed.
        self.feed();
    }

    fn feed(&mut self) {
        // The two feed writes must not be split by another WWDT access, or the
        // watchdog resets on the spot.
        critical_section::with(|_| {
            self.wwdt.feed.write(|w| unsafe { w.bits(0xAA) });
            self.wwdt.feed.write(|w| unsafe { w.bits(0x55) });
        });
    }
}
