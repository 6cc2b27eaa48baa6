//! The transceiver, driven by an external C driver.
//!
//! The driver owns the SPI side of the chip. Its packet line (packet received
//! in receive mode, packet sent in transmit mode) is wired to a GPIO that we
//! route to `PIN_INT0`; the interrupt handler only raises [`PACKET_SIGNAL`].

use core::sync::atomic::{AtomicBool, Ordering};

use bootcore::radio::{Radio, Reception};
use bootcore::wire::{Packet, PACKET_SIZE};

mod ffi {
    extern "C" {
        /// Configures the transceiver and leaves it in receive mode.
        pub fn rf_init(channel: u8, syncword: *const u8);
        /// Starts transmitting `len` bytes. The packet line fires when done,
        /// after which the driver is back in receive mode.
        pub fn rf_send(data: *const u8, len: u8);
        /// Copies the last received packet, at most `cap` bytes, and returns
        /// its length. `crc_ok` reports the transceiver's own CRC check.
        pub fn rf_receive(data: *mut u8, cap: u8, crc_ok: *mut bool) -> u8;
    }
}

/// Raised by the packet line interrupt, consumed by [`Lpc55Radio`].
static PACKET_SIGNAL: AtomicBool = AtomicBool::new(false);

/// `AHBCLKCTRL0.MUX`.
const AHBCLK_MUX: u32 = 1 << 11;
/// `AHBCLKCTRL0.PINT`.
const AHBCLK_PINT: u32 = 1 << 18;

/// Pin interrupt channel used for the packet line.
const CHANNEL: u32 = 1 << 0;

/// Body of the `PIN_INT0` handler.
pub fn on_packet_signal() {
    // Safety: IST is write-one-to-clear, and outside this handler it is only
    // written before the interrupt is unmasked.
    let pint = unsafe { &*lpc55_pac::PINT::ptr() };
    pint.ist.write(|w| unsafe { w.bits(CHANNEL) });
    PACKET_SIGNAL.store(true, Ordering::Release);
}

pub struct Lpc55Radio {
    _private: (),
}

impl Lpc55Radio {
    /// Routes `pin` (as numbered by `INPUTMUX`, `PIO1_n` = 32 + n) to
    /// `PIN_INT0` on its falling edge, then initializes the transceiver.
    pub fn new(
        syscon: &lpc55_pac::SYSCON,
        inputmux: &lpc55_pac::INPUTMUX,
        pint: &lpc55_pac::PINT,
        pin: u8,
        channel: u8,
        syncword: &[u8; 2],
    ) -> Self {
        syscon
            .ahbclkctrl0
            .modify(|r, w| unsafe { w.bits(r.bits() | AHBCLK_MUX | AHBCLK_PINT) });
        inputmux.pintsel[0].write(|w| unsafe { w.bits(u32::from(pin)) });

        // Edge sensitive, falling edge only.
        pint.isel.modify(|r, w| unsafe { w.bits(r.bits() & !CHANNEL) });
        pint.sienf.write(|w| unsafe { w.bits(CHANNEL) });
        pint.ist.write(|w| unsafe { w.bits(CHANNEL) });

        // Safety: the syncword outlives the call, which copies it.
        unsafe {
            ffi::rf_init(channel, syncword.as_ptr());
        }

        PACKET_SIGNAL.store(false, Ordering::Release);
        // Safety: the handler only touches PINT and the flag.
        unsafe {
            cortex_m::peripheral::NVIC::unmask(lpc55_pac::Interrupt::PIN_INT0);
        }

        Self { _private: () }
    }
}

impl Radio for Lpc55Radio {
    fn receive(&mut self, packet: &mut Packet) -> Option<Reception> {
        if !PACKET_SIGNAL.swap(false, Ordering::Acquire) {
            return None;
        }

        let mut intact = false;
        // Safety: the driver writes at most `cap` bytes into the buffer.
        let len = unsafe { ffi::rf_receive(packet.as_mut_ptr(), PACKET_SIZE as u8, &mut intact) };
        Some(Reception {
            len: usize::from(len),
            intact,
        })
    }

    fn send(&mut self, payload: &[u8]) {
        let len = payload.len().min(PACKET_SIZE) as u8;

        PACKET_SIGNAL.store(false, Ordering::Release);
        // Safety: the driver copies `len` bytes into its FIFO before
        // returning.
        unsafe {
            ffi::rf_send(payload.as_ptr(), len);
        }
        while !PACKET_SIGNAL.swap(false, Ordering::Acquire) {
            core::hint::spin_loop();
        }
    }
}
