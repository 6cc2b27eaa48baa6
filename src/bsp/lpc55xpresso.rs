// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::bsp::Bsp;

// The transceiver sits on a mikroBUS click board: INT is PIO1_5.
const RADIO_IRQ: u8 = 5;

pub struct Board;

impl Bsp for Board {
    const RADIO_IRQ_PIN: u8 = 32 + RADIO_IRQ;

    fn configure(iocon: &lpc55_pac::IOCON, _gpio: &lpc55_pac::GPIO) {
        // The packet line is open drain on the click board.
        iocon.pio1_5.modify(|_, w| {
            w.digimode().set_bit();
            w.mode().pull_up();
            w
        });
    }

    fn indicate_fault(gpio: &lpc55_pac::gpio::RegisterBlock) {
        // The red LED is active low and connected to PIO1_6. We can activate it
        // by flipping the pin direction, exploiting the fact that pins will
        // default to low if not overridden.
        gpio.dir[1].modify(|r, w| unsafe { w.bits(r.bits() | 1 << 6) });
    }

    fn indicate_upload_mode(gpio: &lpc55_pac::GPIO) {
        // The blue LED is on PIO0_31, also active low: same trick.
        gpio.dir[0].modify(|r, w| unsafe { w.bits(r.bits() | 1 << 31) });
    }
}
