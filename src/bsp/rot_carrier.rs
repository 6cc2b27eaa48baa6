// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::bsp::Bsp;

// Carrier board with the transceiver on the PMOD headers
//
// J5 (AUX) - PMOD 4x LED board
// - Pin 3: PIO0_4 - fault indicator
// - Pin 5: PIO0_22 - upload mode
//
// J6 (SPI) - transceiver
// - Pin 6: FC3_CTX_SDAX_SSEL0 => PIO0_20 => packet line

pub struct Board;

impl Bsp for Board {
    const RADIO_IRQ_PIN: u8 = 20;

    fn configure(iocon: &lpc55_pac::IOCON, _gpio: &lpc55_pac::GPIO) {
        iocon.pio0_20.modify(|_, w| {
            w.digimode().set_bit();
            w.mode().pull_up();
            w
        });
    }

    fn indicate_fault(gpio: &lpc55_pac::gpio::RegisterBlock) {
        // Switch fault pin to output and drive it high.
        gpio.dirset[0].write(|w| unsafe { w.bits(1 << 4) });
        gpio.set[0].write(|w| unsafe { w.bits(1 << 4) });
    }

    fn indicate_upload_mode(gpio: &lpc55_pac::GPIO) {
        gpio.dirset[0].write(|w| unsafe { w.bits(1 << 22) });
        gpio.set[0].write(|w| unsafe { w.bits(1 << 22) });
    }
}
