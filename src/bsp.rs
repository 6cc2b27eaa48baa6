// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types and hooks for implementing Board Support Packages (BSPs).
//!
//! What the bootloader needs from a board is small: where the transceiver's
//! packet line is wired, and up to two indicator outputs. The exact
//! properties are in the `Bsp` trait below.
//!
//! To implement a BSP:
//!
//! 1. Create a module within `radioboot::bsp` named after your board.
//! 2. Define a type in the module called `Board`. This type will never be
//!    instantiated, so it can be arbitrary; an empty enum is easy.
//! 3. Implement `radioboot::bsp::Bsp` for your `Board` type.
//! 4. Add a `target-board-*` feature to `Cargo.toml`.
//! 5. Add a branch to the `cfg_if` in `src/bin/radioboot.rs` to detect your
//!    board and select the right `Board` type.

// Every BSP is compiled regardless of the selected board, so that they all
// keep building.
pub mod lpc55xpresso;
pub mod rot_carrier;

/// Requirements placed upon a BSP type.
pub trait Bsp {
    /// The GPIO carrying the transceiver's packet line, numbered the way
    /// `INPUTMUX.PINTSEL` numbers pins: `PIO0_n` is `n`, `PIO1_n` is `32 + n`.
    const RADIO_IRQ_PIN: u8;

    /// Set up any I/Os needed for the board. Runs before the boot decision.
    fn configure(iocon: &lpc55_pac::IOCON, gpio: &lpc55_pac::GPIO);

    /// Indicate a fault. No information is provided as to _what_ failure,
    /// because generally speaking we only have one bit of output.
    fn indicate_fault(gpio: &lpc55_pac::gpio::RegisterBlock);

    /// Indicate that the bootloader is waiting for an upload.
    ///
    /// Only useful on boards with a spare LED, so stubbed out by default.
    fn indicate_upload_mode(_gpio: &lpc55_pac::GPIO) {}
}
