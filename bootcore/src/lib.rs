//! Board-independent core of the radioboot wireless bootloader.
//!
//! Everything that decides *what* happens during a boot or an upload session
//! lives here; the firmware crate only supplies the hardware behind the traits
//! in [`radio`], [`supervisor`], [`iv`] and `embedded-storage`'s `NorFlash`.
//!
//! The order of events on every boot is:
//!
//! 1. [`arbiter`] decides between starting the installed application and
//!    entering upload mode.
//! 2. In upload mode, [`session::run`] performs the [`handshake`], streams the
//!    image through the [`channel`] into the [`engine`], checks it with
//!    [`verify`], and then restarts through the [`supervisor`]. Always.
//!
//! The application is only ever started by step 1 on the boot that follows a
//! successful session.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod arbiter;
pub mod channel;
pub mod engine;
pub mod handoff;
pub mod handshake;
pub mod iv;
pub mod link;
pub mod poll;
pub mod radio;
pub mod session;
pub mod supervisor;
pub mod verify;
pub mod wire;
pub mod xtea;

#[cfg(test)]
mod sim;

/// Which wait of the session ran out of budget.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// Waiting for the uploader to open a session.
    HeaderRequest,
    /// Waiting for the encrypted start header after sending the IV.
    Header,
    /// Waiting for the data packet that ends at `offset`.
    Data { offset: u16 },
}

/// Reasons an upload session ends without installing an image.
///
/// Every one of these ends in a watchdog restart; the variants only differ in
/// what, if anything, is reported to the uploader first.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Abort {
    /// No acceptable packet within the budget. Nothing is reported.
    Timeout(Stage),
    /// Something opened a session without the start signature. Treated as
    /// noise; nothing is reported.
    ForeignRequest,
    /// The decrypted header did not carry the signature twice.
    NoSignature,
    /// The declared image size is zero, unaligned, or too large.
    InvalidSize(u16),
    /// The flash driver refused an erase, program or read.
    Flash,
    /// The image read back from flash does not match the declared checksums.
    WrongCrc,
}
