// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Internal flash, through the LPC55 flash controller.
//!
//! Reading an erased page of LPC55 flash faults. Every read here blank-checks
//! the pages it touches first and returns `0xff` for erased ones, which is
//! what the rest of the bootloader expects erased flash to look like.

use core::sync::atomic::{compiler_fence, Ordering};

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::PAGE_SIZE;

/// Flash controller commands (UM11126 section 5.7).
mod cmd {
    pub const ERASE_RANGE: u32 = 4;
    pub const BLANK_CHECK: u32 = 5;
    pub const WRITE: u32 = 8;
    pub const PROGRAM: u32 = 12;
}

/// The controller's flash word: 128 bits.
const WORD: u32 = 16;

/// `DATAW0`..`DATAW3`, the staging registers for `cmd::WRITE`.
const DATAW: u32 = 0x4003_4000 + 0x80;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FlashError {
    NotAligned,
    OutOfBounds,
    /// The controller reported a failed erase or program.
    Failed,
}

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::NotAligned => NorFlashErrorKind::NotAligned,
            Self::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Self::Failed => NorFlashErrorKind::Other,
        }
    }
}

/// A window of internal flash starting at `base`, addressed from 0.
pub struct Lpc55Flash<'a> {
    flash: &'a lpc55_pac::FLASH,
    base: u32,
    size: u32,
}

impl<'a> Lpc55Flash<'a> {
    pub fn new(flash: &'a lpc55_pac::FLASH, base: u32, size: u32) -> Self {
        Self { flash, base, size }
    }

    fn check(&self, offset: u32, len: usize, align: usize) -> Result<u32, FlashError> {
        if offset as usize % align != 0 || len % align != 0 {
            return Err(FlashError::NotAligned);
        }
        match offset.checked_add(len as u32) {
            Some(end) if end <= self.size => Ok(self.base + offset),
            _ => Err(FlashError::OutOfBounds),
        }
    }

    /// Runs a controller command over the inclusive word range `start..=stop`
    /// and reports whether it came back with FAIL set.
    fn run(&self, command: u32, start: u32, stop: u32) -> bool {
        let flash = self.flash;
        flash.int_clr_status.write(|w| unsafe { w.bits(0xF) });
        flash.starta.write(|w| unsafe { w.starta().bits(start) });
        flash.stopa.write(|w| unsafe { w.stopa().bits(stop) });
        flash.cmd.write(|w| unsafe { w.cmd().bits(command) });

        while !flash.int_status.read().done().bit() {
            // spin.
        }

        flash.int_status.read().fail().bit()
    }

    /// Checks if the page starting at `address` has been programmed since it
    /// was last erased. Since STOPA is inclusive, one word is enough: pages are
    /// erased and programmed as a whole.
    fn is_programmed(&self, address: u32) -> bool {
        let word = word_number(address);
        // Counter-intuitively, FAIL here means the page is _not_ blank.
        self.run(cmd::BLANK_CHECK, word, word)
    }
}

/// Flash word number of `address`, counted from the base of flash.
fn word_number(address: u32) -> u32 {
    (address / WORD) & ((1 << 18) - 1)
}

impl ErrorType for Lpc55Flash<'_> {
    type Error = FlashError;
}

impl ReadNorFlash for Lpc55Flash<'_> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let mut address = self.check(offset, bytes.len(), Self::READ_SIZE)?;

        let mut rest = bytes;
        while !rest.is_empty() {
            let page = address & !(PAGE_SIZE as u32 - 1);
            let n = rest.len().min((page + PAGE_SIZE as u32 - address) as usize);
            let (chunk, tail) = rest.split_at_mut(n);

            if self.is_programmed(page) {
                // Do not permit the compiler to hoist the reads above the
                // blank check.
                compiler_fence(Ordering::SeqCst);
                for (i, byte) in chunk.iter_mut().enumerate() {
                    // Safety: the range was bounds checked against our window
                    // of flash, and the page is programmed, so reading it
                    // won't fault.
                    *byte = unsafe {
                        core::ptr::read_volatile((address as usize + i) as *const u8)
                    };
                }
            } else {
                chunk.fill(0xff);
            }

            address += n as u32;
            rest = tail;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.size as usize
    }
}

impl NorFlash for Lpc55Flash<'_> {
    const WRITE_SIZE: usize = PAGE_SIZE;
    const ERASE_SIZE: usize = PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(FlashError::OutOfBounds);
        }
        let start = self.check(from, (to - from) as usize, Self::ERASE_SIZE)?;
        if to == from {
            return Ok(());
        }
        let stop = start + (to - from) - 1;

        if self.run(cmd::ERASE_RANGE, word_number(start), word_number(stop)) {
            return Err(FlashError::Failed);
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = self.check(offset, bytes.len(), Self::WRITE_SIZE)?;

        for (n, page) in bytes.chunks_exact(PAGE_SIZE).enumerate() {
            let page_address = start + (n * PAGE_SIZE) as u32;

            // Stage the page one flash word at a time...
            for (i, word) in page.chunks_exact(WORD as usize).enumerate() {
                for (j, quad) in word.chunks_exact(4).enumerate() {
                    let value = u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]);
                    // Safety: DATAW0..3 are plain data registers of the flash
                    // controller, which nothing else is driving right now.
                    unsafe {
                        core::ptr::write_volatile((DATAW + 4 * j as u32) as *mut u32, value);
                    }
                }
                let word = word_number(page_address) + i as u32;
                if self.run(cmd::WRITE, word, word) {
                    return Err(FlashError::Failed);
                }
            }

            // ...and then burn it.
            let first = word_number(page_address);
            if self.run(cmd::PROGRAM, first, first) {
                return Err(FlashError::Failed);
            }
        }
        Ok(())
    }
}
