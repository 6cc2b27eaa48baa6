//! Writing the image to flash, top page first.
//!
//! The page at offset 0 is erased before anything else and written last. Until
//! that final write it reads as erased, and the arbiter will not start an
//! application with an erased first word, so a session that stops at any
//! point before the end leaves a device that waits for the next upload.
//!
//! Every other page is erased right before it is filled and is never touched
//! again in the same session.

use embedded_hal::blocking::delay::DelayUs;
use embedded_storage::nor_flash::NorFlash;

use crate::arbiter::ERASED;
use crate::channel::{BlockCipher, SecureChannel};
use crate::link::Link;
use crate::poll::DATA_WAIT;
use crate::radio::Radio;
use crate::supervisor::Watchdog;
use crate::wire::PACKET_SIZE;
use crate::{Abort, Stage};

/// Erases the page of `flash` starting at `base`, with interrupts held off.
pub fn erase_page<F: NorFlash>(flash: &mut F, base: u32) -> Result<(), Abort> {
    critical_section::with(|_| flash.erase(base, base + F::ERASE_SIZE as u32))
        .map_err(|_| Abort::Flash)
}

/// Streams an image into flash in descending page order. `PAGE` is the
/// flash's erase size.
pub struct Engine<'f, F, const PAGE: usize> {
    flash: &'f mut F,
    page: [u8; PAGE],
}

impl<'f, F: NorFlash, const PAGE: usize> Engine<'f, F, PAGE> {
    const GEOMETRY_OK: () = assert!(
        PAGE == F::ERASE_SIZE && PAGE % PACKET_SIZE == 0 && PAGE % F::WRITE_SIZE == 0
    );

    pub fn new(flash: &'f mut F) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::GEOMETRY_OK;
        Self {
            flash,
            page: [ERASED; PAGE],
        }
    }

    /// Receives `app_size` bytes through `channel` and writes them to flash
    /// offsets `0..app_size`. `app_size` must have passed the handshake's size
    /// check.
    pub fn program<R, D, W, C>(
        &mut self,
        link: &mut Link<'_, R, D, W>,
        channel: &mut SecureChannel<C>,
        app_size: u16,
    ) -> Result<(), Abort>
    where
        R: Radio,
        D: DelayUs<u32>,
        W: Watchdog,
        C: BlockCipher,
    {
        // Exclusive upper end of what is still missing.
        let mut low = usize::from(app_size);

        link.request(app_size);
        erase_page(&mut *self.flash, 0)?;

        while low > 0 {
            link.supervisor().keepalive();

            let base = (low - 1) / PAGE * PAGE;
            if base > 0 {
                erase_page(&mut *self.flash, base as u32)?;
            }
            self.page.fill(ERASED);

            while low > base {
                let offset = low as u16;
                link.await_packet(
                    &DATA_WAIT,
                    PACKET_SIZE,
                    Stage::Data { offset },
                    Some(offset),
                )?;

                // Get the next request in flight before doing any work on
                // this packet.
                let next = low - PACKET_SIZE;
                if next > 0 {
                    link.request(next as u16);
                }

                channel.decrypt(link.packet_mut());
                let at = next - base;
                self.page[at..at + PACKET_SIZE].copy_from_slice(link.packet());
                low = next;
            }

            self.commit(base)?;
        }
        Ok(())
    }

    fn commit(&mut self, base: usize) -> Result<(), Abort> {
        let page = &self.page;
        let flash = &mut *self.flash;
        critical_section::with(|_| flash.write(base as u32, page)).map_err(|_| Abort::Flash)?;
        debug!("wrote page {=usize:#x}", base);
        Ok(())
    }
}
