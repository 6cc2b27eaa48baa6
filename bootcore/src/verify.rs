//! Reading the written image back and checking it against the header.
//!
//! Two CRC-16s over the same bytes, one read upwards and one downwards. The
//! second pass costs next to nothing and catches corruption that happens to
//! leave the first unchanged.

use crc_catalog::CRC_16_ARC;
use embedded_hal::blocking::delay::DelayUs;
use embedded_storage::nor_flash::NorFlash;
use tinycrc::Crc16;

use crate::engine::erase_page;
use crate::handshake::SessionHeader;
use crate::link::Link;
use crate::radio::Radio;
use crate::supervisor::Watchdog;
use crate::wire::{Status, PACKET_SIZE};
use crate::Abort;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksums {
    pub forward: u16,
    pub reverse: u16,
}

/// Computes both checksums over flash offsets `0..len`. `len` is a multiple
/// of [`PACKET_SIZE`].
pub fn checksums<F: NorFlash>(flash: &mut F, len: usize) -> Result<Checksums, Abort> {
    let mut chunk = [0; PACKET_SIZE];

    let mut forward = Crc16::new(&CRC_16_ARC);
    for start in (0..len).step_by(PACKET_SIZE) {
        flash
            .read(start as u32, &mut chunk)
            .map_err(|_| Abort::Flash)?;
        forward.update(&chunk);
    }

    let mut reverse = Crc16::new(&CRC_16_ARC);
    for start in (0..len).step_by(PACKET_SIZE).rev() {
        flash
            .read(start as u32, &mut chunk)
            .map_err(|_| Abort::Flash)?;
        for &byte in chunk.iter().rev() {
            reverse.push(byte);
        }
    }

    Ok(Checksums {
        forward: forward.finish(),
        reverse: reverse.finish(),
    })
}

/// Ends a session whose image has been written: checks it, reports the
/// verdict, and on failure erases page 0 again so the image can't start.
pub fn conclude<R, D, W, F>(
    link: &mut Link<'_, R, D, W>,
    flash: &mut F,
    header: &SessionHeader,
) -> Result<(), Abort>
where
    R: Radio,
    D: DelayUs<u32>,
    W: Watchdog,
    F: NorFlash,
{
    let expected = Checksums {
        forward: header.crc_forward,
        reverse: header.crc_reverse,
    };

    let verdict = match checksums(flash, usize::from(header.app_size)) {
        Ok(found) if found == expected => Ok(()),
        Ok(found) => {
            warn!(
                "crc mismatch: {=u16:#x}/{=u16:#x}, expected {=u16:#x}/{=u16:#x}",
                found.forward,
                found.reverse,
                expected.forward,
                expected.reverse
            );
            Err(Abort::WrongCrc)
        }
        Err(e) => Err(e),
    };

    match verdict {
        Ok(()) => {
            link.report(Status::Success, 0);
            Ok(())
        }
        Err(abort) => {
            let erased = erase_page(flash, 0);
            if abort == Abort::WrongCrc {
                link.report(Status::WrongCrc, 0);
            }
            erased?;
            Err(abort)
        }
    }
}
