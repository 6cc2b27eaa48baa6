//! One upload session, start to finish.

use embedded_hal::blocking::delay::DelayUs;
use embedded_storage::nor_flash::NorFlash;

use crate::channel::BlockCipher;
use crate::engine::Engine;
use crate::handshake::{self, SessionHeader};
use crate::iv::IvSource;
use crate::link::Link;
use crate::radio::Radio;
use crate::supervisor::Watchdog;
use crate::{verify, Abort};

/// Runs the handshake, writes the image and checks it. Returns the accepted
/// header once the uploader has been told the upload succeeded.
///
/// `flash` is the application region; its capacity bounds the image size.
pub fn attempt<R, D, W, F, C, I, const PAGE: usize>(
    link: &mut Link<'_, R, D, W>,
    flash: &mut F,
    cipher: C,
    iv_source: &mut I,
) -> Result<SessionHeader, Abort>
where
    R: Radio,
    D: DelayUs<u32>,
    W: Watchdog,
    F: NorFlash,
    C: BlockCipher,
    I: IvSource,
{
    let (mut channel, header) = handshake::open(link, iv_source, cipher, flash.capacity())?;
    info!(
        "receiving {=u16} bytes, round {=u16}",
        header.app_size,
        header.round
    );

    iv_source.commit()?;
    Engine::<F, PAGE>::new(flash).program(link, &mut channel, header.app_size)?;
    verify::conclude(link, flash, &header)?;
    Ok(header)
}

/// Upload mode. Whatever happens, ends in a watchdog reset.
pub fn run<R, D, W, F, C, I, const PAGE: usize>(
    mut link: Link<'_, R, D, W>,
    flash: &mut F,
    cipher: C,
    iv_source: &mut I,
) -> !
where
    R: Radio,
    D: DelayUs<u32>,
    W: Watchdog,
    F: NorFlash,
    C: BlockCipher,
    I: IvSource,
{
    match attempt::<R, D, W, F, C, I, PAGE>(&mut link, flash, cipher, iv_source) {
        Ok(header) => info!("image of {=u16} bytes installed", header.app_size),
        Err(abort) => warn!("session ended: {}", abort),
    }
    link.supervisor().abort_and_restart()
}
