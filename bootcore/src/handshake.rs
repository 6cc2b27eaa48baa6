//! Opening an upload session.
//!
//! The uploader speaks first, with a bare start signature. We answer with the
//! session IV in the clear and expect the encrypted start header next. The
//! header is the first packet of the session's cipher chain, so the channel
//! that decrypts it is the one that goes on to decrypt the image.

use embedded_hal::blocking::delay::DelayUs;

use crate::channel::{BlockCipher, SecureChannel};
use crate::iv::IvSource;
use crate::link::Link;
use crate::poll::{HEADER_REQUEST_WAIT, HEADER_WAIT};
use crate::radio::Radio;
use crate::supervisor::Watchdog;
use crate::wire::{self, StartHeader, Status, HEADER_REQUEST_LEN, PACKET_SIZE};
use crate::{Abort, Stage};

/// Argument sent along with a rejected header.
const REJECTED: u16 = 0xffff;

/// The validated contents of a start header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionHeader {
    pub app_size: u16,
    pub crc_forward: u16,
    pub crc_reverse: u16,
    pub round: u16,
}

/// Whether an image of `app_size` bytes can be accepted into an application
/// region of `capacity` bytes.
pub fn size_is_valid(app_size: u16, capacity: usize) -> bool {
    app_size != 0 && usize::from(app_size) % PACKET_SIZE == 0 && usize::from(app_size) <= capacity
}

/// Runs the handshake and returns the channel for the rest of the session
/// along with the header it carried.
///
/// Rejected headers are reported to the uploader before returning the
/// error. A foreign request or a timeout is not.
pub fn open<R, D, W, I, C>(
    link: &mut Link<'_, R, D, W>,
    iv_source: &mut I,
    cipher: C,
    capacity: usize,
) -> Result<(SecureChannel<C>, SessionHeader), Abort>
where
    R: Radio,
    D: DelayUs<u32>,
    W: Watchdog,
    I: IvSource,
    C: BlockCipher,
{
    link.await_packet(
        &HEADER_REQUEST_WAIT,
        HEADER_REQUEST_LEN,
        Stage::HeaderRequest,
        None,
    )?;
    if !wire::is_header_request(link.packet()) {
        return Err(Abort::ForeignRequest);
    }

    let iv = iv_source.derive(&cipher);
    link.send(&iv.0);

    link.await_packet(&HEADER_WAIT, PACKET_SIZE, Stage::Header, None)?;
    link.supervisor().keepalive();

    let mut channel = SecureChannel::new(cipher, iv);
    channel.decrypt(link.packet_mut());
    let header = StartHeader::read(link.packet());

    if !header.is_signed() {
        link.report(Status::NoSignature, REJECTED);
        return Err(Abort::NoSignature);
    }

    let app_size = header.app_size.get();
    if !size_is_valid(app_size, capacity) {
        link.report(Status::InvalidSize, REJECTED);
        return Err(Abort::InvalidSize(app_size));
    }

    Ok((
        channel,
        SessionHeader {
            app_size,
            crc_forward: header.crc_forward.get(),
            crc_reverse: header.crc_reverse.get(),
            round: header.round.get(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handoff::Handoff;
    use crate::iv::SessionIv;
    use crate::sim::{SimClock, SimRadio, SimWatchdog, Uploader, WatchdogEvent, KEY};
    use crate::supervisor::Supervisor;
    use crate::xtea::Xtea;

    struct FixedIv;

    impl IvSource for FixedIv {
        fn derive<C: BlockCipher>(&mut self, _cipher: &C) -> SessionIv {
            SessionIv(*b"fixed iv")
        }

        fn commit(&mut self) -> Result<(), Abort> {
            Ok(())
        }
    }

    fn handshake(radio: &mut SimRadio, capacity: usize) -> Result<SessionHeader, Abort> {
        handshake_fed(radio, capacity).0
    }

    /// Also counts how often the watchdog was fed.
    fn handshake_fed(radio: &mut SimRadio, capacity: usize) -> (Result<SessionHeader, Abort>, usize) {
        let mut handoff = Handoff::default();
        let mut watchdog = SimWatchdog::default();
        let supervisor = Supervisor::new(&mut watchdog, &mut handoff);
        let mut link = Link::new(radio, SimClock::default(), supervisor);
        let result =
            open(&mut link, &mut FixedIv, Xtea::new(&KEY), capacity).map(|(_, header)| header);
        drop(link);

        let feeds = watchdog
            .events
            .iter()
            .filter(|&&e| e == WatchdogEvent::Feed)
            .count();
        (result, feeds)
    }

    #[test]
    fn accepts_a_good_header() {
        let image = [0x42; 96];
        let mut radio = SimRadio::new(Uploader::new(&KEY, &image));
        let header = handshake(&mut radio, 1024).unwrap();

        assert_eq!(header.app_size, 96);
        assert_eq!(header.round, radio.uploader.header.round.get());
        assert_eq!(radio.ivs, [*b"fixed iv"]);
        assert!(radio.statuses.is_empty());
    }

    #[test]
    fn size_rules() {
        assert!(size_is_valid(32, 32));
        assert!(size_is_valid(0xffe0, 0x9_0000));
        assert!(!size_is_valid(0, 1024));
        assert!(!size_is_valid(33, 1024));
        assert!(!size_is_valid(1056, 1024));
    }

    #[test]
    fn rejects_bad_sizes_before_writing_anything() {
        for size in [0, 33, 2048] {
            let mut uploader = Uploader::new(&KEY, &[0; 64]);
            uploader.header.app_size.set(size);
            let mut radio = SimRadio::new(uploader);

            assert_eq!(handshake(&mut radio, 1024), Err(Abort::InvalidSize(size)));
            assert_eq!(radio.statuses, [(Status::InvalidSize, 0xffff)]);
            assert!(radio.requests.is_empty());
        }
    }

    #[test]
    fn wrong_key_has_no_signature() {
        let mut radio = SimRadio::new(Uploader::new(b"not the real key", &[0; 64]));
        assert_eq!(handshake(&mut radio, 1024), Err(Abort::NoSignature));
        assert_eq!(radio.statuses, [(Status::NoSignature, 0xffff)]);
    }

    #[test]
    fn foreign_request_is_silent() {
        let mut uploader = Uploader::new(&KEY, &[0; 64]);
        uploader.request = *b"ping";
        let mut radio = SimRadio::new(uploader);

        assert_eq!(handshake(&mut radio, 1024), Err(Abort::ForeignRequest));
        assert!(radio.sent.is_empty());
    }

    #[test]
    fn noise_before_the_request_is_ignored() {
        let mut radio = SimRadio::new(Uploader::new(&KEY, &[7; 64]));
        radio.inject_noise(5);
        let (result, feeds) = handshake_fed(&mut radio, 1024);
        assert!(result.is_ok());
        // Only the accepted header feeds; the noise doesn't.
        assert_eq!(feeds, 1);
    }

    #[test]
    fn noise_before_the_header_feeds_the_watchdog() {
        let mut uploader = Uploader::new(&KEY, &[7; 64]);
        uploader.header_noise = 4;
        let mut radio = SimRadio::new(uploader);
        let (result, feeds) = handshake_fed(&mut radio, 1024);
        assert!(result.is_ok());
        assert_eq!(feeds, 4 + 1);
    }

    #[test]
    fn header_never_arrives() {
        let clock = SimClock::default();
        let mut handoff = Handoff::default();
        let mut watchdog = SimWatchdog::default();
        let mut uploader = Uploader::new(&KEY, &[7; 64]);
        uploader.header_lost = true;
        let mut radio = SimRadio::new(uploader);
        let supervisor = Supervisor::new(&mut watchdog, &mut handoff);
        let mut link = Link::new(&mut radio, clock.clone(), supervisor);

        let result = open(&mut link, &mut FixedIv, Xtea::new(&KEY), 1024).map(|_| ());
        drop(link);

        assert_eq!(result, Err(Abort::Timeout(Stage::Header)));
        assert_eq!(radio.ivs, [*b"fixed iv"]);
        assert!(radio.statuses.is_empty());
        // The request is there on the first poll; then 250 polls, 1 ms apart.
        assert_eq!(clock.elapsed_us(), 249_000);
        assert!(!watchdog.events.contains(&WatchdogEvent::Feed));
    }

    #[test]
    fn nobody_there() {
        let clock = SimClock::default();
        let mut handoff = Handoff::default();
        let mut watchdog = SimWatchdog::default();
        let mut radio = SimRadio::silent();
        let supervisor = Supervisor::new(&mut watchdog, &mut handoff);
        let mut link = Link::new(&mut radio, clock.clone(), supervisor);

        let result = open(&mut link, &mut FixedIv, Xtea::new(&KEY), 1024).map(|_| ());
        assert_eq!(result, Err(Abort::Timeout(Stage::HeaderRequest)));
        // 250 polls, 1 ms apart.
        assert_eq!(clock.elapsed_us(), 249_000);
    }
}
