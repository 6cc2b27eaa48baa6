//! The over-the-air contract with the uploader.
//!
//! Every transmission is a single transceiver packet of at most
//! [`PACKET_SIZE`] bytes. There are five shapes:
//!
//! - The *header request*: 4 bytes, the start signature in little-endian.
//!   Sent by the uploader to open a session.
//! - The *IV*: 8 raw bytes, sent in the clear by us in reply.
//! - The *start header*: 32 encrypted bytes, a [`StartHeader`] followed by
//!   padding.
//! - *Control* packets: 3 bytes, a [`Status`] and a little-endian argument.
//!   Sent by us only.
//! - *Data* packets: 32 encrypted bytes of image, 4 cipher blocks.

use core::mem::size_of;

#[cfg(test)]
use num_derive::FromPrimitive;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

/// Size of a data packet, and the largest packet we ever look at.
pub const PACKET_SIZE: usize = 32;

/// Size of one block of the session cipher.
pub const CIPHER_BLOCK_SIZE: usize = 8;

/// Size of the packet that opens a session.
pub const HEADER_REQUEST_LEN: usize = 4;

/// Size of a control packet.
pub const CONTROL_LEN: usize = 3;

/// Magic number that both opens a session and is repeated twice inside the
/// start header. Both ends have to agree on it, so it can't change.
pub const START_SIGNATURE: u32 = 0xd20f_6cdf;

pub type Packet = [u8; PACKET_SIZE];

const_assert_eq!(PACKET_SIZE % CIPHER_BLOCK_SIZE, 0);

/// Status codes sent back to the uploader in control packets.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(test, derive(FromPrimitive))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    NoSignature = 1,
    InvalidSize = 2,
    SendPacketRequest = 4,
    WrongCrc = 5,
    Success = 6,
}

/// Encodes a control packet. The remaining bytes of the transceiver packet
/// are not transmitted.
pub fn control(status: Status, argument: u16) -> [u8; CONTROL_LEN] {
    let [lo, hi] = argument.to_le_bytes();
    [status as u8, lo, hi]
}

/// Decodes a control packet, as the uploader does.
#[cfg(test)]
pub(crate) fn parse_control(bytes: &[u8]) -> Option<(Status, u16)> {
    match *bytes {
        [code, lo, hi] => {
            let status = num_traits::FromPrimitive::from_u8(code)?;
            Some((status, u16::from_le_bytes([lo, hi])))
        }
        _ => None,
    }
}

/// Checks that a received header request carries the start signature.
pub fn is_header_request(packet: &[u8]) -> bool {
    packet
        .get(..HEADER_REQUEST_LEN)
        .map_or(false, |sig| sig == START_SIGNATURE.to_le_bytes())
}

/// The session start header, as found at the front of the first encrypted
/// packet.
///
/// The signature appears at both ends so that a single coincidental match in
/// a packet of noise (or one decrypted with the wrong key) is not mistaken for
/// a header. The 16 bytes after this struct are ignored and are not required
/// to be zero.
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, Unaligned)]
#[repr(C)]
pub struct StartHeader {
    pub signature_a: U32<LittleEndian>,
    /// Image size in bytes.
    pub app_size: U16<LittleEndian>,
    /// CRC-16 of the image, read from the lowest address up.
    pub crc_forward: U16<LittleEndian>,
    /// CRC-16 of the image, read from the highest address down.
    pub crc_reverse: U16<LittleEndian>,
    /// Uploader's session counter. Informational only.
    pub round: U16<LittleEndian>,
    pub signature_b: U32<LittleEndian>,
}

const_assert_eq!(size_of::<StartHeader>(), 16);

impl StartHeader {
    /// Puns the front of a (decrypted) packet as a header.
    pub fn read(packet: &Packet) -> Self {
        // The packet is larger than the header and the header is unaligned,
        // so this always succeeds. An all-zero header would fail the
        // signature check anyway.
        Self::read_from_prefix(&packet[..]).unwrap_or_else(Self::new_zeroed)
    }

    /// Both signature fields hold the start signature.
    pub fn is_signed(&self) -> bool {
        self.signature_a.get() == START_SIGNATURE && self.signature_b.get() == START_SIGNATURE
    }
}
