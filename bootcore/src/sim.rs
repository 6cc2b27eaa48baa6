//! Host-side stand-ins for the hardware and for the uploader on the other end
//! of the link.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crc::Crc;
use crc_catalog::CRC_16_ARC;
use embedded_hal::blocking::delay::DelayUs;
use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use zerocopy::byteorder::{U16, U32};
use zerocopy::AsBytes;

use crate::channel::BlockCipher;
use crate::handoff::ResetCause;
use crate::iv::SessionIv;
use crate::radio::{Radio, Reception};
use crate::supervisor::{Period, Watchdog};
use crate::wire::{
    self, Packet, StartHeader, Status, CIPHER_BLOCK_SIZE, CONTROL_LEN, PACKET_SIZE,
    START_SIGNATURE,
};
use crate::xtea::Xtea;

/// Erase size of [`SimFlash`]. Small, so that short images span pages.
pub const PAGE: usize = 128;

pub const KEY: [u8; 16] = *b"sixteen byte key";

/// A test image of `len` bytes that doesn't start with the erase pattern and
/// has no repeating 32-byte packets.
pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251 + 1) as u8).collect()
}

/// CBC encryption, as done by the uploader.
pub fn encrypt(cipher: &Xtea, chain: &mut [u8; CIPHER_BLOCK_SIZE], packet: &mut Packet) {
    for chunk in packet.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
        let mut block = [0; CIPHER_BLOCK_SIZE];
        for ((b, p), c) in block.iter_mut().zip(chunk.iter()).zip(chain.iter()) {
            *b = p ^ c;
        }
        cipher.encipher(&mut block);
        chunk.copy_from_slice(&block);
        *chain = block;
    }
}

/// Microseconds of simulated delay. Clones share the count.
#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn elapsed_us(&self) -> u64 {
        self.0.get()
    }
}

impl DelayUs<u32> for SimClock {
    fn delay_us(&mut self, us: u32) {
        self.0.set(self.0.get() + u64::from(us));
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Op {
    Erase { from: u32, to: u32 },
    Write { offset: u32, len: usize },
}

struct FlashState {
    mem: Vec<u8>,
    ops: Vec<Op>,
    writes_left: Option<usize>,
    reads_fail: bool,
}

/// NOR flash: erases set bytes to `0xff`, writes can only clear bits. Clones
/// share the same memory.
#[derive(Clone)]
pub struct SimFlash(Rc<RefCell<FlashState>>);

impl SimFlash {
    pub fn new(capacity: usize) -> Self {
        Self(Rc::new(RefCell::new(FlashState {
            mem: vec![0xff; capacity],
            ops: Vec::new(),
            writes_left: None,
            reads_fail: false,
        })))
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().mem.clone()
    }

    /// Erases and writes since creation, in order.
    pub fn ops(&self) -> Vec<Op> {
        self.0.borrow().ops.clone()
    }

    /// Lets `n` more writes succeed, then fails every write.
    pub fn fail_writes_after(&mut self, n: usize) {
        self.0.borrow_mut().writes_left = Some(n);
    }

    pub fn fail_reads(&mut self) {
        self.0.borrow_mut().reads_fail = true;
    }

    fn check(&self, offset: u32, len: usize, align: usize) -> Result<usize, NorFlashErrorKind> {
        let offset = offset as usize;
        if offset % align != 0 || len % align != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if offset + len > self.0.borrow().mem.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(offset)
    }
}

impl ErrorType for SimFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for SimFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = self.check(offset, bytes.len(), Self::READ_SIZE)?;
        let state = self.0.borrow();
        if state.reads_fail {
            return Err(NorFlashErrorKind::Other);
        }
        bytes.copy_from_slice(&state.mem[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.0.borrow().mem.len()
    }
}

impl NorFlash for SimFlash {
    const WRITE_SIZE: usize = 2;
    const ERASE_SIZE: usize = PAGE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let start = self.check(from, 0, Self::ERASE_SIZE)?;
        let end = self.check(to, 0, Self::ERASE_SIZE)?;
        let mut state = self.0.borrow_mut();
        state.mem[start..end].fill(0xff);
        state.ops.push(Op::Erase { from, to });
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = self.check(offset, bytes.len(), Self::WRITE_SIZE)?;
        let mut state = self.0.borrow_mut();
        match state.writes_left {
            Some(0) => return Err(NorFlashErrorKind::Other),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        for (cell, byte) in state.mem[start..].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        state.ops.push(Op::Write {
            offset,
            len: bytes.len(),
        });
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WatchdogEvent {
    Start(Period),
    Feed,
}

#[derive(Default)]
pub struct SimWatchdog {
    pub events: Vec<WatchdogEvent>,
}

impl Watchdog for SimWatchdog {
    fn start(&mut self, period: Period) {
        self.events.push(WatchdogEvent::Start(period));
    }

    fn feed(&mut self) {
        self.events.push(WatchdogEvent::Feed);
    }
}

/// A reset cause register. Bits latch until cleared.
#[derive(Default)]
pub struct SimResetCause {
    bits: u32,
}

impl SimResetCause {
    /// The chip resets for `cause`.
    pub fn latch(&mut self, cause: u32) {
        self.bits |= cause;
    }
}

impl ResetCause for SimResetCause {
    fn read(&mut self) -> u32 {
        self.bits
    }

    fn clear(&mut self) {
        self.bits = 0;
    }
}

/// The PC side of a session: knows the key and the image, and answers
/// requests with the same ciphertext every time.
pub struct Uploader {
    cipher: Xtea,
    image: Vec<u8>,
    /// What opens the session. The start signature, unless a test says
    /// otherwise.
    pub request: [u8; 4],
    /// Sent as the first encrypted packet. Computed from the image, but tests
    /// may alter it before the session starts.
    pub header: StartHeader,
    /// Fills the rest of the header packet.
    pub padding: [u8; PACKET_SIZE - 16],
    /// Indices (in arrival order) of packet requests that get lost.
    pub drop_requests: Vec<usize>,
    /// Indices (in order sent) of data packets that arrive damaged.
    pub corrupt: Vec<usize>,
    /// Stop answering after this many data packets.
    pub silence_after: Option<usize>,
    /// Packets of other traffic that arrive between the IV and the header.
    pub header_noise: usize,
    /// The header never arrives.
    pub header_lost: bool,

    encrypted_header: Packet,
    encrypted: BTreeMap<u16, Packet>,
    answered: usize,
}

impl Uploader {
    pub fn new(key: &[u8; 16], image: &[u8]) -> Self {
        let crc = Crc::<u16>::new(&CRC_16_ARC);
        let reversed: Vec<u8> = image.iter().rev().copied().collect();

        Self {
            cipher: Xtea::new(key),
            image: image.to_vec(),
            request: START_SIGNATURE.to_le_bytes(),
            header: StartHeader {
                signature_a: U32::new(START_SIGNATURE),
                app_size: U16::new(image.len() as u16),
                crc_forward: U16::new(crc.checksum(image)),
                crc_reverse: U16::new(crc.checksum(&reversed)),
                round: U16::new(0x0102),
                signature_b: U32::new(START_SIGNATURE),
            },
            padding: [0xa5; PACKET_SIZE - 16],
            drop_requests: Vec::new(),
            corrupt: Vec::new(),
            silence_after: None,
            header_noise: 0,
            header_lost: false,
            encrypted_header: [0; PACKET_SIZE],
            encrypted: BTreeMap::new(),
            answered: 0,
        }
    }

    /// Encrypts the whole session, header first and then the image from the
    /// top down, in the order the bootloader will ask for it.
    fn begin(&mut self, iv: SessionIv) {
        let mut chain = iv.0;

        let mut packet = [0; PACKET_SIZE];
        packet[..16].copy_from_slice(self.header.as_bytes());
        packet[16..].copy_from_slice(&self.padding);
        encrypt(&self.cipher, &mut chain, &mut packet);
        self.encrypted_header = packet;

        self.encrypted.clear();
        for end in (PACKET_SIZE..=self.image.len()).rev().step_by(PACKET_SIZE) {
            let mut packet = [0; PACKET_SIZE];
            packet.copy_from_slice(&self.image[end - PACKET_SIZE..end]);
            encrypt(&self.cipher, &mut chain, &mut packet);
            self.encrypted.insert(end as u16, packet);
        }
    }

    /// The answer to a request for the packet ending at `offset`, if any, and
    /// whether it arrives intact.
    fn answer(&mut self, offset: u16) -> Option<(Packet, bool)> {
        if self.silence_after.map_or(false, |n| self.answered >= n) {
            return None;
        }
        let mut packet = *self.encrypted.get(&offset)?;
        let intact = !self.corrupt.contains(&self.answered);
        if !intact {
            packet[5] ^= 0x10;
        }
        self.answered += 1;
        Some((packet, intact))
    }
}

/// Traffic that is never what the bootloader waits for: alternately a
/// damaged full-size packet and an intact short one.
pub fn chatter(i: usize) -> (Vec<u8>, bool) {
    if i % 2 == 0 {
        (vec![0x55; PACKET_SIZE], false)
    } else {
        (vec![i as u8; 7], true)
    }
}

/// A transceiver with an [`Uploader`] at the other end.
///
/// Replies are available on the very next poll. Everything the bootloader
/// transmits is recorded.
pub struct SimRadio {
    pub uploader: Uploader,
    inbox: VecDeque<(Vec<u8>, bool)>,
    pub sent: Vec<Vec<u8>>,
    pub ivs: Vec<[u8; CIPHER_BLOCK_SIZE]>,
    pub requests: Vec<u16>,
    pub statuses: Vec<(Status, u16)>,
}

impl SimRadio {
    pub fn new(uploader: Uploader) -> Self {
        let mut radio = Self::with(uploader);
        let request = radio.uploader.request.to_vec();
        radio.inbox.push_back((request, true));
        radio
    }

    /// Nobody is transmitting.
    pub fn silent() -> Self {
        Self::with(Uploader::new(&KEY, &[]))
    }

    fn with(uploader: Uploader) -> Self {
        Self {
            uploader,
            inbox: VecDeque::new(),
            sent: Vec::new(),
            ivs: Vec::new(),
            requests: Vec::new(),
            statuses: Vec::new(),
        }
    }

    /// Puts `n` packets of other traffic ahead of whatever is queued: a
    /// damaged header request, then a mix of other sizes.
    pub fn inject_noise(&mut self, n: usize) {
        for i in (0..n).rev() {
            let noise = match i % 3 {
                0 => (START_SIGNATURE.to_le_bytes().to_vec(), false),
                1 => (vec![0x55; PACKET_SIZE], true),
                _ => (vec![i as u8; 7], true),
            };
            self.inbox.push_front(noise);
        }
    }

    /// Queues a packet behind whatever is already waiting.
    pub fn queue(&mut self, bytes: &[u8], intact: bool) {
        self.inbox.push_back((bytes.to_vec(), intact));
    }

    /// Starts the encrypted stream as if `iv` had just been sent, without
    /// queueing anything.
    pub fn start_stream(&mut self, iv: SessionIv) {
        self.inbox.clear();
        self.uploader.begin(iv);
    }

    pub fn take_header(&self) -> Packet {
        self.uploader.encrypted_header
    }
}

impl Radio for SimRadio {
    fn receive(&mut self, packet: &mut Packet) -> Option<Reception> {
        let (bytes, intact) = self.inbox.pop_front()?;
        let len = bytes.len().min(PACKET_SIZE);
        packet[..len].copy_from_slice(&bytes[..len]);
        Some(Reception { len, intact })
    }

    fn send(&mut self, payload: &[u8]) {
        self.sent.push(payload.to_vec());

        if let Ok(iv) = <[u8; CIPHER_BLOCK_SIZE]>::try_from(payload) {
            self.ivs.push(iv);
            self.uploader.begin(SessionIv(iv));
            self.inbox.extend((0..self.uploader.header_noise).map(chatter));
            if !self.uploader.header_lost {
                let header = self.uploader.encrypted_header;
                self.inbox.push_back((header.to_vec(), true));
            }
            return;
        }

        assert_eq!(payload.len(), CONTROL_LEN, "unexpected transmission");
        match wire::parse_control(payload) {
            Some((Status::SendPacketRequest, offset)) => {
                let index = self.requests.len();
                self.requests.push(offset);
                if self.uploader.drop_requests.contains(&index) {
                    return;
                }
                if let Some((packet, intact)) = self.uploader.answer(offset) {
                    self.inbox.push_back((packet.to_vec(), intact));
                }
            }
            Some(status) => self.statuses.push(status),
            None => panic!("malformed control packet {payload:02x?}"),
        }
    }
}
