//! Session initialization vectors.
//!
//! The IV goes out in the clear, so it doesn't need to be secret; it needs to
//! be different every session, or two sessions' chained ciphertexts can be
//! compared block for block. Two ways of getting one:
//!
//! - [`EntropyIv`]: eight samples from a hardware random source.
//! - [`CounterIv`]: a round counter kept in non-volatile storage, combined
//!   with a per-build seed and run through the session cipher once. The
//!   counter is bumped when the session actually starts writing.

use embedded_storage::nor_flash::NorFlash;

use crate::channel::BlockCipher;
use crate::wire::CIPHER_BLOCK_SIZE;
use crate::Abort;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionIv(pub [u8; CIPHER_BLOCK_SIZE]);

pub trait IvSource {
    /// Produces the IV for the session about to start.
    fn derive<C: BlockCipher>(&mut self, cipher: &C) -> SessionIv;

    /// Called once the header has been accepted, before anything is erased.
    fn commit(&mut self) -> Result<(), Abort>;
}

/// A source of random bytes.
pub trait EntropySource {
    fn sample(&mut self) -> u8;
}

pub struct EntropyIv<E>(pub E);

impl<E: EntropySource> IvSource for EntropyIv<E> {
    fn derive<C: BlockCipher>(&mut self, _cipher: &C) -> SessionIv {
        let mut iv = [0; CIPHER_BLOCK_SIZE];
        for byte in &mut iv {
            *byte = self.0.sample();
        }
        SessionIv(iv)
    }

    fn commit(&mut self) -> Result<(), Abort> {
        Ok(())
    }
}

/// Persistent storage for the 16-bit round counter.
pub trait RoundStore {
    /// Returns the last stored round. Unprogrammed storage reads as `0xFFFF`,
    /// so the first session uses round 0.
    fn load(&mut self) -> u16;
    fn store(&mut self, round: u16) -> Result<(), Abort>;
}

pub struct CounterIv<S> {
    store: S,
    seed: u32,
    pending: Option<u16>,
}

impl<S: RoundStore> CounterIv<S> {
    pub fn new(store: S, seed: u32) -> Self {
        Self {
            store,
            seed,
            pending: None,
        }
    }
}

impl<S: RoundStore> IvSource for CounterIv<S> {
    fn derive<C: BlockCipher>(&mut self, cipher: &C) -> SessionIv {
        let round = self.store.load().wrapping_add(1);
        self.pending = Some(round);

        let mut iv = [0; CIPHER_BLOCK_SIZE];
        iv[..4].copy_from_slice(&u32::from(round).to_le_bytes());
        iv[4..].copy_from_slice(&self.seed.to_le_bytes());
        cipher.encipher(&mut iv);
        SessionIv(iv)
    }

    fn commit(&mut self) -> Result<(), Abort> {
        match self.pending.take() {
            Some(round) => self.store.store(round),
            None => Ok(()),
        }
    }
}

/// Keeps the round counter at the start of a dedicated flash sector.
///
/// `W` is the size of the buffer used to program it, which has to be a
/// multiple of the flash's write size.
pub struct FlashRoundStore<F, const W: usize> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash, const W: usize> FlashRoundStore<F, W> {
    const WIDTH_OK: () = assert!(W >= 2 && W % F::WRITE_SIZE == 0);

    pub fn new(flash: F, offset: u32) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::WIDTH_OK;
        Self { flash, offset }
    }
}

impl<F: NorFlash, const W: usize> RoundStore for FlashRoundStore<F, W> {
    fn load(&mut self) -> u16 {
        let mut bytes = [0xff; 2];
        // A failed read looks like an erased counter; the worst outcome is
        // repeating round 0.
        if self.flash.read(self.offset, &mut bytes).is_err() {
            bytes = [0xff; 2];
        }
        u16::from_le_bytes(bytes)
    }

    fn store(&mut self, round: u16) -> Result<(), Abort> {
        let mut buffer = [0xff; W];
        buffer[..2].copy_from_slice(&round.to_le_bytes());

        let start = self.offset;
        let end = start + F::ERASE_SIZE as u32;
        critical_section::with(|_| {
            self.flash.erase(start, end)?;
            self.flash.write(start, &buffer)
        })
        .map_err(|_| Abort::Flash)
    }
}
