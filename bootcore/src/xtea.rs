//! XTEA, the session block cipher.
//!
//! 64-bit block, 128-bit key, 32 cycles. Blocks and keys are little-endian
//! 32-bit words on the wire, which is what the uploader produces.

use crate::channel::BlockCipher;
use crate::wire::CIPHER_BLOCK_SIZE;

const DELTA: u32 = 0x9e37_79b9;
const CYCLES: u32 = 32;

#[derive(Clone)]
pub struct Xtea {
    key: [u32; 4],
}

impl Xtea {
    /// Creates a cipher from a key as stored in the build settings.
    pub const fn new(key: &[u8; 16]) -> Self {
        Self::from_words([
            key_word(key, 0),
            key_word(key, 4),
            key_word(key, 8),
            key_word(key, 12),
        ])
    }

    const fn from_words(key: [u32; 4]) -> Self {
        Self { key }
    }

    fn encipher_words(&self, [mut v0, mut v1]: [u32; 2]) -> [u32; 2] {
        let k = &self.key;
        let mut sum = 0u32;
        for _ in 0..CYCLES {
            v0 = v0.wrapping_add(
                ((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1) ^ sum.wrapping_add(k[(sum & 3) as usize]),
            );
            sum = sum.wrapping_add(DELTA);
            v1 = v1.wrapping_add(
                ((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0)
                    ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
            );
        }
        [v0, v1]
    }

    fn decipher_words(&self, [mut v0, mut v1]: [u32; 2]) -> [u32; 2] {
        let k = &self.key;
        let mut sum = DELTA.wrapping_mul(CYCLES);
        for _ in 0..CYCLES {
            v1 = v1.wrapping_sub(
                ((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0)
                    ^ sum.wrapping_add(k[((sum >> 11) & 3) as usize]),
            );
            sum = sum.wrapping_sub(DELTA);
            v0 = v0.wrapping_sub(
                ((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1) ^ sum.wrapping_add(k[(sum & 3) as usize]),
            );
        }
        [v0, v1]
    }
}

const fn key_word(key: &[u8; 16], i: usize) -> u32 {
    u32::from_le_bytes([key[i], key[i + 1], key[i + 2], key[i + 3]])
}

fn load(block: &[u8; CIPHER_BLOCK_SIZE]) -> [u32; 2] {
    let [a, b, c, d, e, f, g, h] = *block;
    [u32::from_le_bytes([a, b, c, d]), u32::from_le_bytes([e, f, g, h])]
}

fn store(block: &mut [u8; CIPHER_BLOCK_SIZE], [v0, v1]: [u32; 2]) {
    block[..4].copy_from_slice(&v0.to_le_bytes());
    block[4..].copy_from_slice(&v1.to_le_bytes());
}

impl BlockCipher for Xtea {
    fn encipher(&self, block: &mut [u8; CIPHER_BLOCK_SIZE]) {
        let v = self.encipher_words(load(block));
        store(block, v);
    }

    fn decipher(&self, block: &mut [u8; CIPHER_BLOCK_SIZE]) {
        let v = self.decipher_words(load(block));
        store(block, v);
    }
}
