//! Chained-block decryption of incoming packets.
//!
//! Each session is one long CBC stream: the start header, then every data
//! packet in the order we request them. The chain value starts at the session
//! IV and carries over from packet to packet, so the uploader must resend the
//! exact same ciphertext when a request is repeated.
//!
//! Nothing here detects tampering. A ciphertext block that was damaged in
//! flight (but passed the transceiver's own check) garbles its own plaintext
//! block and the one after it; the signature and CRC checks catch that later.

use crate::iv::SessionIv;
use crate::wire::{Packet, CIPHER_BLOCK_SIZE};

/// A block cipher primitive with an 8-byte block.
pub trait BlockCipher {
    fn encipher(&self, block: &mut [u8; CIPHER_BLOCK_SIZE]);
    fn decipher(&self, block: &mut [u8; CIPHER_BLOCK_SIZE]);
}

pub struct SecureChannel<C> {
    cipher: C,
    chain: [u8; CIPHER_BLOCK_SIZE],
}

impl<C: BlockCipher> SecureChannel<C> {
    pub fn new(cipher: C, iv: SessionIv) -> Self {
        Self {
            cipher,
            chain: iv.0,
        }
    }

    /// Replaces the ciphertext in `packet` with plaintext and advances the
    /// chain.
    pub fn decrypt(&mut self, packet: &mut Packet) {
        for chunk in packet.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
            let mut ciphertext = [0; CIPHER_BLOCK_SIZE];
            ciphertext.copy_from_slice(chunk);

            let mut block = ciphertext;
            self.cipher.decipher(&mut block);
            for (b, c) in block.iter_mut().zip(&self.chain) {
                *b ^= c;
            }

            chunk.copy_from_slice(&block);
            self.chain = ciphertext;
        }
    }
}
