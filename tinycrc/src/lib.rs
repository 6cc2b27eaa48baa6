//! `tinycrc`: a tiny CRC implementation.
//!
//! This is a CRC16 implementation that focuses on size over performance. It
//! uses no lookup tables and a couple of bytes of RAM (or, in the common case
//! when it gets inlined, a handful of registers).
//!
//! Algorithms are those defined in the `crc_catalog` crate, used by `crc` (a
//! crate that you should use instead if performance is important).

#![no_std]

use crc_catalog::Algorithm;

/// A CRC16 operation-in-progress using a particular algorithm.
#[derive(Clone, Debug)]
pub struct Crc16 {
    /// Algorithm polynomial, pre-reflected if input is reflected.
    poly: u16,
    /// Should data be bit-reversed on the way in?
    reflect_in: bool,
    /// Should data be bit-reversed on the way out?
    reflect_out: bool,
    /// Value to XOR into the CRC at the end.
    xorout: u16,
    /// Current CRC value.
    value: u16,
}

impl Crc16 {
    /// Creates a new `Crc16` using `algorithm`'s settings.
    pub fn new(algorithm: &Algorithm<u16>) -> Self {
        // The reflected register shifts right, so it wants the polynomial
        // mirrored as well.
        let (poly, value) = if algorithm.refin {
            (algorithm.poly.reverse_bits(), algorithm.init.reverse_bits())
        } else {
            (algorithm.poly, algorithm.init)
        };
        Self {
            poly,
            reflect_in: algorithm.refin,
            reflect_out: algorithm.refout,
            xorout: algorithm.xorout,
            value,
        }
    }

    /// Updates this CRC with the content of `data`.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.push(byte);
        }
    }

    /// Updates this CRC with a single byte.
    ///
    /// Handy when the caller walks memory in an order that isn't a slice, such
    /// as back to front.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        if self.reflect_in {
            let v = u16::from(self.value as u8 ^ byte);
            self.value = crc16_reflect(self.poly, v) ^ (self.value >> 8);
        } else {
            let v = (self.value >> 8) ^ u16::from(byte);
            self.value = crc16(self.poly, v) ^ (self.value << 8);
        }
    }

    /// Performs any final computations required and returns the computed CRC16.
    pub fn finish(mut self) -> u16 {
        if self.reflect_in ^ self.reflect_out {
            self.value = self.value.reverse_bits();
        }
        self.value ^ self.xorout
    }
}

fn crc16_reflect(poly: u16, mut value: u16) -> u16 {
    for _ in 0..8 {
        value = (value >> 1) ^ ((value & 1) * poly);
    }
    value
}

fn crc16(poly: u16, mut value: u16) -> u16 {
    value <<= 8;
    for _ in 0..8 {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(algorithm: &'static crc::Algorithm<u16>, data: &[u8]) -> u16 {
        let good = crc::Crc::<u16>::new(algorithm);
        let mut good = good.digest();
        good.update(data);
        good.finalize()
    }

    #[test]
    fn no_data() {
        let mine = Crc16::new(&crc_catalog::CRC_16_ARC);
        let result = mine.finish();

        assert_eq!(result, reference(&crc::CRC_16_ARC, &[]));
    }

    #[test]
    fn some_data() {
        let fixture = b"the quick brown fox jumps over the lazy dog";

        let mut mine = Crc16::new(&crc_catalog::CRC_16_ARC);
        mine.update(fixture);
        let result = mine.finish();

        assert_eq!(result, reference(&crc::CRC_16_ARC, fixture));
    }

    #[test]
    fn check_value() {
        // The catalog's published check value for "123456789".
        let mut mine = Crc16::new(&crc_catalog::CRC_16_ARC);
        mine.update(b"123456789");
        assert_eq!(mine.finish(), crc_catalog::CRC_16_ARC.check);
    }

    #[test]
    fn matches_avr_libc_crc16_update() {
        // avr-libc's _crc16_update, as used by the AVR uploader tooling.
        fn crc16_update(mut crc: u16, a: u8) -> u16 {
            crc ^= u16::from(a);
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
            crc
        }

        let fixture: [u8; 64] = core::array::from_fn(|i| (i as u8).wrapping_mul(37) ^ 0x5A);
        let expected = fixture.iter().fold(0, |crc, &b| crc16_update(crc, b));

        let mut mine = Crc16::new(&crc_catalog::CRC_16_ARC);
        mine.update(&fixture);
        assert_eq!(mine.finish(), expected);
    }

    #[test]
    fn non_reflected_algorithm() {
        let fixture = b"the quick brown fox jumps over the lazy dog";

        let mut mine = Crc16::new(&crc_catalog::CRC_16_XMODEM);
        mine.update(fixture);

        assert_eq!(mine.finish(), reference(&crc::CRC_16_XMODEM, fixture));
    }

    #[test]
    fn push_matches_update() {
        let fixture = b"0123456789abcdef";

        let mut by_slice = Crc16::new(&crc_catalog::CRC_16_ARC);
        by_slice.update(fixture);

        let mut by_byte = Crc16::new(&crc_catalog::CRC_16_ARC);
        for &b in fixture {
            by_byte.push(b);
        }

        assert_eq!(by_slice.finish(), by_byte.finish());
    }
}
