//! The on-chip true random number generator.

use bootcore::iv::EntropySource;

/// `AHBCLKCTRL2.RNG`.
const AHBCLK_RNG: u32 = 1 << 13;

pub struct Rng<'a> {
    rng: &'a lpc55_pac::RNG,
}

impl<'a> Rng<'a> {
    pub fn new(syscon: &lpc55_pac::SYSCON, rng: &'a lpc55_pac::RNG) -> Self {
        syscon
            .ahbclkctrl2
            .modify(|r, w| unsafe { w.bits(r.bits() | AHBCLK_RNG) });
        Self { rng }
    }
}

impl EntropySource for Rng<'_> {
    fn sample(&mut self) -> u8 {
        // Fold all 32 bits in rather than trusting any single byte.
        let word = self.rng.random_number.read().bits();
        word.to_le_bytes().iter().fold(0, |acc, b| acc ^ b)
    }
}
