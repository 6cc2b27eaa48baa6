//! The transceiver, as far as the bootloader is concerned.

use crate::wire::Packet;

/// What the transceiver says about a packet it handed over.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Reception {
    /// Number of bytes received.
    pub len: usize,
    /// The transceiver's own integrity check passed.
    pub intact: bool,
}

pub trait Radio {
    /// If the packet-received signal has fired since the last call, copies the
    /// packet into `packet` and reports on it. Otherwise returns `None`
    /// without touching `packet`.
    fn receive(&mut self, packet: &mut Packet) -> Option<Reception>;

    /// Transmits `payload` and returns once the transceiver reports it sent.
    fn send(&mut self, payload: &[u8]);
}

impl<T: Radio + ?Sized> Radio for &mut T {
    fn receive(&mut self, packet: &mut Packet) -> Option<Reception> {
        T::receive(self, packet)
    }

    fn send(&mut self, payload: &[u8]) {
        T::send(self, payload)
    }
}
