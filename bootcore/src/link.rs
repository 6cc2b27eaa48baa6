//! The session's end of the radio link.
//!
//! A [`Link`] owns everything a stage needs to talk to the uploader: the
//! transceiver, the delay source for bounded waits, the watchdog supervisor,
//! and the one packet buffer. Stages borrow the link in turn; nothing else
//! touches the buffer while a stage holds it.

use embedded_hal::blocking::delay::DelayUs;

use crate::poll::{BoundedWait, Step, RESEND_EVERY};
use crate::radio::Radio;
use crate::supervisor::{Supervisor, Watchdog};
use crate::wire::{self, Packet, Status, PACKET_SIZE};
use crate::{Abort, Stage};

pub struct Link<'a, R, D, W> {
    radio: R,
    delay: D,
    supervisor: Supervisor<'a, W>,
    packet: Packet,
}

impl<'a, R, D, W> Link<'a, R, D, W>
where
    R: Radio,
    D: DelayUs<u32>,
    W: Watchdog,
{
    pub fn new(radio: R, delay: D, supervisor: Supervisor<'a, W>) -> Self {
        Self {
            radio,
            delay,
            supervisor,
            packet: [0; PACKET_SIZE],
        }
    }

    pub fn supervisor(&mut self) -> &mut Supervisor<'a, W> {
        &mut self.supervisor
    }

    /// The last packet accepted by [`Link::await_packet`].
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }

    pub fn send(&mut self, payload: &[u8]) {
        self.radio.send(payload);
    }

    /// Sends a control packet.
    pub fn report(&mut self, status: Status, argument: u16) {
        trace!("report {} {=u16:#x}", status, argument);
        self.radio.send(&wire::control(status, argument));
    }

    /// Asks the uploader for the data packet that ends at `offset`.
    pub fn request(&mut self, offset: u16) {
        self.report(Status::SendPacketRequest, offset);
    }

    /// Polls the radio until a packet of exactly `len` bytes arrives intact,
    /// leaving it in the packet buffer.
    ///
    /// Anything else that arrives is noise: it refills the budget and, if
    /// `wait` says so, feeds the watchdog. With `resend` set, the request for
    /// that offset is repeated on the poll right after noise, and every
    /// [`RESEND_EVERY`] polls of silence.
    pub fn await_packet(
        &mut self,
        wait: &BoundedWait,
        len: usize,
        stage: Stage,
        resend: Option<u16>,
    ) -> Result<(), Abort> {
        let radio = &mut self.radio;
        let packet = &mut self.packet;
        let supervisor = &mut self.supervisor;
        let mut after_noise = false;

        wait.run(&mut self.delay, |elapsed| {
            if let Some(offset) = resend {
                if after_noise || (elapsed > 0 && elapsed % RESEND_EVERY == 0) {
                    trace!("re-requesting {=u16}", offset);
                    radio.send(&wire::control(Status::SendPacketRequest, offset));
                }
            }

            let step = match radio.receive(packet) {
                Some(rx) if rx.len == len && rx.intact => Step::Ready,
                Some(_) => {
                    if wait.feed_on_noise {
                        supervisor.keepalive();
                    }
                    Step::Noise
                }
                None => Step::Idle,
            };
            after_noise = step == Step::Noise;
            step
        })
        .map_err(|_| {
            debug!("timed out in {}", stage);
            Abort::Timeout(stage)
        })
    }
}
