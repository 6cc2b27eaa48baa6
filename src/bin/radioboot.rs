// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The radio bootloader program.
//!
//! This contains the entry point and support code for the bootloader. The
//! decisions and the upload protocol live in `bootcore`; the lib crate
//! provides the hardware underneath. The code here wires the two together
//! and deals with the particular runtime requirements of the bootloader.

#![no_std]
#![no_main]

use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;
use core::sync::atomic::{compiler_fence, Ordering};

use bootcore::arbiter::{self, BootDecision};
use bootcore::handoff::Handoff;
use bootcore::link::Link;
use bootcore::session;
use bootcore::supervisor::Supervisor;
use bootcore::xtea::Xtea;
use radioboot::bsp::Bsp;
use radioboot::flash::Lpc55Flash;
use radioboot::radio::{self, Lpc55Radio};
use radioboot::watchdog::Wwdt;
use radioboot::{reset_cause, settings, Aoreg1, APP_BASE, APP_SIZE, PAGE_SIZE};

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// Select the appropriate BSP type as `Board`
cfg_if::cfg_if! {
    if #[cfg(feature = "target-board-lpc55xpresso")] {
        use radioboot::bsp::lpc55xpresso::Board;
    } else if #[cfg(feature = "target-board-rot-carrier")] {
        use radioboot::bsp::rot_carrier::Board;
    }
}

use cortex_m_rt::{entry, exception, pre_init, ExceptionFrame};
use lpc55_pac::interrupt;

/// State carried across our own resets, in RAM the runtime never initializes.
/// The linker script gives it a region of its own so that neither we nor the
/// application clobber it by accident.
#[link_section = ".handoff"]
static mut HANDOFF: MaybeUninit<Handoff> = MaybeUninit::uninit();

/// Moves the hardware reset cause into the handoff block before the runtime
/// or anything else gets a chance to run. `AOREG1` is left clear, so the next
/// boot sees only the reset that caused it.
#[pre_init]
unsafe fn capture_reset_cause() {
    // Safety: nothing else runs yet, and every bit pattern is a valid
    // `Handoff`.
    let handoff = unsafe { (*addr_of_mut!(HANDOFF)).assume_init_mut() };
    let pmc = unsafe { &*lpc55_pac::PMC::ptr() };
    handoff.capture(Aoreg1(pmc));
}

/// Bootloader entry point. These are not the first instructions executed, since
/// we rely on `cortex_m_rt::entry` to do the equivalent of crt0 (and on
/// `capture_reset_cause` above) before we get control.
#[entry]
fn main() -> ! {
    // Safety: This is sound as long as (1) `steal` only happens once, and (2)
    // none of the correctness of the rest of the code relies on peripherals
    // being uniquely held. The first part we can ensure by putting this at the
    // top of `main`, which `entry` makes hard to reentrantly call in safe code.
    // The second one is architectural but holds due to our design.
    let p = unsafe { lpc55_pac::Peripherals::steal() };
    let cp = unsafe { cortex_m::Peripherals::steal() };

    // Safety: `main` runs once and is the only user of the handoff block
    // after `pre_init`.
    let handoff = unsafe { (*addr_of_mut!(HANDOFF)).assume_init_mut() };

    Board::configure(&p.IOCON, &p.GPIO);

    let mut app = Lpc55Flash::new(&p.FLASH, APP_BASE, APP_SIZE);
    let decision = arbiter::arbitrate(&mut app, handoff, reset_cause::WDTRESET);
    if decision == BootDecision::RunApplication {
        boot_into(APP_BASE);
    }

    Board::indicate_upload_mode(&p.GPIO);

    // The watchdog goes first, so that everything below runs under it.
    let supervisor = Supervisor::new(Wwdt::new(&p.SYSCON, &p.WWDT), handoff);
    let radio = Lpc55Radio::new(
        &p.SYSCON,
        &p.INPUTMUX,
        &p.PINT,
        Board::RADIO_IRQ_PIN,
        settings::CHANNEL,
        &settings::SYNCWORD,
    );
    let delay = cortex_m::delay::Delay::new(cp.SYST, radioboot::CORE_CLOCK_HZ);
    let link = Link::new(radio, delay, supervisor);
    let cipher = Xtea::new(&settings::KEY);

    cfg_if::cfg_if! {
        if #[cfg(feature = "iv-from-entropy")] {
            let rng = radioboot::entropy::Rng::new(&p.SYSCON, &p.RNG);
            let mut iv_source = bootcore::iv::EntropyIv(rng);
        } else {
            let rounds = Lpc55Flash::new(&p.FLASH, radioboot::ROUND_BASE, PAGE_SIZE as u32);
            let mut iv_source = bootcore::iv::CounterIv::new(
                bootcore::iv::FlashRoundStore::<_, PAGE_SIZE>::new(rounds, 0),
                settings::BUILD_SEED,
            );
        }
    }

    session::run::<_, _, _, _, _, _, PAGE_SIZE>(link, &mut app, cipher, &mut iv_source)
}

#[interrupt]
fn PIN_INT0() {
    radio::on_packet_signal();
}

#[panic_handler]
fn panic_handler(_: &core::panic::PanicInfo) -> ! {
    // We use a BKPT instruction to wake any attached debugger. If no debugger
    // is attached, BKPT escalates into a HardFault, falling to the handler
    // below. This way we can reuse its fault indication code.
    loop {
        cortex_m::asm::bkpt();
    }
}

#[exception]
unsafe fn HardFault(_ef: &ExceptionFrame) -> ! {
    // Safety: the GPIO peripheral is static, and we're not racing anyone by
    // definition since we're handling a HardFault. So we win.
    let gpio = unsafe { &*lpc55_pac::GPIO::ptr() };

    Board::indicate_fault(gpio);

    // Spin. Not BKPT: without a debugger it would escalate to another
    // HardFault and lock the processor. If the watchdog is running, it ends
    // this.
    loop {
        compiler_fence(Ordering::SeqCst);
    }
}

/// Starts the application whose vector table is at `base`. Only the vector
/// table register, the stack pointer and the program counter change; RAM,
/// including the handoff block, is left as it is.
fn boot_into(base: u32) -> ! {
    // Safety: the arbiter only chooses the application when its first page
    // is programmed, so these reads don't fault.
    let (initial_stack_pointer, reset_vector) = unsafe {
        let table = base as *const u32;
        (
            core::ptr::read_volatile(table),
            core::ptr::read_volatile(table.add(1)),
        )
    };

    unsafe {
        core::arch::asm!(
            "
                @ r0 = application reset vector
                @ r1 = application initial stack pointer
                @ r2 = application vector table address

                @ Point VTOR at the application's vector table.
                movw r3, #:lower16:0xE000ED08
                movt r3, #:upper16:0xE000ED08
                str r2, [r3]

                @ SP is an alias of MSP here, and MOV SP is shorter than
                @ MSR MSP.
                mov SP, r1

                @ Plain BX, so that we stay in secure mode.
                bx r0
            ",
            in("r0") reset_vector,
            in("r1") initial_stack_pointer,
            in("r2") base,
            options(noreturn),
        )
    }
}
