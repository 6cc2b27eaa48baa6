//! The boot-time choice between the installed application and upload mode.

use embedded_storage::nor_flash::ReadNorFlash;

use crate::handoff::{Handoff, NOT_SELF_RESET};

/// Value of erased flash.
pub const ERASED: u8 = 0xff;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootDecision {
    RunApplication,
    EnterUploadMode,
}

/// The application runs only if it is installed *and* this boot is the
/// watchdog reset the bootloader itself asked for. Anything else, including
/// a coincidental marker after power-on, means waiting for an upload.
pub fn decide(app_installed: bool, watchdog_reset: bool, self_reset: bool) -> BootDecision {
    if app_installed && watchdog_reset && self_reset {
        BootDecision::RunApplication
    } else {
        BootDecision::EnterUploadMode
    }
}

/// An application is present if the first word of the application region
/// is anything but the erase pattern. The page holding that word is written
/// last by every upload, so its state stands for the whole image.
pub fn application_installed<F: ReadNorFlash>(flash: &mut F) -> bool {
    let mut word = [ERASED; 4];
    match flash.read(0, &mut word) {
        Ok(()) => word != [ERASED; 4],
        Err(_) => false,
    }
}

/// Makes the boot decision and, if the application is to run, consumes the
/// marker and puts the saved reset cause where the application will see it.
/// The caller transfers control afterwards.
///
/// `watchdog_reset` is the bit of the hardware reset cause that indicates a
/// watchdog reset.
pub fn arbitrate<F: ReadNorFlash>(
    flash: &mut F,
    handoff: &mut Handoff,
    watchdog_reset: u32,
) -> BootDecision {
    let decision = decide(
        application_installed(flash),
        handoff.reset_cause_mirror & watchdog_reset != 0,
        handoff.is_self_reset(),
    );

    info!("boot decision: {}", decision);
    if decision == BootDecision::RunApplication {
        handoff.boot_origin_marker = NOT_SELF_RESET;
        handoff.reset_cause_mirror = handoff.saved_reset_cause;
    }
    decision
}
