use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

/// Settings used when the environment doesn't provide them. Fine for a
/// development board on the bench, useless for anything deployed: everyone
/// with this source knows the key.
const DEV_KEY: &str = "000102030405060708090a0b0c0d0e0f";
const DEV_CHANNEL: &str = "10";
const DEV_SYNCWORD: &str = "d391";

const MEMORY_X: &str = r##"
/* The bootloader itself. The application region starts right after it. */
MEMORY
{
    FLASH : ORIGIN = 0x00000000, LENGTH = 32K
    HANDOFF (rw) : ORIGIN = 0x20000000, LENGTH = 16
    RAM : ORIGIN = 0x20000010, LENGTH = 256K - 16
}

SECTIONS {
    .handoff (NOLOAD) : {
        KEEP(*(.handoff))
        . = ALIGN(4);
    } > HANDOFF
};
"##;

fn main() {
    check_target_board();

    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());

    fs::write(out.join("memory.x"), MEMORY_X).unwrap();
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=build.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    if env::var_os("CARGO_FEATURE_DEFMT").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    fs::write(out.join("settings.rs"), settings()).unwrap();

    // The transceiver driver is a separate C object.
    println!("cargo:rerun-if-env-changed=RADIOBOOT_RADIO_LIB_DIR");
    match env::var("RADIOBOOT_RADIO_LIB_DIR") {
        Ok(dir) => {
            println!("cargo:rustc-link-search=native={dir}");
            println!("cargo:rustc-link-lib=static=radio");
        }
        Err(_) => println!(
            "cargo:warning=RADIOBOOT_RADIO_LIB_DIR not set, the radio driver must be linked some other way"
        ),
    }
}

fn check_target_board() {
    let mut target_board: Option<String> = None;

    for (name, _) in env::vars() {
        let prefix = "CARGO_FEATURE_TARGET_BOARD_";
        if let Some(suffix) = name.strip_prefix(prefix) {
            if let Some(previous) = &target_board {
                panic!(
                    "multiple target board features defined (at least {} and {})",
                    show_feature(previous),
                    show_feature(suffix)
                );
            }

            target_board = Some(suffix.to_string());
        }
    }

    if target_board.is_none() {
        panic!("missing target-board-* feature");
    }
}

fn show_feature(envvar: &str) -> String {
    let mut name = "target-board-".to_string();
    name.push_str(&envvar.to_ascii_lowercase().replace('_', "-"));
    name
}

/// Reads a setting from the environment, falling back to the development
/// profile with a warning.
fn setting(var: &str, fallback: &str) -> String {
    println!("cargo:rerun-if-env-changed={var}");
    match env::var(var) {
        Ok(value) => value.trim().to_string(),
        Err(_) => {
            println!("cargo:warning={var} not set, using the development value");
            fallback.to_string()
        }
    }
}

/// Checks that `value` is exactly `digits` hex digits and hands it back.
fn hex_setting(var: &str, value: String, digits: usize) -> String {
    if value.len() != digits || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        panic!("{var} must be {digits} hex digits, got {value:?}");
    }
    value
}

fn settings() -> String {
    let key = hex_setting("RADIOBOOT_KEY", setting("RADIOBOOT_KEY", DEV_KEY), 32);
    let syncword = hex_setting(
        "RADIOBOOT_SYNCWORD",
        setting("RADIOBOOT_SYNCWORD", DEV_SYNCWORD),
        4,
    );
    let channel = setting("RADIOBOOT_CHANNEL", DEV_CHANNEL);
    let channel: u8 = channel
        .parse()
        .unwrap_or_else(|_| panic!("RADIOBOOT_CHANNEL must be 0-255, got {channel:?}"));

    // Mixed into the counter-based IV so that two builds with the same key
    // don't produce the same IV sequence.
    let seed = chrono::Utc::now().timestamp() as u32;

    let mut out = String::new();
    writeln!(out, "/// Session cipher key.").unwrap();
    writeln!(out, "pub const KEY: [u8; 16] = hex_literal::hex!(\"{key}\");").unwrap();
    writeln!(out, "/// Transceiver channel number.").unwrap();
    writeln!(out, "pub const CHANNEL: u8 = {channel};").unwrap();
    writeln!(out, "/// Transceiver sync word, high byte first.").unwrap();
    writeln!(out, "pub const SYNCWORD: [u8; 2] = hex_literal::hex!(\"{syncword}\");").unwrap();
    writeln!(out, "/// Per-build seed for the counter-based session IV.").unwrap();
    writeln!(out, "pub const BUILD_SEED: u32 = {seed:#010x};").unwrap();
    out
}
