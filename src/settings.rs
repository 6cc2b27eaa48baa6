//! Per-deployment settings, generated by `build.rs` from the `RADIOBOOT_*`
//! environment variables.

include!(concat!(env!("OUT_DIR"), "/settings.rs"));
