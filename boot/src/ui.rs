//! ui.rs — UBIBoot console banner and failure report
//!
//! Everything here goes through the serial logger; there is no screen
//! output before the kernel takes over the panel.

use crate::logger;

const RULE: &str = "------------------------------------------------------------\n";

/// Startup banner with the board name.
pub fn draw_boot_banner(board: &str) {
    logger::raw("\n");
    logger::raw(RULE);
    logger::raw("  UBIBoot :: second-stage loader for JZ47xx handhelds\n");
    logger::raw("  board: ");
    logger::raw(board);
    logger::raw("\n");
    logger::raw(RULE);
}

/// Framed failure block, printed once before halting.
pub fn display_failure(reason: &str) {
    logger::raw(RULE);
    logger::log_critical("boot", reason);
    logger::raw(RULE);
}

/// Last line before the jump.
pub fn announce_handoff(entry: u32) {
    log::info!(target: "boot", "kernel loaded, executing at {:#010x}", entry);
}
