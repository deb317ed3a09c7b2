//! NAND static-memory timing and the ready/busy line.

use crate::gpio::{self, GpioPin};
use crate::hw::{emc, RegisterBus};

const SMCR_STRV_SHIFT: u32 = 24;
const SMCR_TAW_SHIFT: u32 = 20;
const SMCR_TBP_SHIFT: u32 = 16;
const SMCR_TAH_SHIFT: u32 = 12;
const SMCR_TAS_SHIFT: u32 = 8;

/// Polls spent waiting for the chip to go busy before assuming it already
/// finished.
pub const BUSY_EDGE_POLLS: u32 = 10_000;

/// SMCR1 cycle counts for the NAND bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandTiming {
    /// Static memory strobe recovery.
    pub strv: u8,
    /// Access wait.
    pub taw: u8,
    /// Burst pitch.
    pub tbp: u8,
    /// Address hold.
    pub tah: u8,
    /// Address setup.
    pub tas: u8,
    /// Ready/busy input, low while the chip is busy.
    pub ready_busy: GpioPin,
}

impl NandTiming {
    pub const fn validate(&self) -> Result<(), &'static str> {
        if self.strv > 0xF || self.taw > 0xF || self.tbp > 0xF {
            return Err("NAND STRV/TAW/TBP are 4-bit fields");
        }
        if self.tah > 0x7 || self.tas > 0x7 {
            return Err("NAND TAH/TAS are 3-bit fields");
        }
        Ok(())
    }

    pub const fn smcr(&self) -> u32 {
        ((self.strv as u32) << SMCR_STRV_SHIFT)
            | ((self.taw as u32) << SMCR_TAW_SHIFT)
            | ((self.tbp as u32) << SMCR_TBP_SHIFT)
            | ((self.tah as u32) << SMCR_TAH_SHIFT)
            | ((self.tas as u32) << SMCR_TAS_SHIFT)
    }
}

/// Program the NAND bank timing.
pub fn init(regs: &mut dyn RegisterBus, timing: &NandTiming) {
    regs.write(emc::SMCR1, timing.smcr());
    log::debug!(target: "nand", "SMCR1 = {:#010x}", timing.smcr());
}

/// Wait for the busy edge for at most [`BUSY_EDGE_POLLS`] polls, then
/// without limit for ready.
pub fn wait_ready(regs: &mut dyn RegisterBus, ready_busy: GpioPin) {
    let mut budget = BUSY_EDGE_POLLS;
    while gpio::level(regs, ready_busy) && budget > 0 {
        budget -= 1;
    }
    while !gpio::level(regs, ready_busy) {
        core::hint::spin_loop();
    }
}
