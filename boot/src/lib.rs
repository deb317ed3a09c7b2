//! UBIBoot — second-stage boot loader for Ingenic JZ4740/JZ4770 handhelds
//!
//! Brings up the clock tree and SDRAM, checks RAM, then tries each
//! configured boot medium in turn until one yields a valid uImage, which is
//! relocated and entered with a Linux-style argument vector.
//!
//! All hardware goes through [`hw::RegisterBus`] and the I/O backends
//! through [`source::KernelSource`], so the whole flow runs on the host
//! under test. The board binary (`src/main.rs`) plugs in the real thing.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod boot;
pub mod clock;
pub mod cmdline;
pub mod config;
pub mod gpio;
pub mod handoff;
pub mod hw;
pub mod keys;
pub mod loader;
pub mod logger;
pub mod memtest;
pub mod nand;
pub mod panel;
pub mod sdram;
pub mod source;
pub mod uimage;
pub mod ui;

#[cfg(test)]
mod testing;

pub use boot::{BootOrchestrator, BootState, HaltReason, Platform};
pub use config::{BootConfig, RZX27};
