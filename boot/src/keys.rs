//! Boot-time key probes. Buttons pull their GPIO line low when held.

use crate::gpio::{self, GpioPin};
use crate::hw::RegisterBus;

/// Buttons that must all be held. An empty combo is never pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo(pub &'static [GpioPin]);

impl KeyCombo {
    pub const NONE: KeyCombo = KeyCombo(&[]);

    pub fn pressed(&self, regs: &mut dyn RegisterBus) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&pin| !gpio::level(regs, pin))
    }

    /// Put every pin of the combo in GPIO input mode.
    pub fn configure(&self, regs: &mut dyn RegisterBus) {
        for pin in self.0 {
            gpio::as_input(regs, pin.port, pin.mask());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    /// Ask the source for its alternate kernel slot.
    pub alt_kernel: KeyCombo,
    /// Boot the alternate root filesystem.
    pub alt_rootfs: KeyCombo,
    /// Drop the boot splash.
    pub plain_logo: KeyCombo,
}

impl KeyMap {
    pub const NONE: KeyMap = KeyMap { alt_kernel: KeyCombo::NONE, alt_rootfs: KeyCombo::NONE, plain_logo: KeyCombo::NONE };

    pub fn configure(&self, regs: &mut dyn RegisterBus) {
        self.alt_kernel.configure(regs);
        self.alt_rootfs.configure(regs);
        self.plain_logo.configure(regs);
    }
}

/// Key state, sampled once per boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySelection {
    pub alt_kernel: bool,
    pub alt_rootfs: bool,
    pub plain_logo: bool,
}

impl KeySelection {
    pub fn sample(regs: &mut dyn RegisterBus, map: &KeyMap) -> Self {
        let sel = Self {
            alt_kernel: map.alt_kernel.pressed(regs),
            alt_rootfs: map.alt_rootfs.pressed(regs),
            plain_logo: map.plain_logo.pressed(regs),
        };
        if sel != Self::default() {
            log::info!(target: "keys", "held: alt kernel {}, alt rootfs {}, plain logo {}", sel.alt_kernel, sel.alt_rootfs, sel.plain_logo);
        }
        sel
    }
}
