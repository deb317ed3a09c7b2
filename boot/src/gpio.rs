//! gpio.rs — GPIO pin primitives over the register bus
//!
//! Thin helpers for the JZ47xx GPIO block: each port has a pin-level
//! register plus set/clear companions for data, function, select,
//! direction and pull-disable. Nothing here waits or sequences.

use crate::hw::{Block, Reg, RegisterBus, Width};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

/// A single GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioPin {
    pub port: Port,
    pub pin: u8,
}

impl GpioPin {
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }

    #[inline]
    pub const fn mask(self) -> u32 {
        1 << (self.pin as u32 & 31)
    }
}

/// A group of pins on one port handed to a peripheral function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFunction {
    pub port: Port,
    pub mask: u32,
    pub func: u8,
}

impl PinFunction {
    pub const fn new(port: Port, mask: u32, func: u8) -> Self {
        Self { port, mask, func }
    }

    pub fn apply(&self, regs: &mut dyn RegisterBus) {
        as_function(regs, self.port, self.mask, self.func);
    }
}

const PIN: u32 = 0x00;
const DATS: u32 = 0x14;
const DATC: u32 = 0x18;
const PES: u32 = 0x34;
const FUNS: u32 = 0x44;
const FUNC: u32 = 0x48;
const SELS: u32 = 0x54;
const SELC: u32 = 0x58;
const DIRS: u32 = 0x64;
const DIRC: u32 = 0x68;

/// Register `off` of `port`.
pub const fn port_reg(port: Port, off: u32) -> Reg {
    Reg::new(Block::Gpio, (port as u32) * 0x100 + off, Width::W32)
}

/// Pin-level register of `port`.
pub const fn pin_reg(port: Port) -> Reg {
    port_reg(port, PIN)
}

pub fn read_port(regs: &mut dyn RegisterBus, port: Port) -> u32 {
    regs.read(pin_reg(port))
}

pub fn level(regs: &mut dyn RegisterBus, pin: GpioPin) -> bool {
    read_port(regs, pin.port) & pin.mask() != 0
}

pub fn set_mask(regs: &mut dyn RegisterBus, port: Port, mask: u32) {
    regs.write(port_reg(port, DATS), mask);
}

pub fn clear_mask(regs: &mut dyn RegisterBus, port: Port, mask: u32) {
    regs.write(port_reg(port, DATC), mask);
}

pub fn set(regs: &mut dyn RegisterBus, pin: GpioPin) {
    set_mask(regs, pin.port, pin.mask());
}

pub fn clear(regs: &mut dyn RegisterBus, pin: GpioPin) {
    clear_mask(regs, pin.port, pin.mask());
}

pub fn as_output(regs: &mut dyn RegisterBus, port: Port, mask: u32) {
    regs.write(port_reg(port, FUNC), mask);
    regs.write(port_reg(port, SELC), mask);
    regs.write(port_reg(port, DIRS), mask);
}

pub fn as_input(regs: &mut dyn RegisterBus, port: Port, mask: u32) {
    regs.write(port_reg(port, FUNC), mask);
    regs.write(port_reg(port, SELC), mask);
    regs.write(port_reg(port, DIRC), mask);
}

/// Hand pins over to a peripheral; `func` selects function 0 or 1.
pub fn as_function(regs: &mut dyn RegisterBus, port: Port, mask: u32, func: u8) {
    regs.write(port_reg(port, FUNS), mask);
    if func == 0 {
        regs.write(port_reg(port, SELC), mask);
    } else {
        regs.write(port_reg(port, SELS), mask);
    }
}

pub fn disable_pull(regs: &mut dyn RegisterBus, pin: GpioPin) {
    regs.write(port_reg(pin.port, PES), pin.mask());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimRegs;

    #[test]
    fn port_registers_are_strided() {
        assert_eq!(pin_reg(Port::A).addr(), 0xB001_0000);
        assert_eq!(pin_reg(Port::D).addr(), 0xB001_0300);
        assert_eq!(port_reg(Port::C, DATS).addr(), 0xB001_0214);
    }

    #[test]
    fn level_reads_pin_register() {
        let mut regs = SimRegs::new();
        regs.preset(pin_reg(Port::C), 1 << 27);
        assert!(level(&mut regs, GpioPin::new(Port::C, 27)));
        assert!(!level(&mut regs, GpioPin::new(Port::C, 26)));
    }

    #[test]
    fn function_select_writes_sel_clear_for_func0() {
        let mut regs = SimRegs::new();
        as_function(&mut regs, Port::D, 0x1c00_0000, 0);
        assert_eq!(
            regs.writes_to(Block::Gpio),
            vec![(port_reg(Port::D, FUNS), 0x1c00_0000), (port_reg(Port::D, SELC), 0x1c00_0000)]
        );
    }
}
