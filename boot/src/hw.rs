//! hw.rs — UBIBoot register-access capability
//!
//! Every bring-up routine talks to the SoC through [`RegisterBus`], a narrow
//! read/write interface over named registers of the CPM (clocks), EMC
//! (external memory controller) and GPIO blocks. The board binary plugs in
//! [`Mmio`]; the host tests plug in a simulated register file.
//!
//! One initialization sequence owns the bus at a time: callers hand out
//! `&mut dyn RegisterBus`, so two sequences can never interleave.

use core::ptr::{read_volatile, write_volatile};

/// Register block of the JZ47xx SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Block {
    Cpm,
    Emc,
    Gpio,
}

impl Block {
    /// Uncached (kseg1) base address of the block.
    pub const fn base(self) -> u32 {
        match self {
            Block::Cpm => 0xB000_0000,
            Block::Gpio => 0xB001_0000,
            Block::Emc => 0xB301_0000,
        }
    }
}

/// Access width of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Width {
    W8,
    W16,
    W32,
}

/// A named register: block, byte offset inside the block, access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg {
    pub block: Block,
    pub offset: u32,
    pub width: Width,
}

impl Reg {
    pub const fn new(block: Block, offset: u32, width: Width) -> Self {
        Self { block, offset, width }
    }

    #[inline]
    pub const fn addr(self) -> u32 {
        self.block.base() + self.offset
    }
}

/// Clock and power module.
pub mod cpm {
    use super::{Block, Reg, Width};

    pub const CPCCR: Reg = Reg::new(Block::Cpm, 0x00, Width::W32);
    pub const CPPCR: Reg = Reg::new(Block::Cpm, 0x10, Width::W32);
    pub const CLKGR: Reg = Reg::new(Block::Cpm, 0x20, Width::W32);
    pub const LPCDR: Reg = Reg::new(Block::Cpm, 0x64, Width::W32);
    pub const MSCCDR: Reg = Reg::new(Block::Cpm, 0x68, Width::W32);
    pub const UHCCDR: Reg = Reg::new(Block::Cpm, 0x6C, Width::W32);

    /// CLKGR gate bits (set = clock stopped).
    pub const GATE_UART0: u32 = 1 << 0;
    pub const GATE_MSC0: u32 = 1 << 6;
    pub const GATE_LCD: u32 = 1 << 9;
    pub const GATE_MSC1: u32 = 1 << 16;
}

/// External memory controller.
pub mod emc {
    use super::{Block, Reg, Width};

    pub const BCR: Reg = Reg::new(Block::Emc, 0x00, Width::W32);
    pub const SMCR1: Reg = Reg::new(Block::Emc, 0x14, Width::W32);
    pub const DMCR: Reg = Reg::new(Block::Emc, 0x80, Width::W32);
    pub const RTCSR: Reg = Reg::new(Block::Emc, 0x84, Width::W16);
    pub const RTCNT: Reg = Reg::new(Block::Emc, 0x88, Width::W16);
    pub const RTCOR: Reg = Reg::new(Block::Emc, 0x8C, Width::W16);

    const SDMR0: u32 = 0xA000;

    /// The SDRAM mode register is written by address: the mode value is
    /// OR-ed into the SDMR0 window and any byte is stored there.
    pub const fn sdmr(mode: u32) -> Reg {
        Reg::new(Block::Emc, SDMR0 | mode, Width::W8)
    }
}

/// Register-level access to the SoC.
pub trait RegisterBus {
    fn read(&mut self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, value: u32);

    fn set_bits(&mut self, reg: Reg, bits: u32) {
        let v = self.read(reg);
        self.write(reg, v | bits);
    }

    fn clear_bits(&mut self, reg: Reg, bits: u32) {
        let v = self.read(reg);
        self.write(reg, v & !bits);
    }
}

/// Microsecond busy-wait.
pub trait Delay {
    fn udelay(&mut self, us: u32);

    fn mdelay(&mut self, ms: u32) {
        for _ in 0..ms {
            self.udelay(1000);
        }
    }
}

/// Real memory-mapped registers.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    /// Only valid on a JZ47xx where the register blocks are mapped at their
    /// kseg1 addresses, and only one `Mmio` may drive them at a time.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline]
    fn read(&mut self, reg: Reg) -> u32 {
        let addr = reg.addr() as usize;
        // SAFETY: `Mmio::new` contract; addresses come from the register tables above.
        unsafe {
            match reg.width {
                Width::W8 => read_volatile(addr as *const u8) as u32,
                Width::W16 => read_volatile(addr as *const u16) as u32,
                Width::W32 => read_volatile(addr as *const u32),
            }
        }
    }

    #[inline]
    fn write(&mut self, reg: Reg, value: u32) {
        let addr = reg.addr() as usize;
        // SAFETY: see `read`.
        unsafe {
            match reg.width {
                Width::W8 => write_volatile(addr as *mut u8, value as u8),
                Width::W16 => write_volatile(addr as *mut u16, value as u16),
                Width::W32 => write_volatile(addr as *mut u32, value),
            }
        }
    }
}

/// Calibrated spin delay.
pub struct SpinDelay {
    loops_per_us: u32,
}

impl SpinDelay {
    /// Two CPU cycles per loop iteration is close enough for settle times,
    /// which are all minimums.
    pub const fn for_cpu(cpu_hz: u32) -> Self {
        let per_us = cpu_hz / 2_000_000;
        Self { loops_per_us: if per_us == 0 { 1 } else { per_us } }
    }
}

impl Delay for SpinDelay {
    fn udelay(&mut self, us: u32) {
        for _ in 0..us.saturating_mul(self.loops_per_us) {
            core::hint::spin_loop();
        }
    }
}

/// Map an address into the uncached kseg1 segment.
#[inline]
pub const fn kseg1(addr: u32) -> u32 {
    (addr & 0x1FFF_FFFF) | 0xA000_0000
}
