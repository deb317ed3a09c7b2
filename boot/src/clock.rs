//! clock.rs — UBIBoot PLL and clock-tree configurator
//!
//! PLL output = EXTAL * NF / (NR * NO), with NF = FD + 2 and NR = RD + 2.
//! The loader always runs RD = 0 (NR = 2) and OD = 0 (NO = 1), so the
//! feedback multiplier is `NF = cpu * 2 / extal` and the target frequency
//! must be an exact multiple of half the crystal.
//!
//! Planning ([`ClockRequest::plan`]) is a `const fn` so a board profile with
//! an unmapped divisor or an unreachable frequency fails at build time.
//! Applying a plan ends in an unbounded wait for PLL lock.

use bitflags::bitflags;

use crate::hw::{cpm, RegisterBus};

bitflags! {
    /// CPCCR flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cpccr: u32 {
        const I2CS   = 1 << 31;
        const CLKOEN = 1 << 30;
        const UCS    = 1 << 29;
        /// Latch divider/PLL changes.
        const CE     = 1 << 22;
        /// Peripheral clocks run from the full PLL output.
        const PCS    = 1 << 21;
    }
}

bitflags! {
    /// CPPCR flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cppcr: u32 {
        /// PLL locked.
        const PLLS  = 1 << 10;
        const PLLBP = 1 << 9;
        const PLLEN = 1 << 8;
    }
}

const CDIV_SHIFT: u32 = 0;
const HDIV_SHIFT: u32 = 4;
const PDIV_SHIFT: u32 = 8;
const MDIV_SHIFT: u32 = 12;
const LDIV_SHIFT: u32 = 16;

const PLLM_SHIFT: u32 = 23;
const PLLN_SHIFT: u32 = 18;
const PLLOD_SHIFT: u32 = 16;
const PLLST_SHIFT: u32 = 0;

/// PLL stabilization time, in RTC clock cycles.
pub const PLL_STABLE_TIME: u32 = 0x20;

/// USB host needs `pllout2 / (UHCCDR + 1)` = 48 MHz.
pub const USB_HOST_HZ: u32 = 48_000_000;
/// SLCD pixel clock (10 MHz effective dot clock).
pub const LCD_PIXEL_HZ: u32 = 20_000_000;
/// MSC0/1 base clock.
pub const MSC_HZ: u32 = 24_000_000;

/// Raw divisor → hardware encoding. Any divisor not listed is invalid.
pub const DIVISOR_TABLE: [(u32, u32); 10] = [
    (1, 0),
    (2, 1),
    (3, 2),
    (4, 3),
    (6, 4),
    (8, 5),
    (12, 6),
    (16, 7),
    (24, 8),
    (32, 9),
];

pub const fn encode_divisor(raw: u32) -> Result<u32, &'static str> {
    let mut i = 0;
    while i < DIVISOR_TABLE.len() {
        if DIVISOR_TABLE[i].0 == raw {
            return Ok(DIVISOR_TABLE[i].1);
        }
        i += 1;
    }
    Err("clock divisor not in hardware table")
}

const fn decode_divisor(field: u32) -> u32 {
    let mut i = 0;
    while i < DIVISOR_TABLE.len() {
        if DIVISOR_TABLE[i].1 == field {
            return DIVISOR_TABLE[i].0;
        }
        i += 1;
    }
    1
}

/// Raw per-domain divisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Divisors {
    pub core: u32,
    pub ahb: u32,
    pub apb: u32,
    pub mem: u32,
    pub low_speed: u32,
}

impl Divisors {
    pub const DEFAULT: Divisors = Divisors { core: 1, ahb: 3, apb: 3, mem: 3, low_speed: 3 };
}

/// What the board asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRequest {
    pub crystal_hz: u32,
    pub cpu_hz: u32,
    pub divisors: Divisors,
    /// A serial LCD panel needs its pixel clock programmed.
    pub panel_clock: bool,
}

/// Computed register image for the clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPlan {
    pub crystal_hz: u32,
    pub cpu_hz: u32,
    pub divisors: Divisors,
    /// PLL feedback multiplier NF.
    pub feedback: u32,
    pub cpccr: u32,
    pub cppcr: u32,
    pub uhc_div: u32,
    /// `pllout2` divides exactly into the USB host clock.
    pub usb_exact: bool,
    pub lcd_div: Option<u32>,
    pub locked: bool,
}

macro_rules! const_try {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Err(e),
        }
    };
}

impl ClockRequest {
    pub const fn plan(&self) -> Result<ClockPlan, &'static str> {
        let d = self.divisors;
        let cpccr = Cpccr::CLKOEN.bits()
            | Cpccr::PCS.bits()
            | (const_try!(encode_divisor(d.core)) << CDIV_SHIFT)
            | (const_try!(encode_divisor(d.ahb)) << HDIV_SHIFT)
            | (const_try!(encode_divisor(d.apb)) << PDIV_SHIFT)
            | (const_try!(encode_divisor(d.mem)) << MDIV_SHIFT)
            | (const_try!(encode_divisor(d.low_speed)) << LDIV_SHIFT);

        if self.crystal_hz == 0 {
            return Err("crystal frequency is zero");
        }
        let twice = self.cpu_hz as u64 * 2;
        if twice % self.crystal_hz as u64 != 0 {
            return Err("CPU frequency is not reachable from the crystal with NR=2, NO=1");
        }
        let nf = twice / self.crystal_hz as u64;
        // FD is a 9-bit field.
        if nf < 2 || nf - 2 > 0x1FF {
            return Err("PLL feedback multiplier out of range");
        }
        let nf = nf as u32;

        let cppcr = ((nf - 2) << PLLM_SHIFT)
            | (0 << PLLN_SHIFT)
            | (0 << PLLOD_SHIFT)
            | (PLL_STABLE_TIME << PLLST_SHIFT)
            | Cppcr::PLLEN.bits();

        // PCS is always set above, so pllout2 is the full PLL output.
        let pllout2 = self.cpu_hz;
        if pllout2 < USB_HOST_HZ {
            return Err("PLL output too slow for the USB host clock");
        }
        let uhc_div = pllout2 / USB_HOST_HZ - 1;
        let usb_exact = pllout2 % USB_HOST_HZ == 0;

        let lcd_div = if self.panel_clock {
            if pllout2 % LCD_PIXEL_HZ != 0 {
                return Err("PLL output is not a multiple of the panel pixel clock");
            }
            Some(pllout2 / LCD_PIXEL_HZ - 1)
        } else {
            None
        };

        Ok(ClockPlan {
            crystal_hz: self.crystal_hz,
            cpu_hz: self.cpu_hz,
            divisors: d,
            feedback: nf,
            cpccr,
            cppcr,
            uhc_div,
            usb_exact,
            lcd_div,
            locked: false,
        })
    }
}

impl ClockPlan {
    /// Value programmed into the FD field.
    #[inline]
    pub const fn feedback_field(&self) -> u32 {
        self.feedback - 2
    }

    /// Memory clock as seen by the SDRAM timing planner.
    #[inline]
    pub const fn memory_clock_hz(&self) -> u32 {
        (self.cpu_hz as u64 * self.divisors.core as u64 / self.divisors.mem as u64) as u32
    }

    /// Program the clock tree and block until the PLL reports lock.
    pub fn apply(mut self, regs: &mut dyn RegisterBus) -> ClockPlan {
        if !self.usb_exact {
            log::warn!(target: "clock", "PLL output not a multiple of 48 MHz, USB host clock is off");
        }
        regs.write(cpm::UHCCDR, self.uhc_div);
        if let Some(div) = self.lcd_div {
            regs.write(cpm::LPCDR, div);
        }

        regs.write(cpm::CPCCR, self.cpccr);
        regs.write(cpm::CPPCR, self.cppcr);
        regs.set_bits(cpm::CPCCR, Cpccr::CE.bits());

        while regs.read(cpm::CPPCR) & Cppcr::PLLS.bits() == 0 {
            core::hint::spin_loop();
        }
        self.locked = true;
        self
    }
}

/// Plan from `req` and apply it.
pub fn compute_and_apply(req: &ClockRequest, regs: &mut dyn RegisterBus) -> Result<ClockPlan, &'static str> {
    let plan = req.plan()?;
    Ok(plan.apply(regs))
}

/// PLL output frequency as currently programmed.
pub fn pll_output_hz(regs: &mut dyn RegisterBus, crystal_hz: u32) -> u32 {
    const OD_TO_NO: [u64; 4] = [1, 2, 2, 4];
    let cppcr = regs.read(cpm::CPPCR);
    if cppcr & Cppcr::PLLEN.bits() == 0 || cppcr & Cppcr::PLLBP.bits() != 0 {
        return crystal_hz;
    }
    let m = ((cppcr >> PLLM_SHIFT) & 0x1FF) as u64 + 2;
    let n = ((cppcr >> PLLN_SHIFT) & 0x1F) as u64 + 2;
    let no = OD_TO_NO[((cppcr >> PLLOD_SHIFT) & 0x3) as usize];
    (crystal_hz as u64 * m / (n * no)) as u32
}

/// Peripheral PLL clock: the full PLL output when PCS is set, half otherwise.
pub fn pllout2_hz(regs: &mut dyn RegisterBus, crystal_hz: u32) -> u32 {
    let pll = pll_output_hz(regs, crystal_hz);
    if regs.read(cpm::CPCCR) & Cpccr::PCS.bits() != 0 {
        pll
    } else {
        pll / 2
    }
}

pub fn memory_clock_hz(regs: &mut dyn RegisterBus, crystal_hz: u32) -> u32 {
    let pll = pll_output_hz(regs, crystal_hz);
    let field = (regs.read(cpm::CPCCR) >> MDIV_SHIFT) & 0xF;
    pll / decode_divisor(field)
}
