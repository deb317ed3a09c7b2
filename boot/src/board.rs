//! board.rs — UBIBoot board bring-up
//!
//! Order matters and follows the hardware's needs:
//!   pins → UART clock + console → panel → PLL → SDRAM → MMC clocks
//!
//! The console comes up on the crystal clock so the PLL and SDRAM lines
//! can be reported; the panel is reset early because it needs a long
//! power-on delay anyway.

use crate::clock::{self, ClockPlan, MSC_HZ};
use crate::config::{BootConfig, SerialConsole};
use crate::gpio;
use crate::hw::{cpm, Delay, RegisterBus};
use crate::panel;
use crate::sdram::{self, DmcrPlan};

/// UART setup, provided by the serial backend.
pub trait Console {
    fn init(&mut self, port: &SerialConsole);
}

/// What bring-up produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUp {
    pub clock: ClockPlan,
    pub sdram: DmcrPlan,
    pub pll_hz: u32,
    pub memory_clock_hz: u32,
    /// Bytes.
    pub memory_size: u32,
    pub panel_id: Option<u16>,
}

pub fn init(
    config: &BootConfig,
    regs: &mut dyn RegisterBus,
    delay: &mut dyn Delay,
    console: &mut dyn Console,
) -> Result<BringUp, &'static str> {
    for pins in config.pin_functions {
        pins.apply(regs);
    }
    if let Some(nand) = &config.nand {
        let rb = nand.ready_busy;
        gpio::as_input(regs, rb.port, rb.mask());
        gpio::disable_pull(regs, rb);
    }

    if let Some(serial) = &config.serial {
        serial.tx.apply(regs);
        regs.clear_bits(cpm::CLKGR, cpm::GATE_UART0);
        console.init(serial);
    }

    let panel_id = match config.uc8230_panel {
        Some(pins) => {
            regs.clear_bits(cpm::CLKGR, cpm::GATE_LCD);
            Some(panel::init_uc8230(regs, delay, pins))
        }
        None => None,
    };

    if let Some(bl) = config.backlight {
        gpio::set(regs, bl);
        gpio::as_output(regs, bl.port, bl.mask());
    }

    log::debug!(target: "clock", "waiting for PLL lock");
    let clock = clock::compute_and_apply(&config.clocks, regs)?;
    let crystal = config.clocks.crystal_hz;
    let pll_hz = clock::pll_output_hz(regs, crystal);
    log::info!(target: "clock", "PLL running at {} MHz", pll_hz / 1_000_000);

    let memory_clock_hz = clock::memory_clock_hz(regs, crystal);
    let sdram = sdram::configure(&config.sdram, memory_clock_hz, regs, delay)?;
    let memory_size = config.memory_size();
    log::info!(target: "sdram", "SDRAM running at {} MHz", memory_clock_hz / 1_000_000);
    log::info!(target: "sdram", "SDRAM size is {} MiB", memory_size >> 20);

    regs.clear_bits(cpm::CLKGR, cpm::GATE_MSC0 | cpm::GATE_MSC1);
    let msc_div = clock::pllout2_hz(regs, crystal) / MSC_HZ - 1;
    regs.write(cpm::MSCCDR, msc_div);

    config.keys.configure(regs);

    Ok(BringUp { clock, sdram, pll_hz, memory_clock_hz, memory_size, panel_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RZX27;
    use crate::gpio::{port_reg, Port};
    use crate::hw::{emc, Block};
    use crate::testing::{RecordingConsole, RecordingDelay, SimRegs};

    fn no_panel() -> BootConfig {
        BootConfig { uc8230_panel: None, ..RZX27 }
    }

    #[test]
    fn rzx27_bring_up() {
        let mut regs = SimRegs::new();
        regs.preset(cpm::CLKGR, !0);
        let mut delay = RecordingDelay::default();
        let mut console = RecordingConsole::default();

        let b = init(&no_panel(), &mut regs, &mut delay, &mut console).unwrap();
        assert_eq!(b.pll_hz, 360_000_000);
        assert_eq!(b.memory_clock_hz, 120_000_000);
        assert_eq!(b.memory_size, 32 << 20);
        assert_eq!(b.panel_id, None);
        assert!(b.clock.locked);

        assert_eq!(console.inits, vec![(0, 57600)]);
        let gated = regs.last(cpm::CLKGR).unwrap();
        assert_eq!(gated & (cpm::GATE_UART0 | cpm::GATE_MSC0 | cpm::GATE_MSC1), 0);
        assert_eq!(regs.last(cpm::MSCCDR), Some(14));
        assert_eq!(regs.last(emc::DMCR), Some(b.sdram.full | 0x0180_0000));
    }

    #[test]
    fn console_comes_up_before_pll() {
        let mut regs = SimRegs::new();
        let mut delay = RecordingDelay::default();
        let mut console = RecordingConsole::default();
        init(&no_panel(), &mut regs, &mut delay, &mut console).unwrap();

        let log = regs.log();
        let uart_tx = log.iter().position(|(r, v)| *r == port_reg(Port::C, 0x54) && *v == 1 << 12).unwrap();
        let pll = log.iter().position(|(r, _)| *r == cpm::CPPCR).unwrap();
        let first_emc = log.iter().position(|(r, _)| r.block == Block::Emc).unwrap();
        assert!(uart_tx < pll && pll < first_emc);
    }

    #[test]
    fn clock_error_stops_bring_up() {
        let mut regs = SimRegs::new();
        let mut delay = RecordingDelay::default();
        let mut console = RecordingConsole::default();
        let mut cfg = no_panel();
        cfg.clocks.cpu_hz = 363_000_000;
        assert!(init(&cfg, &mut regs, &mut delay, &mut console).is_err());
        assert!(regs.writes_to(Block::Emc).is_empty());
    }
}
