//! boot.rs — UBIBoot boot orchestrator
//!
//! ```text
//! Init ──► ClockAndMemoryReady ──► MemoryVerified ──► TryingSource(0)
//!                │                       │                 │ unavailable / invalid / I/O error
//!                ▼                       ▼                 ▼
//!             Halted                  Halted          TryingSource(1) ... ──► Halted
//!                                                          │ loaded
//!                                                          ▼
//!                                   Finalizing ──► TransferringControl
//! ```
//!
//! Sources are tried once each, in the configured order, and the first
//! one that yields a relocatable image wins. Keys are sampled once, after
//! the RAM check, and only shape what is asked of the sources and what
//! goes on the kernel command line.

use arrayvec::ArrayVec;

use crate::board::{self, Console};
use crate::cmdline::{split_memory, KernelParams, RootArgs, RootName, SerialConsoleArg};
use crate::config::BootConfig;
use crate::handoff::{ControlTransfer, KernelArgv};
use crate::hw::{Delay, RegisterBus};
use crate::keys::KeySelection;
use crate::loader;
use crate::memtest::{self, MemCheck, SystemRam};
use crate::nand;
use crate::source::{BootAttemptResult, KernelSource, RootDevice, SourceDescriptor, SourceKind};
use crate::ui;

const HISTORY_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Board profile or bring-up parameters are unusable.
    Config(&'static str),
    MemoryFailed { offset: usize },
    SourcesExhausted,
    /// The last source tried failed with an I/O error.
    DeviceError(SourceKind),
    ArgumentOverflow(&'static str),
    KernelReturned,
}

impl HaltReason {
    pub fn describe(&self) -> &'static str {
        match *self {
            HaltReason::Config(e) => e,
            HaltReason::MemoryFailed { .. } => "RAM check failed",
            HaltReason::SourcesExhausted => "no bootable kernel found",
            HaltReason::DeviceError(_) => "last boot device failed",
            HaltReason::ArgumentOverflow(e) => e,
            HaltReason::KernelReturned => "kernel returned to the loader",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Init,
    ClockAndMemoryReady,
    MemoryVerified,
    /// Index into the configured source order.
    TryingSource(usize),
    Finalizing,
    TransferringControl,
    Halted(HaltReason),
}

/// Everything the boot flow drives.
pub struct Platform<'a, 'b> {
    pub regs: &'a mut dyn RegisterBus,
    pub delay: &'a mut dyn Delay,
    pub console: &'a mut dyn Console,
    pub ram: &'a mut dyn SystemRam,
    pub sources: &'a mut [&'b mut dyn KernelSource],
    pub handoff: &'a mut dyn ControlTransfer,
}

/// A source that produced an image.
struct Loaded {
    entry: u32,
    source: SourceDescriptor,
    from_backup: bool,
}

pub struct BootOrchestrator<'c> {
    config: &'c BootConfig,
    state: BootState,
    history: ArrayVec<BootState, HISTORY_LEN>,
}

impl<'c> BootOrchestrator<'c> {
    pub fn new(config: &'c BootConfig) -> Self {
        let mut history = ArrayVec::new();
        history.push(BootState::Init);
        Self { config, state: BootState::Init, history }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> &[BootState] {
        &self.history
    }

    fn enter(&mut self, state: BootState) {
        log::debug!(target: "boot", "{:?}", state);
        self.state = state;
        let _ = self.history.try_push(state);
    }

    fn halt(&mut self, reason: HaltReason) -> BootState {
        ui::display_failure(reason.describe());
        self.enter(BootState::Halted(reason));
        self.state
    }

    /// Run the whole flow. Returns only when the boot failed, or when the
    /// transfer came back, which is reported as a halt.
    pub fn run(&mut self, p: &mut Platform<'_, '_>) -> BootState {
        let cfg = self.config;

        let bring_up = match board::init(cfg, p.regs, p.delay, p.console) {
            Ok(b) => b,
            Err(e) => return self.halt(HaltReason::Config(e)),
        };
        ui::draw_boot_banner(cfg.board);
        self.enter(BootState::ClockAndMemoryReady);

        let check_size = (bring_up.memory_size as usize).min(p.ram.window().len());
        if let MemCheck::Failed { offset, expected, found } = memtest::check(&mut *p.ram, check_size) {
            log::error!(target: "memtest", "at {:#x}: wrote {:#010x}, read {:#010x}", offset, expected, found);
            return self.halt(HaltReason::MemoryFailed { offset });
        }
        self.enter(BootState::MemoryVerified);

        let keys = KeySelection::sample(p.regs, &cfg.keys);

        let loaded = match self.try_sources(p, keys) {
            Ok(l) => l,
            Err(reason) => return self.halt(reason),
        };

        self.enter(BootState::Finalizing);
        let params = self.kernel_params(&loaded, keys, bring_up.memory_size);
        let args = match params.finalize() {
            Ok(a) => a,
            Err(e) => return self.halt(HaltReason::ArgumentOverflow(e)),
        };
        let argv = KernelArgv::new(&args);

        self.enter(BootState::TransferringControl);
        ui::announce_handoff(loaded.entry);
        p.handoff.transfer(loaded.entry, &argv);
        self.halt(HaltReason::KernelReturned)
    }

    fn try_sources(&mut self, p: &mut Platform<'_, '_>, keys: KeySelection) -> Result<Loaded, HaltReason> {
        let cfg = self.config;
        let mut nand_ready = false;
        let mut last = None;

        for (i, &kind) in cfg.sources.iter().enumerate() {
            if kind == SourceKind::InternalMmc && !cfg.dual_mmc {
                continue;
            }
            let Some(source) = p.sources.iter_mut().find(|s| s.descriptor().kind == kind) else {
                log::debug!(target: "boot", "no backend for {:?}", kind);
                continue;
            };
            self.enter(BootState::TryingSource(i));

            if kind == SourceKind::NandUbi && !nand_ready {
                if let Some(timing) = &cfg.nand {
                    nand::init(p.regs, timing);
                }
                nand_ready = true;
            }

            let mut window = p.ram.window();
            let result = loader::attempt(&mut **source, &mut window, cfg.staging_offset, keys.alt_kernel);
            match result {
                BootAttemptResult::Succeeded { entry, source, from_backup, .. } => {
                    return Ok(Loaded { entry, source, from_backup });
                }
                other => {
                    log::warn!(target: "boot", "{}: {}", source.descriptor().name, other.describe());
                    last = Some((kind, other));
                }
            }
        }

        match last {
            Some((kind, BootAttemptResult::DeviceError)) => Err(HaltReason::DeviceError(kind)),
            _ => Err(HaltReason::SourcesExhausted),
        }
    }

    fn kernel_params(&self, loaded: &Loaded, keys: KeySelection, memory_size: u32) -> KernelParams<'static> {
        let cfg = self.config;
        let mut params = KernelParams::new("linux");

        params.memory = Some(split_memory(memory_size >> 20, cfg.low_mem_cap_mib, cfg.highmem));
        params.panel = cfg.slcd_panel;
        match loaded.source.root {
            RootDevice::Block { device, fstype, flags } => {
                params.root = Some(RootArgs { name: RootName::Device(device), fstype, flags, wait: true });
            }
            RootDevice::Ubi { volume, alt_volume, mtd } => {
                let vol = if keys.alt_rootfs { alt_volume } else { volume };
                params.root = Some(RootArgs { name: RootName::UbiVolume(vol), fstype: "ubifs", flags: None, wait: false });
                params.ubi_mtd = mtd;
            }
            RootDevice::Firmware => {}
        }
        params.read_only = cfg.read_only_root;
        params.init = cfg.init;
        params.serial_console = cfg.serial.map(|s| SerialConsoleArg { uart: s.uart, baud: s.baud });
        params.tty0_console = cfg.tty0_console;
        params.no_logo = !cfg.kernel_logo;
        params.splash = cfg.kernel_logo && !keys.plain_logo;
        params.hw_variant = cfg.hw_variant;
        params.kernel_bak = loaded.from_backup;
        params.rootfs_bak = keys.alt_rootfs;

        log::info!(
            target: "boot",
            "booting from {}{}",
            loaded.source.name,
            if loaded.from_backup { " (backup kernel)" } else { "" }
        );
        params
    }
}
