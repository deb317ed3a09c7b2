//! Host-side doubles for the hardware and I/O collaborators.

use std::collections::{BTreeMap, VecDeque};

use zerocopy::AsBytes;

use crate::board::Console;
use crate::clock::Cppcr;
use crate::config::{self, SerialConsole};
use crate::handoff::{ControlTransfer, KernelArgv, KernelReturned};
use crate::hw::{cpm, Block, Delay, Reg, RegisterBus};
use crate::loader::MemoryWindow;
use crate::memtest::{RamProbe, SystemRam};
use crate::source::{KernelSource, LoadStatus, SourceDescriptor, SourceKind};
use crate::uimage::{kernel_header, HEADER_SIZE};

/// Simulated register file. Writes are stored and logged; reads return the
/// last stored value unless a script is queued for that register. CPPCR
/// reports lock once PLLEN is set and it has been polled often enough.
#[derive(Default)]
pub struct SimRegs {
    values: BTreeMap<Reg, u32>,
    scripts: BTreeMap<Reg, VecDeque<u32>>,
    log: Vec<(Reg, u32)>,
    lock_after: u32,
    polls: u32,
}

impl SimRegs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pll_lock_after(mut self, polls: u32) -> Self {
        self.lock_after = polls;
        self
    }

    /// Set a value without logging a write.
    pub fn preset(&mut self, reg: Reg, value: u32) {
        self.values.insert(reg, value);
    }

    /// Queue values returned by successive reads of `reg`.
    pub fn script(&mut self, reg: Reg, reads: impl IntoIterator<Item = u32>) {
        self.scripts.entry(reg).or_default().extend(reads);
    }

    pub fn last(&self, reg: Reg) -> Option<u32> {
        self.log.iter().rev().find(|(r, _)| *r == reg).map(|&(_, v)| v)
    }

    pub fn writes_to(&self, block: Block) -> Vec<(Reg, u32)> {
        self.log.iter().copied().filter(|(r, _)| r.block == block).collect()
    }

    pub fn writes_of(&self, reg: Reg) -> Vec<u32> {
        self.log.iter().filter(|(r, _)| *r == reg).map(|&(_, v)| v).collect()
    }

    pub fn log(&self) -> &[(Reg, u32)] {
        &self.log
    }

    pub fn pll_polls(&self) -> u32 {
        self.polls
    }

    /// Reads left in the script of `reg`.
    pub fn pending(&self, reg: Reg) -> usize {
        self.scripts.get(&reg).map_or(0, |q| q.len())
    }
}

impl RegisterBus for SimRegs {
    fn read(&mut self, reg: Reg) -> u32 {
        let stored = self.values.get(&reg).copied().unwrap_or(0);
        if reg == cpm::CPPCR {
            self.polls += 1;
            let enabled = stored & Cppcr::PLLEN.bits() != 0;
            return if enabled && self.polls >= self.lock_after {
                stored | Cppcr::PLLS.bits()
            } else {
                stored & !Cppcr::PLLS.bits()
            };
        }
        if let Some(v) = self.scripts.get_mut(&reg).and_then(|q| q.pop_front()) {
            return v;
        }
        stored
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.values.insert(reg, value);
        self.log.push((reg, value));
    }
}

/// Records every wait in microseconds instead of spinning.
#[derive(Default)]
pub struct RecordingDelay {
    pub waits: Vec<u32>,
}

impl Delay for RecordingDelay {
    fn udelay(&mut self, us: u32) {
        self.waits.push(us);
    }

    fn mdelay(&mut self, ms: u32) {
        self.waits.push(ms * 1000);
    }
}

/// Kernel source with a fixed answer.
pub struct ScriptedSource {
    desc: SourceDescriptor,
    status: LoadStatus,
    image: Vec<u8>,
    pub alt_requests: Vec<bool>,
}

fn descriptor(kind: SourceKind) -> SourceDescriptor {
    match kind {
        SourceKind::RemovableSd => config::SD_CARD,
        SourceKind::InternalMmc => config::INTERNAL_MMC,
        SourceKind::NandUbi => config::NAND_UBI,
        SourceKind::LegacyFirmware => config::LEGACY_FIRMWARE,
    }
}

impl ScriptedSource {
    /// Reports `status` without writing anything.
    pub fn new(kind: SourceKind, status: LoadStatus) -> Self {
        Self { desc: descriptor(kind), status, image: Vec::new(), alt_requests: Vec::new() }
    }

    /// Copies `image` into staging and reports it as primary or backup.
    pub fn with_image(kind: SourceKind, image: Vec<u8>, backup: bool) -> Self {
        let status = if backup { LoadStatus::Backup(image.len()) } else { LoadStatus::Primary(image.len()) };
        Self { desc: descriptor(kind), status, image, alt_requests: Vec::new() }
    }

    pub fn attempts(&self) -> usize {
        self.alt_requests.len()
    }
}

impl KernelSource for ScriptedSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.desc
    }

    fn load_kernel(&mut self, staging: &mut [u8], alt: bool) -> LoadStatus {
        self.alt_requests.push(alt);
        if self.image.len() > staging.len() {
            return LoadStatus::Error;
        }
        staging[..self.image.len()].copy_from_slice(&self.image);
        self.status
    }
}

/// A uImage: kernel header with `data size = header + body`, then the body.
pub fn image(load: u32, ep: u32, body: &[u8]) -> Vec<u8> {
    let h = kernel_header(load, ep, (HEADER_SIZE + body.len()) as u32, "Linux");
    let mut v = h.as_bytes().to_vec();
    v.extend_from_slice(body);
    v
}

/// RAM with a wiring fault on the probe path.
pub struct FaultyRam {
    words: Vec<u32>,
    mirror: Option<usize>,
    stuck_high: u32,
    window: Vec<u8>,
}

impl FaultyRam {
    /// An address line is missing: offsets wrap at `mirror` bytes.
    pub fn aliased(size: usize, mirror: usize) -> Self {
        Self { words: vec![0; size / 4], mirror: Some(mirror), stuck_high: 0, window: vec![0; size] }
    }

    /// Data bits in `mask` always read back as one.
    pub fn stuck_bit(size: usize, mask: u32) -> Self {
        Self { words: vec![0; size / 4], mirror: None, stuck_high: mask, window: vec![0; size] }
    }

    fn index(&self, offset: usize) -> usize {
        self.mirror.map_or(offset, |m| offset % m) / 4
    }
}

impl RamProbe for FaultyRam {
    fn write_word(&mut self, offset: usize, value: u32) {
        let i = self.index(offset);
        if let Some(w) = self.words.get_mut(i) {
            *w = value;
        }
    }

    fn read_word(&mut self, offset: usize) -> u32 {
        self.words.get(self.index(offset)).copied().unwrap_or(0) | self.stuck_high
    }
}

impl SystemRam for FaultyRam {
    fn window(&mut self) -> MemoryWindow<'_> {
        MemoryWindow::new(0xA000_0000, &mut self.window)
    }
}

/// Records the jump instead of taking it.
#[derive(Default)]
pub struct RecordingTransfer {
    pub entry: Option<u32>,
    pub argv: Vec<String>,
    pub argc: i32,
}

impl ControlTransfer for RecordingTransfer {
    fn transfer(&mut self, entry: u32, argv: &KernelArgv) -> KernelReturned {
        self.entry = Some(entry);
        self.argc = argv.argc();
        self.argv = argv.strings().map(String::from).collect();
        KernelReturned
    }
}

/// Remembers which UART was brought up.
#[derive(Default)]
pub struct RecordingConsole {
    pub inits: Vec<(u8, u32)>,
}

impl Console for RecordingConsole {
    fn init(&mut self, port: &SerialConsole) {
        self.inits.push((port.uart, port.baud));
    }
}
