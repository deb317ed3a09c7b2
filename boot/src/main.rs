//! UBIBoot board image.
//!
//! `start.S` sets up a stack and calls [`c_main`]. The FAT, MMC and UBI
//! readers plus the UART driver are C objects linked alongside; this file
//! adapts them to the library traits and runs the boot flow.

#![no_std]
#![no_main]
#![cfg_attr(target_arch = "mips", feature(asm_experimental_arch))]

use core::panic::PanicInfo;

use ubiboot::board::Console;
use ubiboot::config::{SerialConsole, INTERNAL_MMC, NAND_UBI, SD_CARD};
use ubiboot::handoff::{self, ControlTransfer, KernelArgv, KernelReturned};
use ubiboot::hw::{kseg1, Mmio, SpinDelay};
use ubiboot::loader::MemoryWindow;
use ubiboot::logger::{self, ByteSink};
use ubiboot::source::{KernelSource, LoadStatus, SourceDescriptor};
use ubiboot::{nand, BootOrchestrator, BootState, Platform, RZX27};

extern "C" {
    fn serial_init(uart: u32, baud: u32);
    fn serial_putc(c: u8);

    fn mmc_init(id: u32) -> i32;
    fn mmc_load_kernel(id: u32, dest: *mut u8, capacity: usize, alt: i32, size: *mut usize) -> i32;

    fn ubi_load_kernel(dest: *mut u8, capacity: usize, alt: i32, size: *mut usize) -> i32;

    fn jz_flush_dcache();
    fn jz_flush_icache();
}

const RAM_BASE: u32 = 0x8000_0000;

struct Uart;

impl ByteSink for Uart {
    fn put(&mut self, byte: u8) {
        // SAFETY: the UART is initialised by `SerialPort::init` before the
        // logger gets any output.
        unsafe { serial_putc(byte) }
    }
}

static mut UART: Uart = Uart;

struct SerialPort;

impl Console for SerialPort {
    fn init(&mut self, port: &SerialConsole) {
        // SAFETY: the UART clock is ungated before `Console::init` runs.
        unsafe { serial_init(port.uart as u32, port.baud) }
    }
}

/// FAT on an MSC controller.
struct MmcSource {
    desc: SourceDescriptor,
}

impl KernelSource for MmcSource {
    fn descriptor(&self) -> SourceDescriptor {
        self.desc
    }

    fn load_kernel(&mut self, staging: &mut [u8], alt: bool) -> LoadStatus {
        let id = self.desc.device_id as u32;
        let mut size = 0usize;
        // SAFETY: the backend writes at most `staging.len()` bytes.
        unsafe {
            if mmc_init(id) != 0 {
                return LoadStatus::NotFound;
            }
            let code = mmc_load_kernel(id, staging.as_mut_ptr(), staging.len(), alt as i32, &mut size);
            LoadStatus::from_backend(code, size)
        }
    }
}

/// UBI volume on the NAND. The controller is set up by the boot flow.
struct UbiSource;

impl KernelSource for UbiSource {
    fn descriptor(&self) -> SourceDescriptor {
        NAND_UBI
    }

    fn load_kernel(&mut self, staging: &mut [u8], alt: bool) -> LoadStatus {
        let mut size = 0usize;
        // SAFETY: as for `MmcSource`.
        let code = unsafe { ubi_load_kernel(staging.as_mut_ptr(), staging.len(), alt as i32, &mut size) };
        LoadStatus::from_backend(code, size)
    }
}

/// Called by the C NAND driver between commands.
#[no_mangle]
pub extern "C" fn nand_wait_ready() {
    if let Some(timing) = RZX27.nand {
        // SAFETY: single-threaded; the boot flow is blocked inside the
        // backend while this runs.
        let mut regs = unsafe { Mmio::new() };
        nand::wait_ready(&mut regs, timing.ready_busy);
    }
}

#[no_mangle]
pub extern "C" fn udelay(us: u32) {
    use ubiboot::hw::Delay;
    SpinDelay::for_cpu(RZX27.clocks.cpu_hz).udelay(us);
}

/// Clear the watch-pending bit in CP0 Cause; the kernel takes a watch
/// exception on its first instruction otherwise.
#[cfg(target_arch = "mips")]
unsafe fn clear_watch_pending() {
    core::arch::asm!(
        "mfc0 {tmp}, $13",
        "and {tmp}, {tmp}, {mask}",
        "mtc0 {tmp}, $13",
        tmp = out(reg) _,
        mask = in(reg) !0x0040_0000u32,
    );
}

#[cfg(not(target_arch = "mips"))]
unsafe fn clear_watch_pending() {}

struct Jump;

impl ControlTransfer for Jump {
    fn transfer(&mut self, entry: u32, argv: &KernelArgv) -> KernelReturned {
        // SAFETY: the orchestrator only transfers to a relocated, checked image.
        unsafe {
            jz_flush_dcache();
            jz_flush_icache();
            clear_watch_pending();
            handoff::jump(entry, argv)
        }
    }
}

#[no_mangle]
pub extern "C" fn c_main() {
    let config = &RZX27;

    // SAFETY: `c_main` runs once; nothing else touches `UART`.
    let _ = logger::install(unsafe { &mut *core::ptr::addr_of_mut!(UART) });

    // SAFETY: bare metal, one bus owner.
    let mut regs = unsafe { Mmio::new() };
    let mut delay = SpinDelay::for_cpu(config.clocks.cpu_hz);
    let mut console = SerialPort;

    let window_len = config.memory_size().min(config.low_mem_cap_mib << 20) as usize;
    // SAFETY: RAM below the low-memory cap; this image runs from cache-locked
    // SRAM and its stack sits above what the window covers.
    let mut ram = unsafe { MemoryWindow::from_raw(kseg1(RAM_BASE), window_len) };

    let mut sd = MmcSource { desc: SD_CARD };
    let mut mmc = MmcSource { desc: INTERNAL_MMC };
    let mut ubi = UbiSource;
    let mut sources: [&mut dyn KernelSource; 3] = [&mut sd, &mut mmc, &mut ubi];
    let mut jump = Jump;

    let mut platform = Platform {
        regs: &mut regs,
        delay: &mut delay,
        console: &mut console,
        ram: &mut ram,
        sources: &mut sources,
        handoff: &mut jump,
    };
    let state = BootOrchestrator::new(config).run(&mut platform);

    if let BootState::Halted(reason) = state {
        log::error!(target: "boot", "halted: {}", reason.describe());
    }
    if !config.return_on_failure {
        loop {
            core::hint::spin_loop();
        }
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log::error!(target: "panic", "{}", info);
    loop {
        core::hint::spin_loop();
    }
}
