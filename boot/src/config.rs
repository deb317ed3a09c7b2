//! config.rs — UBIBoot board profiles
//!
//! One [`BootConfig`] value describes everything that differs between
//! boards: clock targets, SDRAM part, pin muxing, optional peripherals,
//! kernel argument policy and boot source order. Profiles are `const` and
//! checked with [`BootConfig::validate`] at build time.

use crate::clock::{ClockRequest, Divisors};
use crate::gpio::{GpioPin, PinFunction, Port};
use crate::keys::KeyMap;
use crate::nand::NandTiming;
use crate::panel::I80Pins;
use crate::sdram::{BankCount, BusWidth, CasLatency, Geometry, SdramTimingProfile};
use crate::source::{RootDevice, SourceDescriptor, SourceKind};

/// Where the RAM size handed to the kernel comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamSize {
    FromGeometry,
    /// Board with more RAM than one chip select describes.
    FixedMib(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConsole {
    pub uart: u8,
    pub baud: u32,
    pub tx: PinFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    pub board: &'static str,
    pub clocks: ClockRequest,
    pub sdram: SdramTimingProfile,
    pub ram_size: RamSize,
    /// Peripheral pin muxing applied first thing.
    pub pin_functions: &'static [PinFunction],
    pub serial: Option<SerialConsole>,
    pub nand: Option<NandTiming>,
    /// UC8230 panel on the emulated i80 bus.
    pub uc8230_panel: Option<I80Pins>,
    /// Panel name passed to the kernel SLCD driver.
    pub slcd_panel: Option<&'static str>,
    pub backlight: Option<GpioPin>,
    /// The kernel can use memory above `low_mem_cap_mib`.
    pub highmem: bool,
    pub low_mem_cap_mib: u32,
    pub tty0_console: bool,
    pub init: Option<&'static str>,
    pub read_only_root: bool,
    /// Leave the kernel boot logo enabled.
    pub kernel_logo: bool,
    pub hw_variant: Option<&'static str>,
    pub keys: KeyMap,
    /// Priority order.
    pub sources: &'static [SourceKind],
    /// Also try the internal MMC.
    pub dual_mmc: bool,
    /// Offset of the image staging area inside the RAM window.
    pub staging_offset: usize,
    /// Return to the caller when every source failed instead of halting.
    pub return_on_failure: bool,
}

macro_rules! const_check {
    ($e:expr) => {
        if let Err(e) = $e {
            return Err(e);
        }
    };
}

impl BootConfig {
    pub const fn validate(&self) -> Result<(), &'static str> {
        const_check!(self.clocks.plan());
        const_check!(self.sdram.validate());
        if let Some(nand) = &self.nand {
            const_check!(nand.validate());
        }
        if self.uc8230_panel.is_some() && !self.clocks.panel_clock {
            return Err("panel configured without its pixel clock");
        }
        if self.low_mem_cap_mib == 0 {
            return Err("low memory cap is zero");
        }
        if let RamSize::FixedMib(mib) = self.ram_size {
            if mib == 0 {
                return Err("fixed RAM size is zero");
            }
            if mib >= 4096 {
                return Err("fixed RAM size exceeds 32-bit address space");
            }
        }
        if self.sources.is_empty() {
            return Err("no boot sources configured");
        }
        Ok(())
    }

    /// RAM size in bytes.
    pub const fn memory_size(&self) -> u32 {
        match self.ram_size {
            RamSize::FromGeometry => self.sdram.memory_size(),
            RamSize::FixedMib(mib) => mib << 20,
        }
    }
}

pub const SD_CARD: SourceDescriptor = SourceDescriptor {
    kind: SourceKind::RemovableSd,
    name: "SD card",
    device_id: 1,
    root: RootDevice::Block { device: "/dev/mmcblk0p1", fstype: "vfat", flags: None },
};

pub const INTERNAL_MMC: SourceDescriptor = SourceDescriptor {
    kind: SourceKind::InternalMmc,
    name: "internal MMC",
    device_id: 0,
    root: RootDevice::Block { device: "/dev/mmcblk1p1", fstype: "vfat", flags: None },
};

pub const NAND_UBI: SourceDescriptor = SourceDescriptor {
    kind: SourceKind::NandUbi,
    name: "NAND",
    device_id: 0,
    root: RootDevice::Ubi { volume: "rootfs", alt_volume: "rootfs_bak", mtd: Some("2") },
};

pub const LEGACY_FIRMWARE: SourceDescriptor = SourceDescriptor {
    kind: SourceKind::LegacyFirmware,
    name: "legacy firmware",
    device_id: 0,
    root: RootDevice::Firmware,
};

/// Hynix HY57V281620 pair, failsafe timings.
pub const RZX27_SDRAM: SdramTimingProfile = SdramTimingProfile {
    cas_latency: CasLatency::Three,
    tras_ns: 42,
    rcd_ns: 18,
    tpc_ns: 18,
    tref_ns: 15625,
    trwl_ns: 7,
    bus_width: BusWidth::Bits16,
    geometry: Geometry { rows: 13, cols: 9, banks: BankCount::Four },
    mrs_geometry: Geometry { rows: 11, cols: 9, banks: BankCount::Two },
};

const RZX27_PINS: &[PinFunction] = &[
    // NAND data/control.
    PinFunction::new(Port::C, 0x3630_0300, 0),
    // SDRAM address and data.
    PinFunction::new(Port::A, 0x0000_ffff, 0),
    PinFunction::new(Port::B, 0x033f_ffff, 0),
    // MSC1 (SD card).
    PinFunction::new(Port::D, 0x1c00_0000, 0),
];

pub const RZX27: BootConfig = BootConfig {
    board: "RZX-27",
    clocks: ClockRequest {
        crystal_hz: 12_000_000,
        cpu_hz: 360_000_000,
        divisors: Divisors::DEFAULT,
        panel_clock: true,
    },
    sdram: RZX27_SDRAM,
    ram_size: RamSize::FromGeometry,
    pin_functions: RZX27_PINS,
    serial: Some(SerialConsole { uart: 0, baud: 57600, tx: PinFunction::new(Port::C, 1 << 12, 1) }),
    nand: Some(NandTiming {
        strv: 1,
        taw: 3,
        tbp: 4,
        tah: 1,
        tas: 1,
        ready_busy: GpioPin::new(Port::C, 27),
    }),
    uc8230_panel: Some(I80Pins {
        reset: GpioPin::new(Port::D, 21),
        cs: GpioPin::new(Port::C, 13),
        rs: GpioPin::new(Port::D, 19),
        wr: GpioPin::new(Port::D, 20),
        rd: GpioPin::new(Port::D, 18),
        data: Port::D,
    }),
    slcd_panel: None,
    backlight: Some(GpioPin::new(Port::C, 15)),
    highmem: false,
    low_mem_cap_mib: 256,
    tty0_console: true,
    init: Some("/mininit-syspart"),
    read_only_root: false,
    kernel_logo: true,
    hw_variant: Some("rzx27"),
    // The alternate-boot buttons are not wired up on this board yet.
    keys: KeyMap::NONE,
    sources: &[SourceKind::RemovableSd, SourceKind::InternalMmc, SourceKind::NandUbi],
    dual_mmc: false,
    staging_offset: 0x0100_0000,
    return_on_failure: true,
};

const _: () = match RZX27.validate() {
    Ok(()) => (),
    Err(_) => panic!("RZX-27 board profile does not validate"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rzx27_profile() {
        assert_eq!(RZX27.validate(), Ok(()));
        assert_eq!(RZX27.memory_size(), 32 << 20);
        let plan = RZX27.clocks.plan().unwrap();
        assert_eq!(plan.lcd_div, Some(17));
    }

    #[test]
    fn broken_profiles_rejected() {
        let mut c = RZX27;
        c.clocks.divisors.apb = 9;
        assert!(c.validate().is_err());

        let mut c = RZX27;
        c.clocks.panel_clock = false;
        assert!(c.validate().is_err());

        let mut c = RZX27;
        c.sources = &[];
        assert!(c.validate().is_err());
    }

    #[test]
    fn fixed_ram_size() {
        let c = BootConfig { ram_size: RamSize::FixedMib(300), ..RZX27 };
        assert_eq!(c.memory_size() >> 20, 300);
    }

    #[test]
    fn fixed_ram_size_must_fit_in_32_bits() {
        let c = BootConfig { ram_size: RamSize::FixedMib(4095), ..RZX27 };
        assert_eq!(c.validate(), Ok(()));
        let c = BootConfig { ram_size: RamSize::FixedMib(4096), ..RZX27 };
        assert!(c.validate().is_err());
        let c = BootConfig { ram_size: RamSize::FixedMib(0), ..RZX27 };
        assert!(c.validate().is_err());
    }
}
