//! cmdline.rs — UBIBoot kernel parameter list
//!
//! [`KernelParams`] holds one field per logical argument slot; the boot flow
//! fills them in as it learns things (memory size, which source won, which
//! keys are held). [`KernelParams::finalize`] renders the slots in their
//! fixed order into an argv-style list. An empty slot produces no argument.

use core::fmt::{self, Write};

use arrayvec::{ArrayString, ArrayVec};

pub const MAX_ARGS: usize = 24;
pub const ARG_LEN: usize = 64;

/// Physical base of the second memory bank.
pub const HIGHMEM_BASE: u32 = 0x3000_0000;

pub type Arg = ArrayString<ARG_LEN>;
pub type KernelArgs = ArrayVec<Arg, MAX_ARGS>;

/// Memory handed to the kernel, in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySplit {
    pub low_mib: u32,
    /// Remainder above the low cap, when the platform can address it.
    pub high_mib: Option<u32>,
}

/// Cap low memory at `cap_mib`; anything above goes to the high bank when
/// `highmem` is set and is dropped otherwise.
pub fn split_memory(total_mib: u32, cap_mib: u32, highmem: bool) -> MemorySplit {
    let low_mib = total_mib.min(cap_mib);
    let rest = total_mib - low_mib;
    MemorySplit { low_mib, high_mib: (highmem && rest > 0).then_some(rest) }
}

/// How the root filesystem is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootName<'a> {
    Device(&'a str),
    UbiVolume(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootArgs<'a> {
    pub name: RootName<'a>,
    pub fstype: &'a str,
    pub flags: Option<&'a str>,
    pub wait: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConsoleArg {
    pub uart: u8,
    pub baud: u32,
}

/// Argument slots, in the order they are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelParams<'a> {
    pub exec: &'a str,
    pub memory: Option<MemorySplit>,
    /// SLCD panel name for the kernel framebuffer driver.
    pub panel: Option<&'a str>,
    pub ubi_mtd: Option<&'a str>,
    pub root: Option<RootArgs<'a>>,
    pub read_only: bool,
    pub init: Option<&'a str>,
    pub serial_console: Option<SerialConsoleArg>,
    pub tty0_console: bool,
    pub no_logo: bool,
    pub splash: bool,
    pub hw_variant: Option<&'a str>,
    pub kernel_bak: bool,
    pub rootfs_bak: bool,
}

fn push(args: &mut KernelArgs, a: fmt::Arguments<'_>) -> Result<(), &'static str> {
    let mut s = Arg::new();
    s.write_fmt(a).map_err(|_| "kernel argument too long")?;
    if s.is_empty() {
        return Ok(());
    }
    args.try_push(s).map_err(|_| "too many kernel arguments")
}

fn filled(slot: Option<&str>) -> Option<&str> {
    slot.filter(|s| !s.is_empty())
}

impl<'a> KernelParams<'a> {
    pub fn new(exec: &'a str) -> Self {
        Self { exec, ..Self::default() }
    }

    pub fn finalize(&self) -> Result<KernelArgs, &'static str> {
        let mut args = KernelArgs::new();
        let a = &mut args;

        push(a, format_args!("{}", self.exec))?;
        if let Some(mem) = self.memory {
            push(a, format_args!("mem=0x{:04x}M", mem.low_mib))?;
            if let Some(high) = mem.high_mib {
                push(a, format_args!("mem=0x{:04x}M@{:#010x}", high, HIGHMEM_BASE))?;
            }
        }
        if let Some(panel) = filled(self.panel) {
            push(a, format_args!("jz4740_slcd_panels.panel={}", panel))?;
        }
        if let Some(mtd) = filled(self.ubi_mtd) {
            push(a, format_args!("ubi.mtd={}", mtd))?;
        }
        if let Some(root) = self.root {
            match root.name {
                RootName::Device(dev) => push(a, format_args!("root={}", dev))?,
                RootName::UbiVolume(vol) => push(a, format_args!("root=ubi0:{}", vol))?,
            }
            if let Some(fstype) = filled(Some(root.fstype)) {
                push(a, format_args!("rootfstype={}", fstype))?;
            }
            if root.wait {
                push(a, format_args!("rootwait"))?;
            }
            if let Some(flags) = filled(root.flags) {
                push(a, format_args!("rootflags={}", flags))?;
            }
        }
        if self.read_only {
            push(a, format_args!("ro"))?;
        }
        if let Some(init) = filled(self.init) {
            push(a, format_args!("init={}", init))?;
        }
        if let Some(c) = self.serial_console {
            push(a, format_args!("console=ttyS{},{}", c.uart, c.baud))?;
        }
        if self.tty0_console {
            push(a, format_args!("console=tty0"))?;
        }
        if self.no_logo {
            push(a, format_args!("logo.nologo"))?;
        }
        if self.splash {
            push(a, format_args!("splash"))?;
        }
        if let Some(hw) = filled(self.hw_variant) {
            push(a, format_args!("hwvariant={}", hw))?;
        }
        if self.kernel_bak {
            push(a, format_args!("kernel_bak"))?;
        }
        if self.rootfs_bak {
            push(a, format_args!("rootfs_bak"))?;
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strs(args: &KernelArgs) -> Vec<&str> {
        args.iter().map(|a| a.as_str()).collect()
    }

    #[test]
    fn memory_split() {
        assert_eq!(split_memory(300, 256, true), MemorySplit { low_mib: 256, high_mib: Some(44) });
        assert_eq!(split_memory(300, 256, false), MemorySplit { low_mib: 256, high_mib: None });
        assert_eq!(split_memory(32, 256, true), MemorySplit { low_mib: 32, high_mib: None });
        assert_eq!(split_memory(256, 256, true), MemorySplit { low_mib: 256, high_mib: None });
    }

    #[test]
    fn full_list_in_slot_order() {
        let p = KernelParams {
            memory: Some(split_memory(300, 256, true)),
            panel: Some("ili9331"),
            ubi_mtd: Some("2"),
            root: Some(RootArgs { name: RootName::UbiVolume("rootfs"), fstype: "ubifs", flags: Some("bulk_read"), wait: true }),
            read_only: true,
            init: Some("/mininit-syspart"),
            serial_console: Some(SerialConsoleArg { uart: 0, baud: 57600 }),
            tty0_console: true,
            no_logo: true,
            splash: false,
            hw_variant: Some("rzx27"),
            kernel_bak: true,
            rootfs_bak: true,
            ..KernelParams::new("linux")
        };
        let args = p.finalize().unwrap();
        assert_eq!(
            strs(&args),
            vec![
                "linux",
                "mem=0x0100M",
                "mem=0x002cM@0x30000000",
                "jz4740_slcd_panels.panel=ili9331",
                "ubi.mtd=2",
                "root=ubi0:rootfs",
                "rootfstype=ubifs",
                "rootwait",
                "rootflags=bulk_read",
                "ro",
                "init=/mininit-syspart",
                "console=ttyS0,57600",
                "console=tty0",
                "logo.nologo",
                "hwvariant=rzx27",
                "kernel_bak",
                "rootfs_bak",
            ]
        );
    }

    #[test]
    fn empty_slots_are_omitted() {
        let p = KernelParams { hw_variant: Some(""), init: None, ..KernelParams::new("linux") };
        assert_eq!(strs(&p.finalize().unwrap()), vec!["linux"]);
    }

    #[test]
    fn empty_root_fstype_and_flags_are_omitted() {
        let p = KernelParams {
            root: Some(RootArgs { name: RootName::UbiVolume("rootfs"), fstype: "", flags: Some(""), wait: false }),
            ..KernelParams::new("linux")
        };
        assert_eq!(strs(&p.finalize().unwrap()), vec!["linux", "root=ubi0:rootfs"]);
    }

    #[test]
    fn block_root() {
        let p = KernelParams {
            root: Some(RootArgs { name: RootName::Device("/dev/mmcblk0p1"), fstype: "vfat", flags: None, wait: true }),
            ..KernelParams::new("linux")
        };
        assert_eq!(strs(&p.finalize().unwrap()), vec!["linux", "root=/dev/mmcblk0p1", "rootfstype=vfat", "rootwait"]);
    }

    #[test]
    fn overlong_argument_is_an_error() {
        let long = "x".repeat(ARG_LEN);
        let p = KernelParams { init: Some(long.as_str()), ..KernelParams::new("linux") };
        assert!(p.finalize().is_err());
    }
}
