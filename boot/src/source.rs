//! source.rs — UBIBoot boot sources and attempt outcomes
//!
//! A boot source is an external collaborator (FAT on SD/MMC, UBI on NAND,
//! a legacy firmware blob) that can drop raw image bytes into a staging
//! buffer. The loader only sees the [`KernelSource`] contract.

/// Which medium a source reads from. Also the priority vocabulary used by
/// board profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    RemovableSd,
    InternalMmc,
    NandUbi,
    LegacyFirmware,
}

/// How the kernel should find its root filesystem after booting from a
/// given source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootDevice {
    /// `root=<device> rootfstype=<fstype> rootwait`.
    Block {
        device: &'static str,
        fstype: &'static str,
        flags: Option<&'static str>,
    },
    /// `root=ubi0:<volume> rootfstype=ubifs`, with an optional `ubi.mtd=`.
    Ubi {
        volume: &'static str,
        alt_volume: &'static str,
        mtd: Option<&'static str>,
    },
    /// The image brings its own idea of a root device.
    Firmware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub name: &'static str,
    /// Device index handed to the backend (e.g. MSC controller).
    pub device_id: u8,
    pub root: RootDevice,
}

/// What a backend reports after trying to load a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// `n` bytes of image loaded from the primary slot.
    Primary(usize),
    /// Primary slot was unusable or deselected; `n` bytes from the backup slot.
    Backup(usize),
    /// Medium absent or no kernel on it.
    NotFound,
    /// Medium present but I/O failed.
    Error,
}

/// Return codes of the C loader backends.
pub const BACKEND_PRIMARY: i32 = 0;
pub const BACKEND_BACKUP: i32 = 1;
pub const BACKEND_NOT_FOUND: i32 = -1;

impl LoadStatus {
    /// Decode a backend return code; `size` is what it wrote to staging.
    pub fn from_backend(code: i32, size: usize) -> Self {
        match code {
            BACKEND_PRIMARY => LoadStatus::Primary(size),
            BACKEND_BACKUP => LoadStatus::Backup(size),
            BACKEND_NOT_FOUND => LoadStatus::NotFound,
            _ => LoadStatus::Error,
        }
    }
}

/// A kernel-locate backend.
pub trait KernelSource {
    fn descriptor(&self) -> SourceDescriptor;

    /// Load a raw uImage into `staging`. `alt` asks for the alternate kernel
    /// slot where the medium has one.
    fn load_kernel(&mut self, staging: &mut [u8], alt: bool) -> LoadStatus;
}

/// Outcome of one attempt, consumed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootAttemptResult {
    Succeeded {
        entry: u32,
        load: u32,
        end: u32,
        source: SourceDescriptor,
        from_backup: bool,
    },
    SourceUnavailable,
    DeviceError,
    ImageInvalid,
}

impl BootAttemptResult {
    pub fn describe(&self) -> &'static str {
        match self {
            BootAttemptResult::Succeeded { .. } => "kernel loaded",
            BootAttemptResult::SourceUnavailable => "no kernel found",
            BootAttemptResult::DeviceError => "device error",
            BootAttemptResult::ImageInvalid => "invalid kernel image",
        }
    }
}
