//! loader.rs — UBIBoot image relocation and per-source load attempts
//!
//! RAM is handed to the loader as a [`MemoryWindow`]: an uncached (kseg1)
//! view of physical memory. A source drops the raw uImage into a staging
//! area inside the window; the relocator then moves the payload to the
//! header's load address, also inside the window. Staging and load ranges
//! may overlap, so the copy is a move.
//!
//! Every offset derived from a header is bounds-checked against the window
//! before a single byte moves.

use crate::hw::kseg1;
use crate::source::{BootAttemptResult, KernelSource, LoadStatus};
use crate::uimage::{HeaderCheck, UImageHeader, HEADER_SIZE};

/// Uncached window over RAM, starting at kseg1 address `base`.
pub struct MemoryWindow<'a> {
    base: u32,
    bytes: &'a mut [u8],
}

impl<'a> MemoryWindow<'a> {
    pub fn new(base: u32, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// # Safety
    /// `[base, base + len)` must be RAM that nothing else references for
    /// the lifetime of the window.
    pub unsafe fn from_raw(base: u32, len: usize) -> Self {
        Self { base, bytes: core::slice::from_raw_parts_mut(base as usize as *mut u8, len) }
    }

    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Window offset of `addr`, after mapping it into kseg1.
    pub fn offset_of(&self, addr: u32) -> Option<usize> {
        let off = kseg1(addr).checked_sub(self.base)? as usize;
        (off < self.bytes.len()).then_some(off)
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

/// Where the payload ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Header entry point, as given.
    pub entry: u32,
    /// Uncached load address.
    pub load: u32,
    pub payload_size: u32,
    /// First address past the payload.
    pub end: u32,
}

/// ImageRelocator: validate the header at `image_offset` and move the
/// `data_size - HEADER_SIZE` payload bytes that follow it to the load
/// address.
pub fn relocate(
    window: &mut MemoryWindow<'_>,
    image_offset: usize,
    data_size: usize,
) -> Result<Relocation, &'static str> {
    let image_end = image_offset.checked_add(data_size).ok_or("image size overflow")?;
    if image_end > window.len() {
        return Err("image extends past RAM window");
    }
    if data_size < HEADER_SIZE {
        return Err("image smaller than its header");
    }

    let header = UImageHeader::parse(&window.bytes()[image_offset..]).ok_or("header truncated")?;
    if header.check() != HeaderCheck::Valid {
        return Err("invalid uImage header");
    }

    let payload_size = data_size - HEADER_SIZE;
    let load = kseg1(header.load_address());
    let dst = window.offset_of(load).ok_or("load address outside RAM window")?;
    let dst_end = dst.checked_add(payload_size).ok_or("payload size overflow")?;
    if dst_end > window.len() {
        return Err("payload does not fit below end of RAM");
    }

    let src = image_offset + HEADER_SIZE;
    window.bytes_mut().copy_within(src..src + payload_size, dst);

    let payload_size = payload_size as u32;
    Ok(Relocation {
        entry: header.entry_point(),
        load,
        payload_size,
        end: load + payload_size,
    })
}

/// Ask one source for an image and relocate it.
pub fn attempt(
    source: &mut dyn KernelSource,
    window: &mut MemoryWindow<'_>,
    staging_offset: usize,
    alt_kernel: bool,
) -> BootAttemptResult {
    let desc = source.descriptor();
    if staging_offset >= window.len() {
        log::error!(target: "loader", "staging area outside RAM window");
        return BootAttemptResult::DeviceError;
    }

    let status = source.load_kernel(&mut window.bytes_mut()[staging_offset..], alt_kernel);
    let (size, from_backup) = match status {
        LoadStatus::Primary(n) => (n, false),
        LoadStatus::Backup(n) => (n, true),
        LoadStatus::NotFound => return BootAttemptResult::SourceUnavailable,
        LoadStatus::Error => return BootAttemptResult::DeviceError,
    };

    match relocate(window, staging_offset, size) {
        Ok(r) => {
            log::info!(
                target: "loader",
                "{}: {} bytes at {:#010x}, entry {:#010x}",
                desc.name,
                r.payload_size,
                r.load,
                r.entry
            );
            BootAttemptResult::Succeeded { entry: r.entry, load: r.load, end: r.end, source: desc, from_backup }
        }
        Err(e) => {
            log::warn!(target: "loader", "{}: {}", desc.name, e);
            BootAttemptResult::ImageInvalid
        }
    }
}
