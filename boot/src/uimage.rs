//! uimage.rs — UBIBoot uImage header parsing + validation
//!
//! Layout (all multi-byte fields big-endian on the wire):
//!   +----------------------+ 0
//!   | magic = 0x27051956   | 4
//!   | header crc           | 4
//!   | timestamp            | 4
//!   | data size            | 4
//!   | load address         | 4
//!   | entry point          | 4
//!   | data crc             | 4
//!   | os / arch / type / comp | 4 x u8
//!   | name (NUL padded)    | 32
//!   +----------------------+ 64
//!
//! Validation is all-or-nothing: the caller only learns `Valid` or
//! `Invalid`, never which field was wrong.

use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, Unaligned};

pub const UIMAGE_MAGIC: u32 = 0x2705_1956;

pub const IH_OS_LINUX: u8 = 5;
pub const IH_ARCH_MIPS: u8 = 5;
pub const IH_TYPE_KERNEL: u8 = 2;
pub const IH_COMP_NONE: u8 = 0;

/// On-wire uImage header.
#[repr(C)]
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
pub struct UImageHeader {
    pub magic: U32<BigEndian>,
    pub hcrc: U32<BigEndian>,
    pub time: U32<BigEndian>,
    pub size: U32<BigEndian>,
    pub load: U32<BigEndian>,
    pub ep: U32<BigEndian>,
    pub dcrc: U32<BigEndian>,
    pub os: u8,
    pub arch: u8,
    pub image_type: u8,
    pub comp: u8,
    pub name: [u8; 32],
}

pub const HEADER_SIZE: usize = core::mem::size_of::<UImageHeader>();

const _: () = assert!(HEADER_SIZE == 64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    Valid,
    Invalid,
}

impl UImageHeader {
    /// Read a header from the front of `bytes`; `None` if too short.
    #[inline]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes)
    }

    pub fn check(&self) -> HeaderCheck {
        let ok = self.magic.get() == UIMAGE_MAGIC
            && self.os == IH_OS_LINUX
            && self.arch == IH_ARCH_MIPS
            && self.image_type == IH_TYPE_KERNEL
            && self.comp == IH_COMP_NONE;
        if ok {
            HeaderCheck::Valid
        } else {
            HeaderCheck::Invalid
        }
    }

    #[inline]
    pub fn load_address(&self) -> u32 {
        self.load.get()
    }

    #[inline]
    pub fn entry_point(&self) -> u32 {
        self.ep.get()
    }

    #[inline]
    pub fn data_size(&self) -> u32 {
        self.size.get()
    }

    /// Image name up to the first NUL; informational only.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        core::str::from_utf8(&self.name[..end]).unwrap_or("?")
    }
}

/// ImageValidator. Short input is just another invalid header.
pub fn validate(header_bytes: &[u8]) -> HeaderCheck {
    match UImageHeader::parse(header_bytes) {
        Some(h) => h.check(),
        None => HeaderCheck::Invalid,
    }
}

#[cfg(test)]
pub(crate) fn kernel_header(load: u32, ep: u32, size: u32, name: &str) -> UImageHeader {
    let mut n = [0u8; 32];
    n[..name.len()].copy_from_slice(name.as_bytes());
    UImageHeader {
        magic: U32::new(UIMAGE_MAGIC),
        hcrc: U32::new(0),
        time: U32::new(0x5F00_0000),
        size: U32::new(size),
        load: U32::new(load),
        ep: U32::new(ep),
        dcrc: U32::new(0),
        os: IH_OS_LINUX,
        arch: IH_ARCH_MIPS,
        image_type: IH_TYPE_KERNEL,
        comp: IH_COMP_NONE,
        name: n,
    }
}
