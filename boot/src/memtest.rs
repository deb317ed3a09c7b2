//! memtest.rs — UBIBoot RAM sanity check
//!
//! A write-then-read-back sweep over the reported memory size, run after
//! SDRAM bring-up and before anything is loaded. Every word address that
//! is a power of two is probed (catches stuck or aliased address lines),
//! plus a strided sweep across the whole size (catches dead banks). The
//! pattern is derived from the offset so aliasing shows up as a mismatch;
//! a second pass writes the complement to catch stuck data bits.

use crate::loader::MemoryWindow;

/// Number of strided probe points across the checked size.
pub const SWEEP_POINTS: usize = 1024;

const SEED: u32 = 0x5AA5_C33C;

/// Word access to RAM under test.
pub trait RamProbe {
    fn write_word(&mut self, offset: usize, value: u32);
    fn read_word(&mut self, offset: usize) -> u32;
}

/// RAM the boot flow checks and then loads into.
pub trait SystemRam: RamProbe {
    fn window(&mut self) -> MemoryWindow<'_>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemCheck {
    Passed,
    Failed { offset: usize, expected: u32, found: u32 },
}

#[inline]
fn pattern(offset: usize, invert: bool) -> u32 {
    let p = (offset as u32).rotate_left(7) ^ SEED;
    if invert {
        !p
    } else {
        p
    }
}

/// Probe offsets for `size` bytes: 0, each power of two, then the sweep.
fn probe_offsets(size: usize) -> impl Iterator<Item = usize> {
    let words = size / 4;
    let powers = core::iter::successors(Some(4usize), |&o| o.checked_mul(2)).take_while(move |&o| o + 4 <= size);
    let step = ((words / SWEEP_POINTS).max(1)) * 4;
    let sweep = (0..size.saturating_sub(3)).step_by(step).filter(|o| !o.is_power_of_two());
    core::iter::once(0).filter(move |_| size >= 4).chain(powers).chain(sweep)
}

/// Check `size` bytes of RAM.
pub fn check<R: RamProbe + ?Sized>(ram: &mut R, size: usize) -> MemCheck {
    for invert in [false, true] {
        for off in probe_offsets(size) {
            ram.write_word(off, pattern(off, invert));
        }
        for off in probe_offsets(size) {
            let expected = pattern(off, invert);
            let found = ram.read_word(off);
            if found != expected {
                return MemCheck::Failed { offset: off, expected, found };
            }
        }
    }
    MemCheck::Passed
}

impl RamProbe for MemoryWindow<'_> {
    fn write_word(&mut self, offset: usize, value: u32) {
        let bytes = self.bytes_mut();
        if offset + 4 <= bytes.len() {
            // SAFETY: in bounds; volatile so the compiler keeps every probe.
            unsafe { core::ptr::write_volatile(bytes.as_mut_ptr().add(offset) as *mut [u8; 4], value.to_ne_bytes()) }
        }
    }

    fn read_word(&mut self, offset: usize) -> u32 {
        let bytes = self.bytes();
        if offset + 4 > bytes.len() {
            return 0;
        }
        // SAFETY: in bounds, see `write_word`.
        u32::from_ne_bytes(unsafe { core::ptr::read_volatile(bytes.as_ptr().add(offset) as *const [u8; 4]) })
    }
}

impl SystemRam for MemoryWindow<'_> {
    fn window(&mut self) -> MemoryWindow<'_> {
        let base = self.base();
        MemoryWindow::new(base, self.bytes_mut())
    }
}
