//! handoff.rs — UBIBoot kernel launch interface
//!
//! The kernel is entered like a C `main`:
//!
//! ```text
//! entry(argc, argv, envp = NULL, auxv = NULL)
//! ```
//!
//! `argv` is a NULL-terminated array of pointers to NUL-terminated strings.
//! [`KernelArgv`] owns the string storage; the pointer array is built by
//! [`KernelArgv::pointers`] on the stack of whoever performs the jump, so
//! it lives exactly as long as the (never returning) call.
//!
//! Control transfer sits behind [`ControlTransfer`]. Only a test double
//! ever comes back from `transfer`; on hardware a return means the stack
//! or the loaded image is corrupt.

use arrayvec::{ArrayString, ArrayVec};

use crate::cmdline::{KernelArgs, ARG_LEN, MAX_ARGS};

/// C view of the kernel entry point.
pub type KernelEntry = unsafe extern "C" fn(i32, *const *const u8, *const *const u8, *const i32) -> !;

/// Marker returned when a transfer came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelReturned;

/// Argument strings with their NUL terminators.
pub struct KernelArgv {
    args: ArrayVec<ArrayString<{ ARG_LEN + 1 }>, MAX_ARGS>,
}

impl KernelArgv {
    pub fn new(list: &KernelArgs) -> Self {
        let mut args = ArrayVec::new();
        for a in list {
            let mut s = ArrayString::new();
            // Capacity is ARG_LEN + 1 and `a` holds at most ARG_LEN bytes.
            s.push_str(a);
            s.push('\0');
            args.push(s);
        }
        Self { args }
    }

    pub fn argc(&self) -> i32 {
        self.args.len() as i32
    }

    /// Argument text without terminators.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|s| s.trim_end_matches('\0'))
    }

    /// `argv` pointer array, NULL-terminated. Valid while `self` is borrowed.
    pub fn pointers(&self) -> ArrayVec<*const u8, { MAX_ARGS + 1 }> {
        let mut ptrs: ArrayVec<*const u8, { MAX_ARGS + 1 }> = self.args.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(core::ptr::null());
        ptrs
    }
}

/// One-way jump into a loaded image.
pub trait ControlTransfer {
    fn transfer(&mut self, entry: u32, argv: &KernelArgv) -> KernelReturned;
}

/// Jump through a function pointer to `entry`.
///
/// # Safety
/// `entry` must be the entry point of an image already relocated to RAM
/// with caches written back, and the CPU state must be ready for it.
pub unsafe fn jump(entry: u32, argv: &KernelArgv) -> ! {
    let ptrs = argv.pointers();
    let f: KernelEntry = core::mem::transmute(entry as usize);
    f(argv.argc(), ptrs.as_ptr(), core::ptr::null(), core::ptr::null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdline::KernelParams;
    use core::ffi::CStr;

    #[test]
    fn argv_layout() {
        let list = KernelParams { init: Some("/sbin/init"), ..KernelParams::new("linux") }.finalize().unwrap();
        let argv = KernelArgv::new(&list);
        assert_eq!(argv.argc(), 2);

        let ptrs = argv.pointers();
        assert_eq!(ptrs.len(), 3);
        assert!(ptrs[2].is_null());
        let first = unsafe { CStr::from_ptr(ptrs[0] as *const core::ffi::c_char) };
        assert_eq!(first.to_str().unwrap(), "linux");
        let second = unsafe { CStr::from_ptr(ptrs[1] as *const core::ffi::c_char) };
        assert_eq!(second.to_str().unwrap(), "init=/sbin/init");

        assert_eq!(argv.strings().collect::<Vec<_>>(), vec!["linux", "init=/sbin/init"]);
    }

    #[test]
    fn full_width_argument_keeps_terminator() {
        let mut list = KernelArgs::new();
        let mut a = crate::cmdline::Arg::new();
        a.push_str(&"y".repeat(ARG_LEN));
        list.push(a);
        let argv = KernelArgv::new(&list);
        let p = argv.pointers()[0];
        let s = unsafe { CStr::from_ptr(p as *const core::ffi::c_char) };
        assert_eq!(s.to_bytes().len(), ARG_LEN);
    }
}
