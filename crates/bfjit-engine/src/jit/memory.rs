// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Executable memory for generated code.
//!
//! An [`ExecutableBuffer`] owns one anonymous mapping. The code is copied in
//! while the mapping is read/write, then the mapping is switched to
//! read/execute before anything can call it. The mapping is released on
//! drop.

/// Rounds `len` up to a whole number of pages.
pub fn region_len(len: usize, page: usize) -> usize {
    len.max(1).div_ceil(page) * page
}

#[cfg(unix)]
pub use self::unix::ExecutableBuffer;

#[cfg(not(unix))]
pub use self::unsupported::ExecutableBuffer;

#[cfg(unix)]
mod unix {
    use std::ffi::c_void;
    use std::num::NonZeroUsize;
    use std::ptr::NonNull;

    use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, mprotect, munmap};
    use nix::unistd::{SysconfVar, sysconf};
    use tracing::trace;

    use super::region_len;
    use crate::error::{Error, Result};
    use crate::vm::Tape;

    /// Signature of every generated routine.
    type NativeEntry = unsafe extern "C" fn(cells: *mut u8);

    const FALLBACK_PAGE_SIZE: usize = 4096;

    fn page_size() -> usize {
        match sysconf(SysconfVar::PAGE_SIZE) {
            Ok(Some(size)) if size > 0 => size as usize,
            _ => FALLBACK_PAGE_SIZE,
        }
    }

    /// A page-aligned mapping holding one generated routine.
    ///
    /// # Hazard
    ///
    /// [`invoke`](Self::invoke) jumps into machine code. If that code
    /// misbehaves in a way it was not generated to catch (a host routine
    /// crashing, a tape shorter than the code was emitted for), the process
    /// is terminated by the operating system. There is no recovery path.
    #[derive(Debug)]
    pub struct ExecutableBuffer {
        ptr: NonNull<c_void>,
        len: usize,
        code_len: usize,
    }

    impl ExecutableBuffer {
        /// Maps a region for `code`, copies it in and makes it executable.
        pub fn from_code(code: &[u8]) -> Result<Self> {
            let len = region_len(code.len(), page_size());
            let size = NonZeroUsize::new(len)
                .ok_or_else(|| Error::Allocation("empty executable region".into()))?;

            // SAFETY: a fresh private anonymous mapping aliases no existing memory.
            let ptr = unsafe {
                mmap_anonymous(
                    None,
                    size,
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                    MapFlags::MAP_PRIVATE,
                )
            }
            .map_err(|e| Error::Allocation(format!("mmap failed: {e}")))?;

            // From here on, drop unmaps the region on early return.
            let buffer = Self {
                ptr,
                len,
                code_len: code.len(),
            };

            // SAFETY: the region is writable and at least `code.len()` bytes long.
            unsafe {
                std::ptr::copy_nonoverlapping(code.as_ptr(), ptr.as_ptr().cast::<u8>(), code.len());
            }

            // SAFETY: `ptr..ptr + len` is exactly the mapping created above.
            unsafe { mprotect(ptr, len, ProtFlags::PROT_READ | ProtFlags::PROT_EXEC) }
                .map_err(|e| Error::Allocation(format!("mprotect failed: {e}")))?;

            trace!(address = ?ptr, region_len = len, code_len = code.len(), "mapped executable region");
            Ok(buffer)
        }

        /// Size of the mapping in bytes.
        pub fn region_len(&self) -> usize {
            self.len
        }

        /// Size of the code in bytes.
        pub fn code_len(&self) -> usize {
            self.code_len
        }

        /// Runs the routine with `tape` as its argument.
        ///
        /// # Safety
        ///
        /// The buffer must hold a routine produced by a native
        /// [`Backend`](crate::jit::Backend) for this host, emitted for a tape
        /// of `tape.len()` cells, whose intrinsic context (if any) is still
        /// alive and not borrowed elsewhere.
        pub unsafe fn invoke(&self, tape: &mut Tape) {
            // SAFETY: the region is executable and starts with a routine of
            // the `NativeEntry` signature, guaranteed by the caller.
            let entry = unsafe { std::mem::transmute::<*mut c_void, NativeEntry>(self.ptr.as_ptr()) };
            // SAFETY: the tape outlives the call and matches the emitted bounds.
            unsafe { entry(tape.as_mut_ptr()) }
        }
    }

    impl Drop for ExecutableBuffer {
        fn drop(&mut self) {
            // SAFETY: the region was mapped by `from_code` with this length
            // and nothing refers to it once the buffer is gone.
            if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
                tracing::warn!(error = %e, "munmap failed");
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_region_is_page_rounded() {
            let page = page_size();
            let buffer = ExecutableBuffer::from_code(&[0xC3]).unwrap();
            assert_eq!(buffer.region_len(), page);
            assert_eq!(buffer.code_len(), 1);

            let big = vec![0xC3; page + 1];
            let buffer = ExecutableBuffer::from_code(&big).unwrap();
            assert_eq!(buffer.region_len(), 2 * page);
        }

        #[test]
        #[cfg(target_arch = "x86_64")]
        fn test_invoke_bare_ret() {
            let buffer = ExecutableBuffer::from_code(&[0xC3]).unwrap();
            let mut tape = Tape::new(4);
            // SAFETY: `ret` ignores its argument.
            unsafe { buffer.invoke(&mut tape) };
            assert_eq!(tape.cells(), &[0, 0, 0, 0]);
        }

        #[test]
        #[cfg(target_arch = "x86_64")]
        fn test_invoke_writes_through_argument() {
            // mov byte [rdi], 0x2A ; ret
            let buffer = ExecutableBuffer::from_code(&[0xC6, 0x07, 0x2A, 0xC3]).unwrap();
            let mut tape = Tape::new(2);
            // SAFETY: writes only the first cell of a two-cell tape.
            unsafe { buffer.invoke(&mut tape) };
            assert_eq!(tape.cells(), &[0x2A, 0]);
        }
    }
}

#[cfg(not(unix))]
mod unsupported {
    use crate::error::{Error, Result};
    use crate::vm::Tape;

    /// Placeholder on hosts without an executable-memory implementation.
    #[derive(Debug)]
    pub struct ExecutableBuffer {
        _private: (),
    }

    impl ExecutableBuffer {
        /// Always fails on this host.
        pub fn from_code(_code: &[u8]) -> Result<Self> {
            Err(Error::UnsupportedTarget(std::env::consts::OS))
        }

        /// Size of the mapping in bytes.
        pub fn region_len(&self) -> usize {
            0
        }

        /// Size of the code in bytes.
        pub fn code_len(&self) -> usize {
            0
        }

        /// Never reachable: no buffer can be built on this host.
        ///
        /// # Safety
        ///
        /// Trivially safe; kept `unsafe` to match the Unix signature.
        pub unsafe fn invoke(&self, _tape: &mut Tape) {}
    }
}
