//! Error taxonomy for the kernel core.
//!
//! Internal components return [`KernelError`]; the syscall dispatcher maps
//! failures to the `-1` / `0` sentinels defined by the syscall ABI. No error
//! ever propagates across the ABI boundary itself — see `syscall.rs`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// The named executable does not exist, or the file system collaborator refused to open it.
    FileNotFound,
    /// The object-file loader rejected the image (bad magic, non-contiguous sections, ...).
    InvalidExecutable,
    /// Packed argv does not fit in a single page.
    ArgvTooLarge,
    /// The frame allocator could not satisfy a batch request.
    OutOfMemory,
    /// A lookup against the process registry found nothing.
    NoSuchProcess,
    /// The process's file-descriptor table has no free slot.
    FileTableFull,
    /// A file-descriptor operation targeted an unopened or reserved slot.
    BadDescriptor,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::FileNotFound => "file not found",
            KernelError::InvalidExecutable => "invalid executable",
            KernelError::ArgvTooLarge => "argv does not fit in one page",
            KernelError::OutOfMemory => "out of physical frames",
            KernelError::NoSuchProcess => "no such process",
            KernelError::FileTableFull => "file descriptor table full",
            KernelError::BadDescriptor => "bad file descriptor",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for KernelError {}
