//! External collaborator interfaces.
//!
//! The simulated processor, timer device, file system device, console
//! device, and object-file parser are explicitly out of scope (see the
//! crate's top-level documentation): the kernel core only depends on the
//! contracts below. A real deployment backs these with a MIPS-like
//! interpreter, a COFF loader, and so on; tests back them with small fakes
//! (see `tests/common/mod.rs`).

use std::sync::Arc;

use crate::error::KernelError;
use crate::process::Process;

/// Register names the trap entry and syscall dispatcher read and write.
/// Mirrors the spec's "register reads/writes by index" contract with named
/// accessors instead of bare indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Pc,
    Sp,
    V0,
    A0,
    A1,
    A2,
    A3,
}

/// Why the processor trapped into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCause {
    Syscall,
    Other(u32),
}

/// The simulated MIPS-like processor: instruction interpreter, MMU, register
/// file. Out of scope; the core only ever calls `start` to hand off a freshly
/// loaded process, and reads/writes registers through the trap entry.
pub trait Processor: Send + Sync {
    fn page_size(&self) -> usize;
    fn num_phys_pages(&self) -> usize;

    /// Begins executing `proc`'s user program from its recorded initial PC/SP.
    /// Traps back into the kernel (via `trap::enter_syscall` /
    /// `trap::enter_fault`) are this method's responsibility; the core never
    /// calls them itself.
    fn start(&self, proc: Arc<Process>, kernel: Arc<crate::kernel::Kernel>);

    /// Stops the machine. Per the spec, only ever invoked after the kernel
    /// has decided the root or last live process has exited.
    fn halt(&self);

    /// Reads one register of whichever user thread is currently executing.
    /// The simulated machine runs exactly one user thread at a time, so
    /// registers need no process argument.
    fn read_register(&self, reg: Register) -> i32;
    fn write_register(&self, reg: Register, value: i32);
    /// Advances the program counter past the instruction that trapped.
    fn advance_pc(&self);
}

/// The timer device. `now` is a monotonic tick counter; the registered
/// handler fires approximately every `ticks_per_interrupt` ticks (see
/// [`crate::config::KernelConfig`]).
pub trait Timer: Send + Sync {
    fn now(&self) -> u64;
    fn set_interrupt_handler(&self, handler: Box<dyn Fn() + Send + Sync>);
}

/// A file open through the file-system or console collaborator.
pub trait OpenFile: Send {
    /// Unpositioned read, for console-backed descriptors.
    fn read(&mut self, buf: &mut [u8]) -> usize;
    /// Unpositioned write, for console-backed descriptors.
    fn write(&mut self, buf: &[u8]) -> usize;
    /// Positioned read, for ordinary file-backed descriptors.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> usize;
    /// Positioned write, for ordinary file-backed descriptors.
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> usize;
    fn close(&mut self);
}

/// The file-system device. Operations are forwarded verbatim; the core
/// implements no filesystem semantics of its own (see the spec's non-goals).
pub trait FileSystem: Send + Sync {
    fn open(&self, name: &str, create_if_missing: bool) -> Option<Box<dyn OpenFile>>;
    fn remove(&self, name: &str) -> bool;
}

/// The console device: yields the open files wired to FD slots 0 and 1.
pub trait Console: Send + Sync {
    fn open_stdin(&self) -> Box<dyn OpenFile>;
    fn open_stdout(&self) -> Box<dyn OpenFile>;
}

/// One loaded section of an object file, already resolved to raw page bytes.
#[derive(Debug, Clone)]
pub struct Section {
    pub first_vpn: usize,
    pub num_pages: usize,
    pub read_only: bool,
    /// Exactly `num_pages * page_size` bytes.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LoadedExecutable {
    pub sections: Vec<Section>,
    pub entry_point: u32,
}

/// The object-file (COFF) parser. Out of scope; the core only consumes its
/// output via [`LoadedExecutable`].
pub trait ObjectLoader: Send + Sync {
    fn load(&self, file: &mut dyn OpenFile) -> Result<LoadedExecutable, KernelError>;
}

/// Raw machine memory, addressed by physical frame. Unlike the collaborators
/// above this is plain byte storage with no policy attached, so it is a
/// concrete type the core owns rather than a trait the processor implements;
/// the processor trait above only ever receives page numbers, never raw bytes.
pub struct PhysicalMemory {
    page_size: usize,
    bytes: std::sync::RwLock<Vec<u8>>,
}

impl PhysicalMemory {
    pub fn new(num_frames: usize, page_size: usize) -> Self {
        PhysicalMemory {
            page_size,
            bytes: std::sync::RwLock::new(vec![0u8; num_frames * page_size]),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Overwrites an entire frame, e.g. while loading a section.
    pub fn write_frame(&self, frame: usize, data: &[u8]) {
        let start = frame * self.page_size;
        let mut bytes = self.bytes.write().unwrap();
        bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// Copies `buf.len()` bytes starting at byte offset `frame * page_size + in_page_off`.
    pub fn read(&self, frame: usize, in_page_off: usize, buf: &mut [u8]) {
        let start = frame * self.page_size + in_page_off;
        let bytes = self.bytes.read().unwrap();
        buf.copy_from_slice(&bytes[start..start + buf.len()]);
    }

    pub fn write(&self, frame: usize, in_page_off: usize, buf: &[u8]) {
        let start = frame * self.page_size + in_page_off;
        let mut bytes = self.bytes.write().unwrap();
        bytes[start..start + buf.len()].copy_from_slice(buf);
    }
}
