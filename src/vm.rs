//! Per-process address space: page table, object-file load, argv packing,
//! and bounded copy-in/copy-out against user virtual memory.
//!
//! Grounded in the teacher's `sysfile.rs`/`proc.rs` copy-in/copy-out helpers
//! (walk a page table, clamp to the process's page count, never fault the
//! kernel thread doing the copy) and in the capability-interface redesign
//! note: rather than a process subclass overriding `loadSections`, a
//! [`ProcessKind`] selects one of a small, fixed set of [`AddressSpaceOps`]
//! implementations.

use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::frame::FrameAllocator;
use crate::machine::{FileSystem, ObjectLoader, PhysicalMemory};

#[derive(Debug, Clone, Copy)]
pub struct TranslationEntry {
    pub vpn: usize,
    pub ppn: usize,
    pub valid: bool,
    pub read_only: bool,
    pub used: bool,
    pub dirty: bool,
}

pub struct AddressSpace {
    pub entries: Vec<TranslationEntry>,
    pub num_pages: usize,
    pub page_size: usize,
    pub initial_pc: u32,
    pub initial_sp: u32,
    pub argc: i32,
    pub argv_addr: u32,
}

impl AddressSpace {
    fn entry_for_mut(&mut self, vpn: usize) -> Option<&mut TranslationEntry> {
        self.entries.get_mut(vpn)
    }

    /// Copies up to `len` bytes starting at `vaddr` into `buf[off..]`. Never
    /// faults the caller: stops (and returns the short count) at the first
    /// page past `num_pages`.
    pub fn read_virtual_memory(
        &mut self,
        memory: &PhysicalMemory,
        vaddr: u32,
        buf: &mut [u8],
        off: usize,
        len: usize,
    ) -> usize {
        if len == 0 {
            return 0;
        }
        let page_size = self.page_size;
        let mut vpn = vaddr as usize / page_size;
        let mut in_page_off = vaddr as usize % page_size;
        let mut remaining = len;
        let mut copied = 0usize;

        while remaining > 0 {
            let entry = match self.entry_for_mut(vpn) {
                Some(e) => e,
                None => break,
            };
            entry.used = true;
            let ppn = entry.ppn;
            let chunk = remaining.min(page_size - in_page_off);
            memory.read(ppn, in_page_off, &mut buf[off + copied..off + copied + chunk]);
            copied += chunk;
            remaining -= chunk;
            vpn += 1;
            in_page_off = 0;
        }
        copied
    }

    /// Symmetric to [`read_virtual_memory`]; refuses to write into a
    /// read-only page. A read-only first page refuses entirely (returns 0);
    /// hitting a read-only page after making progress stops there.
    pub fn write_virtual_memory(
        &mut self,
        memory: &PhysicalMemory,
        vaddr: u32,
        buf: &[u8],
        off: usize,
        len: usize,
    ) -> usize {
        if len == 0 {
            return 0;
        }
        let page_size = self.page_size;
        let mut vpn = vaddr as usize / page_size;
        let mut in_page_off = vaddr as usize % page_size;
        let mut remaining = len;
        let mut copied = 0usize;

        while remaining > 0 {
            let entry = match self.entry_for_mut(vpn) {
                Some(e) => e,
                None => break,
            };
            if entry.read_only {
                break;
            }
            entry.used = true;
            entry.dirty = true;
            let ppn = entry.ppn;
            let chunk = remaining.min(page_size - in_page_off);
            memory.write(ppn, in_page_off, &buf[off + copied..off + copied + chunk]);
            copied += chunk;
            remaining -= chunk;
            vpn += 1;
            in_page_off = 0;
        }
        copied
    }

    /// Reads a null-terminated string of at most `max_len` characters.
    /// Returns `None` ("no such string") if no terminator was found within
    /// the `max_len + 1`-byte read window.
    pub fn read_c_string(
        &mut self,
        memory: &PhysicalMemory,
        vaddr: u32,
        max_len: usize,
    ) -> Option<String> {
        let mut window = vec![0u8; max_len + 1];
        let got = self.read_virtual_memory(memory, vaddr, &mut window, 0, max_len + 1);
        let terminator = window[..got].iter().position(|&b| b == 0)?;
        String::from_utf8(window[..terminator].to_vec()).ok()
    }

    /// Returns every frame this address space owns to the allocator and
    /// invalidates every entry.
    pub fn unload(&mut self, frames: &FrameAllocator) {
        let owned: Vec<usize> = self.entries.iter().map(|e| e.ppn).collect();
        frames.release_many(&owned);
        for entry in &mut self.entries {
            entry.valid = false;
        }
    }
}

/// Packs `argc` pointers followed by null-terminated strings, pointer table
/// first. Returns `None` if the packed form does not fit in one page.
fn pack_argv(argv: &[String], page_size: usize, argv_page_vaddr: u32) -> Option<Vec<u8>> {
    let header = argv.len() * 4;
    let body_len: usize = argv.iter().map(|s| s.len() + 1).sum();
    if header + body_len > page_size {
        return None;
    }
    let mut packed = Vec::with_capacity(header + body_len);
    let mut string_offset = argv_page_vaddr as usize + header;
    for arg in argv {
        packed.extend_from_slice(&(string_offset as u32).to_le_bytes());
        string_offset += arg.len() + 1;
    }
    for arg in argv {
        packed.extend_from_slice(arg.as_bytes());
        packed.push(0);
    }
    Some(packed)
}

/// The capability interface a [`ProcessKind`] selects an implementation of,
/// replacing the source's process-subclass overrides of section
/// loading/unloading and syscall handling.
pub trait AddressSpaceOps: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn load_sections(
        &self,
        name: &str,
        argv: &[String],
        fs: &dyn FileSystem,
        loader: &dyn ObjectLoader,
        frames: &FrameAllocator,
        memory: &PhysicalMemory,
        config: &KernelConfig,
    ) -> Result<AddressSpace, KernelError>;

    fn unload_sections(&self, space: &mut AddressSpace, frames: &FrameAllocator) {
        space.unload(frames);
    }

    /// Extension point for syscalls a process kind adds beyond the fixed
    /// base set. `None` means "not handled here", falling through to the
    /// dispatcher's unknown-syscall path.
    fn handle_syscall_extension(&self, _num: u32, _args: [i32; 4]) -> Option<i32> {
        None
    }
}

/// The base process kind's address space operations: exactly the
/// construction and teardown algorithm described for loading an object
/// file, with no extension syscalls.
pub struct BaseAddressSpaceOps;

impl AddressSpaceOps for BaseAddressSpaceOps {
    fn load_sections(
        &self,
        name: &str,
        argv: &[String],
        fs: &dyn FileSystem,
        loader: &dyn ObjectLoader,
        frames: &FrameAllocator,
        memory: &PhysicalMemory,
        config: &KernelConfig,
    ) -> Result<AddressSpace, KernelError> {
        let mut file = fs.open(name, false).ok_or(KernelError::FileNotFound)?;
        let executable = loader.load(file.as_mut())?;

        let mut next_vpn = 0usize;
        for section in &executable.sections {
            if section.first_vpn != next_vpn {
                return Err(KernelError::InvalidExecutable);
            }
            next_vpn += section.num_pages;
        }
        let code_pages = next_vpn;

        let header_and_body: usize =
            argv.len() * 4 + argv.iter().map(|a| a.len() + 1).sum::<usize>();
        if header_and_body > config.page_size {
            return Err(KernelError::ArgvTooLarge);
        }

        let num_pages = code_pages + config.stack_pages + 1;
        let owned_frames = frames.acquire_many(num_pages)?;

        let mut entries = Vec::with_capacity(num_pages);
        for (vpn, &ppn) in owned_frames.iter().enumerate() {
            entries.push(TranslationEntry {
                vpn,
                ppn,
                valid: true,
                read_only: false,
                used: false,
                dirty: false,
            });
        }

        for section in &executable.sections {
            for page_index in 0..section.num_pages {
                let vpn = section.first_vpn + page_index;
                let ppn = entries[vpn].ppn;
                let start = page_index * config.page_size;
                memory.write_frame(ppn, &section.data[start..start + config.page_size]);
                entries[vpn].read_only = section.read_only;
            }
        }

        let initial_sp = ((num_pages - 1) * config.page_size) as u32;
        let argv_addr = initial_sp;

        let mut space = AddressSpace {
            entries,
            num_pages,
            page_size: config.page_size,
            initial_pc: executable.entry_point,
            initial_sp,
            argc: argv.len() as i32,
            argv_addr,
        };

        let packed = pack_argv(argv, config.page_size, argv_addr)
            .expect("argv size was already checked against the page size above");
        space.write_virtual_memory(memory, argv_addr, &packed, 0, packed.len());

        Ok(space)
    }
}

/// Names a process's address-space behavior. A configuration key selects one
/// of a small known set by exact name; anything else falls back to `Base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Base,
}

impl ProcessKind {
    pub fn from_name(name: &str) -> ProcessKind {
        match name {
            "base" | "UserProcess" => ProcessKind::Base,
            _ => ProcessKind::Base,
        }
    }

    pub fn ops(&self) -> Arc<dyn AddressSpaceOps> {
        match self {
            ProcessKind::Base => Arc::new(BaseAddressSpaceOps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_space(num_pages: usize, page_size: usize, frames: &[usize]) -> AddressSpace {
        let entries = frames
            .iter()
            .enumerate()
            .map(|(vpn, &ppn)| TranslationEntry {
                vpn,
                ppn,
                valid: true,
                read_only: false,
                used: false,
                dirty: false,
            })
            .collect();
        AddressSpace {
            entries,
            num_pages,
            page_size,
            initial_pc: 0,
            initial_sp: 0,
            argc: 0,
            argv_addr: 0,
        }
    }

    #[test]
    fn read_write_round_trip_within_one_page() {
        let memory = PhysicalMemory::new(4, 16);
        let mut space = flat_space(4, 16, &[0, 1, 2, 3]);
        let data = b"hello";
        let written = space.write_virtual_memory(&memory, 4, data, 0, data.len());
        assert_eq!(written, 5);
        let mut out = [0u8; 5];
        let read = space.read_virtual_memory(&memory, 4, &mut out, 0, 5);
        assert_eq!(read, 5);
        assert_eq!(&out, data);
    }

    #[test]
    fn short_copy_out_stops_at_read_only_page() {
        let memory = PhysicalMemory::new(4, 16);
        let mut space = flat_space(4, 16, &[0, 1, 2, 3]);
        space.entries[3].read_only = true;
        let data = [1u8; 20];
        // page 3 starts at byte 48; vaddr 38 leaves 10 bytes of page 2 before it.
        let written = space.write_virtual_memory(&memory, 38, &data, 0, 20);
        assert_eq!(written, 10);
    }

    #[test]
    fn read_c_string_finds_terminator() {
        let memory = PhysicalMemory::new(2, 16);
        let mut space = flat_space(2, 16, &[0, 1]);
        space.write_virtual_memory(&memory, 0, b"hi\0", 0, 3);
        assert_eq!(space.read_c_string(&memory, 0, 16).as_deref(), Some("hi"));
    }

    #[test]
    fn read_c_string_missing_terminator_is_none() {
        let memory = PhysicalMemory::new(1, 16);
        let mut space = flat_space(1, 16, &[0]);
        space.write_virtual_memory(&memory, 0, &[1u8; 16], 0, 16);
        assert_eq!(space.read_c_string(&memory, 0, 8), None);
    }

    #[test]
    fn unload_returns_every_frame() {
        let allocator = FrameAllocator::new(4);
        let owned = allocator.acquire_many(4).unwrap();
        let mut space = flat_space(4, 16, &owned);
        space.unload(&allocator);
        assert_eq!(allocator.free_count(), 4);
        assert!(space.entries.iter().all(|e| !e.valid));
    }
}
