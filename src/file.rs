//! Per-process file-descriptor table.
//!
//! Grounded in the teacher's `proc.rs` open-file-table pattern (fixed-size
//! array, reserved low slots for stdio, linear scan for a free slot), with
//! two corrections the design notes call out explicitly: slot allocation
//! scans `2..MaxFiles` without skipping past the first occupied slot it
//! finds, and name lookups compare filenames by value, not by reference
//! identity.

use crate::machine::OpenFile;

pub struct FileDescriptor {
    pub open_file: Box<dyn OpenFile>,
    pub position: u64,
    pub filename: String,
    pub to_delete: bool,
}

pub struct FdTable {
    slots: Vec<Option<FileDescriptor>>,
}

impl FdTable {
    pub const STDIN: usize = 0;
    pub const STDOUT: usize = 1;

    /// Builds a table of `max_files` slots with slots 0 and 1 preassigned to
    /// the console's read and write endpoints.
    pub fn new(max_files: usize, stdin: Box<dyn OpenFile>, stdout: Box<dyn OpenFile>) -> Self {
        let mut slots = Vec::with_capacity(max_files);
        slots.push(Some(FileDescriptor {
            open_file: stdin,
            position: 0,
            filename: String::new(),
            to_delete: false,
        }));
        slots.push(Some(FileDescriptor {
            open_file: stdout,
            position: 0,
            filename: String::new(),
            to_delete: false,
        }));
        slots.resize_with(max_files, || None);
        FdTable { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// First empty slot in `2..max_files`, or `None` if the table is full.
    pub fn alloc_slot(&self) -> Option<usize> {
        (2..self.slots.len()).find(|&i| self.slots[i].is_none())
    }

    pub fn get(&self, fd: usize) -> Option<&FileDescriptor> {
        self.slots.get(fd).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, fd: usize) -> Option<&mut FileDescriptor> {
        self.slots.get_mut(fd).and_then(|s| s.as_mut())
    }

    pub fn install(&mut self, fd: usize, descriptor: FileDescriptor) {
        self.slots[fd] = Some(descriptor);
    }

    pub fn take(&mut self, fd: usize) -> Option<FileDescriptor> {
        self.slots.get_mut(fd).and_then(|s| s.take())
    }

    /// Finds an open, non-reserved slot by filename, comparing by value.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .skip(2)
            .find(|(_, slot)| slot.as_ref().is_some_and(|fd| fd.filename == name))
            .map(|(i, _)| i)
    }

    /// All currently open slots, reserved slots included, for teardown.
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
    }
}
