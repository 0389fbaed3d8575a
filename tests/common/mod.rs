//! Shared fakes for the integration tests: an in-memory file system, an
//! in-memory console, a fixed-layout object loader, and a processor that
//! records register writes instead of interpreting instructions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use kernel::error::KernelError;
use kernel::machine::{
    Console, FileSystem, LoadedExecutable, ObjectLoader, OpenFile, Processor, Register, Section,
    Timer,
};
use kernel::process::Process;
use kernel::Kernel;

pub struct MemFile {
    data: Vec<u8>,
}

impl MemFile {
    pub fn new() -> Self {
        MemFile { data: Vec::new() }
    }
}

impl OpenFile for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        n
    }
    fn write(&mut self, buf: &[u8]) -> usize {
        self.data.extend_from_slice(buf);
        buf.len()
    }
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> usize {
        let pos = pos as usize;
        if pos >= self.data.len() {
            return 0;
        }
        let n = buf.len().min(self.data.len() - pos);
        buf[..n].copy_from_slice(&self.data[pos..pos + n]);
        n
    }
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> usize {
        let pos = pos as usize;
        if pos + buf.len() > self.data.len() {
            self.data.resize(pos + buf.len(), 0);
        }
        self.data[pos..pos + buf.len()].copy_from_slice(buf);
        buf.len()
    }
    fn close(&mut self) {}
}

pub struct InMemoryFs {
    files: Mutex<HashMap<String, ()>>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Pre-registered executable images that `boot`/`exec` look up by
        // name; `FlatLoader` ignores file contents, so empty entries suffice.
        files.insert("root.coff".to_string(), ());
        files.insert("child.coff".to_string(), ());
        InMemoryFs {
            files: Mutex::new(files),
        }
    }
}

impl FileSystem for InMemoryFs {
    fn open(&self, name: &str, create_if_missing: bool) -> Option<Box<dyn OpenFile>> {
        let mut files = self.files.lock().unwrap();
        if !files.contains_key(name) {
            if !create_if_missing {
                return None;
            }
            files.insert(name.to_string(), ());
        }
        Some(Box::new(MemFile::new()))
    }

    fn remove(&self, name: &str) -> bool {
        self.files.lock().unwrap().remove(name).is_some()
    }
}

pub struct InMemoryConsole;

impl Console for InMemoryConsole {
    fn open_stdin(&self) -> Box<dyn OpenFile> {
        Box::new(MemFile::new())
    }
    fn open_stdout(&self) -> Box<dyn OpenFile> {
        Box::new(MemFile::new())
    }
}

/// Every program is a single zeroed read-write page; `entry_point` is fixed
/// at 0. Good enough to exercise address-space construction without a real
/// COFF parser.
pub struct FlatLoader {
    pub page_size: usize,
}

impl ObjectLoader for FlatLoader {
    fn load(&self, _file: &mut dyn OpenFile) -> Result<LoadedExecutable, KernelError> {
        Ok(LoadedExecutable {
            sections: vec![Section {
                first_vpn: 0,
                num_pages: 1,
                read_only: false,
                data: vec![0u8; self.page_size],
            }],
            entry_point: 0,
        })
    }
}

pub struct ManualTimer {
    now: AtomicU64,
    handler: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl ManualTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualTimer {
            now: AtomicU64::new(0),
            handler: Mutex::new(None),
        })
    }

    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
        if let Some(handler) = self.handler.lock().unwrap().as_ref() {
            handler();
        }
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
    fn set_interrupt_handler(&self, handler: Box<dyn Fn() + Send + Sync>) {
        *self.handler.lock().unwrap() = Some(handler);
    }
}

/// Records register writes and halt calls instead of interpreting any code.
/// `start` does not spawn a thread; tests drive syscalls directly through
/// `kernel::syscall::dispatch`.
pub struct RecordingProcessor {
    regs: Mutex<[i32; 7]>,
    pub halted: AtomicI32,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        RecordingProcessor {
            regs: Mutex::new([0; 7]),
            halted: AtomicI32::new(0),
        }
    }

    fn index(reg: Register) -> usize {
        match reg {
            Register::Pc => 0,
            Register::Sp => 1,
            Register::V0 => 2,
            Register::A0 => 3,
            Register::A1 => 4,
            Register::A2 => 5,
            Register::A3 => 6,
        }
    }
}

impl Processor for RecordingProcessor {
    fn page_size(&self) -> usize {
        16
    }
    fn num_phys_pages(&self) -> usize {
        64
    }
    fn start(&self, _proc: Arc<Process>, _kernel: Arc<Kernel>) {}
    fn halt(&self) {
        self.halted.store(1, Ordering::SeqCst);
    }
    fn read_register(&self, reg: Register) -> i32 {
        self.regs.lock().unwrap()[Self::index(reg)]
    }
    fn write_register(&self, reg: Register, value: i32) {
        self.regs.lock().unwrap()[Self::index(reg)] = value;
    }
    fn advance_pc(&self) {
        let mut regs = self.regs.lock().unwrap();
        let pc = Self::index(Register::Pc);
        regs[pc] += 4;
    }
}

pub fn test_kernel(page_size: usize, num_phys_pages: usize, max_files: usize) -> Arc<Kernel> {
    Kernel::new(
        kernel::KernelConfig {
            num_phys_pages,
            page_size,
            max_files,
            stack_pages: 1,
            executable_suffix: ".coff".to_string(),
            ticks_per_interrupt: 500,
            process_kind: "base".to_string(),
        },
        Arc::new(InMemoryFs::new()),
        Arc::new(InMemoryConsole),
        Arc::new(FlatLoader { page_size }),
        Arc::new(RecordingProcessor::new()),
        ManualTimer::new(),
    )
}
