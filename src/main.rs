//! Thin demo harness: wires a minimal set of collaborators and boots the
//! kernel far enough to exercise the lifecycle end to end.
//!
//! The simulated processor, timer, console, and file system are out of
//! scope for this crate (see [`kernel::machine`]); production deployments
//! supply real ones. This binary stands in with the smallest collaborators
//! that let `Kernel::boot` run, purely so the crate has something to run.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use kernel::machine::{
    Console, ExceptionCause, FileSystem, LoadedExecutable, ObjectLoader, OpenFile, Processor,
    Register, Section, Timer,
};
use kernel::process::Process;
use kernel::{trap, Kernel, KernelConfig, KernelError};

struct MemFile {
    data: Vec<u8>,
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
    fn write_at(&mut self, _pos: u64, buf: &[u8]) -> usize {
        self.data.extend_from_slice(buf);
        buf.len()
    }
    fn close(&mut self) {}
}

struct DemoFileSystem;

impl FileSystem for DemoFileSystem {
    fn open(&self, _name: &str, _create_if_missing: bool) -> Option<Box<dyn OpenFile>> {
        Some(Box::new(MemFile { data: Vec::new() }))
    }
    fn remove(&self, _name: &str) -> bool {
        true
    }
}

struct DemoConsole;

impl Console for DemoConsole {
    fn open_stdin(&self) -> Box<dyn OpenFile> {
        Box::new(MemFile { data: Vec::new() })
    }
    fn open_stdout(&self) -> Box<dyn OpenFile> {
        Box::new(MemFile { data: Vec::new() })
    }
}

/// A loader that treats every name as a single-page, read-write, all-zero
/// program. Stands in for a real COFF parser.
struct DemoLoader {
    page_size: usize,
}

impl ObjectLoader for DemoLoader {
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

struct DemoTimer;

impl Timer for DemoTimer {
    fn now(&self) -> u64 {
        0
    }
    fn set_interrupt_handler(&self, _handler: Box<dyn Fn() + Send + Sync>) {}
}

/// A processor that never actually interprets instructions: it traps into
/// `halt` immediately after `start`, just enough to walk the kernel through
/// one full process lifecycle.
struct DemoProcessor {
    regs: Mutex<[i32; 4]>,
    halted: AtomicI32,
}

impl DemoProcessor {
    fn new() -> Self {
        DemoProcessor {
            regs: Mutex::new([0; 4]),
            halted: AtomicI32::new(0),
        }
    }
}

impl Processor for DemoProcessor {
    fn page_size(&self) -> usize {
        1024
    }
    fn num_phys_pages(&self) -> usize {
        64
    }
    fn start(&self, proc: Arc<Process>, kernel: Arc<Kernel>) {
        trap::enter(&kernel, &proc, self, ExceptionCause::Syscall);
    }
    fn halt(&self) {
        self.halted.store(1, Ordering::SeqCst);
    }
    fn read_register(&self, reg: Register) -> i32 {
        match reg {
            Register::V0 => 0, // syscall 0 = halt
            _ => self.regs.lock().unwrap()[0],
        }
    }
    fn write_register(&self, _reg: Register, value: i32) {
        self.regs.lock().unwrap()[0] = value;
    }
    fn advance_pc(&self) {}
}

fn main() {
    env_logger::init();

    let config = KernelConfig::default();
    let kernel = Kernel::new(
        config.clone(),
        Arc::new(DemoFileSystem),
        Arc::new(DemoConsole),
        Arc::new(DemoLoader {
            page_size: config.page_size,
        }),
        Arc::new(DemoProcessor::new()),
        Arc::new(DemoTimer),
    );

    match kernel.boot("init.coff", vec![]) {
        Ok(pid) => log::info!("booted root process pid={pid}, halted={}", kernel.is_halted()),
        Err(err) => log::error!("failed to boot root process: {err}"),
    }
}
