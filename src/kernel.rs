//! The kernel orchestrator: boot, process lifecycle, and the collaborators
//! every handler ultimately reaches through.
//!
//! Grounded in the teacher's `Kernel`/`System` struct that owns the process
//! table, frame allocator, and device handles and is threaded through every
//! syscall handler as shared context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::alarm::Alarm;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::frame::FrameAllocator;
use crate::machine::{Console, FileSystem, ObjectLoader, PhysicalMemory, Processor, Timer};
use crate::process::Process;
use crate::registry::{Pid, Registry};
use crate::vm::ProcessKind;

pub struct Kernel {
    config: KernelConfig,
    frames: FrameAllocator,
    registry: Registry,
    memory: PhysicalMemory,
    fs: Arc<dyn FileSystem>,
    console: Arc<dyn Console>,
    loader: Arc<dyn ObjectLoader>,
    processor: Arc<dyn Processor>,
    alarm: Arc<Alarm>,
    halted: AtomicBool,
}

impl Kernel {
    pub fn new(
        config: KernelConfig,
        fs: Arc<dyn FileSystem>,
        console: Arc<dyn Console>,
        loader: Arc<dyn ObjectLoader>,
        processor: Arc<dyn Processor>,
        timer: Arc<dyn Timer>,
    ) -> Arc<Self> {
        let memory = PhysicalMemory::new(config.num_phys_pages, config.page_size);
        let frames = FrameAllocator::new(config.num_phys_pages);
        let alarm = Alarm::new(timer);
        Arc::new(Kernel {
            config,
            frames,
            registry: Registry::new(),
            memory,
            fs,
            console,
            loader,
            processor,
            alarm,
            halted: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameAllocator {
        &self.frames
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    pub fn alarm(&self) -> &Arc<Alarm> {
        &self.alarm
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Loads `name` as the root process (pid 1, ppid 0) and hands it to the
    /// processor collaborator to begin execution.
    pub fn boot(self: &Arc<Self>, name: &str, argv: Vec<String>) -> Result<Pid, KernelError> {
        let pid = self.registry.alloc_pid();
        let root = Arc::new(Process::new(
            pid,
            0,
            ProcessKind::from_name(&self.config.process_kind),
            self.config.max_files,
            self.console.as_ref(),
        ));
        self.registry.insert(root.clone());

        let ops = root.kind().ops();
        let space = ops.load_sections(
            name,
            &argv,
            self.fs.as_ref(),
            self.loader.as_ref(),
            &self.frames,
            &self.memory,
            &self.config,
        )?;
        root.install_address_space(space);

        info!(target: "kernel::kernel", "booting root process pid={pid} image={name}");
        self.processor.start(root, self.clone());
        Ok(pid)
    }

    /// Implements the `exec` syscall's process-creation half: registers a
    /// new child before attempting its load, so that a failed load still
    /// leaves the child registered and in the parent's children list.
    pub fn exec(self: &Arc<Self>, caller: &Arc<Process>, name: &str, argv: Vec<String>) -> Result<Pid, KernelError> {
        let pid = self.registry.alloc_pid();
        let child = Arc::new(Process::new(
            pid,
            caller.pid(),
            caller.kind(),
            self.config.max_files,
            self.console.as_ref(),
        ));
        self.registry.insert(child.clone());
        caller.add_child(pid);

        let ops = child.kind().ops();
        let space = ops.load_sections(
            name,
            &argv,
            self.fs.as_ref(),
            self.loader.as_ref(),
            &self.frames,
            &self.memory,
            &self.config,
        );
        match space {
            Ok(space) => {
                child.install_address_space(space);
                debug!(target: "kernel::kernel", "exec pid={pid} name={name} parent={}", caller.pid());
                self.processor.start(child, self.clone());
                Ok(pid)
            }
            Err(err) => {
                warn!(target: "kernel::kernel", "exec load failed pid={pid} name={name}: {err}");
                Err(err)
            }
        }
    }

    /// Implements `join`'s blocking wait plus registry bookkeeping; the
    /// caller still has to copy the status out to user memory.
    pub fn join(&self, caller: &Process, pid: Pid) -> Option<i32> {
        if !caller.children().contains(&pid) {
            return None;
        }
        let child = self.registry.get(pid)?;
        let status = child.wait_for_exit();
        self.registry.remove(pid);
        debug!(target: "kernel::kernel", "join pid={} child={pid} status={status}", caller.pid());
        Some(status)
    }

    /// Implements `exit`'s teardown and cascading shutdown decision.
    pub fn exit(self: &Arc<Self>, proc: &Arc<Process>, status: i32) {
        {
            let mut fds = proc.fds();
            let open_slots: Vec<usize> = fds.occupied().collect();
            for slot in open_slots {
                if let Some(mut fd) = fds.take(slot) {
                    fd.open_file.close();
                    if fd.to_delete {
                        self.fs.remove(&fd.filename);
                    }
                }
            }
        }

        for child_pid in proc.children() {
            if let Some(child) = self.registry.get(child_pid) {
                child.disown();
            }
        }

        proc.finish(status);

        if let Some(mut space) = proc.take_address_space() {
            proc.kind().ops().unload_sections(&mut space, &self.frames);
        }

        let is_last_live = self.registry.len() == 1 && self.registry.get(proc.pid()).is_some();
        info!(target: "kernel::kernel", "exit pid={} status={status} root={} last_live={is_last_live}", proc.pid(), proc.is_root());

        if proc.is_root() || is_last_live {
            self.halt();
        } else if proc.is_disowned() {
            self.registry.remove(proc.pid());
        }
    }

    /// Invokes the machine-halt primitive. Only meaningful once; later calls
    /// observe `is_halted` already set.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        info!(target: "kernel::kernel", "halting machine");
        self.processor.halt();
    }
}
