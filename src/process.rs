//! A live process: identity, parent/child graph, address space, and the
//! file-descriptor table.
//!
//! Grounded in the teacher's `proc.rs` `Process` struct (pid, state, open
//! files, parent pointer), adapted to the spec's parent/child model: a weak
//! `ppid` back-reference plus a forward child-pid list, with no cycles by
//! construction since pids are monotonic. Exit/join rendezvous dogfoods this
//! crate's own [`crate::sync::Mutex`]/[`crate::sync::CondVar`] rather than
//! reaching for a raw `std::thread::JoinHandle`, so "has this process
//! finished" is decoupled from "who owns its OS thread".

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use crate::file::FdTable;
use crate::machine::Console;
use crate::registry::Pid;
use crate::sync::{CondVar, Mutex};
use crate::vm::{AddressSpace, ProcessKind};

pub struct Process {
    pid: Pid,
    ppid: AtomicU32,
    kind: ProcessKind,
    address_space: StdMutex<Option<AddressSpace>>,
    fd_table: StdMutex<FdTable>,
    children: StdMutex<Vec<Pid>>,
    exit_status: StdMutex<Option<i32>>,
    completion: Arc<Mutex<bool>>,
    completion_cv: CondVar<bool>,
}

impl Process {
    pub fn new(pid: Pid, ppid: Pid, kind: ProcessKind, max_files: usize, console: &dyn Console) -> Self {
        let completion = Arc::new(Mutex::new(false));
        let completion_cv = CondVar::new(completion.clone());
        Process {
            pid,
            ppid: AtomicU32::new(ppid),
            kind,
            address_space: StdMutex::new(None),
            fd_table: StdMutex::new(FdTable::new(max_files, console.open_stdin(), console.open_stdout())),
            children: StdMutex::new(Vec::new()),
            exit_status: StdMutex::new(None),
            completion,
            completion_cv,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// 0 means "no live parent".
    pub fn ppid(&self) -> Pid {
        self.ppid.load(Ordering::SeqCst)
    }

    pub fn is_root(&self) -> bool {
        self.pid == 1
    }

    pub fn is_disowned(&self) -> bool {
        self.ppid() == 0
    }

    pub fn disown(&self) {
        self.ppid.store(0, Ordering::SeqCst);
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn add_child(&self, pid: Pid) {
        self.children.lock().unwrap().push(pid);
    }

    pub fn children(&self) -> Vec<Pid> {
        self.children.lock().unwrap().clone()
    }

    pub fn install_address_space(&self, space: AddressSpace) {
        *self.address_space.lock().unwrap() = Some(space);
    }

    pub fn with_address_space<R>(&self, f: impl FnOnce(&mut AddressSpace) -> R) -> Option<R> {
        self.address_space.lock().unwrap().as_mut().map(f)
    }

    pub fn take_address_space(&self) -> Option<AddressSpace> {
        self.address_space.lock().unwrap().take()
    }

    pub fn fds(&self) -> std::sync::MutexGuard<'_, FdTable> {
        self.fd_table.lock().unwrap()
    }

    pub fn exit_status(&self) -> Option<i32> {
        *self.exit_status.lock().unwrap()
    }

    pub fn initial_pc(&self) -> u32 {
        self.address_space
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.initial_pc)
            .unwrap_or(0)
    }

    pub fn initial_sp(&self) -> u32 {
        self.address_space
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.initial_sp)
            .unwrap_or(0)
    }

    pub fn argc(&self) -> i32 {
        self.address_space.lock().unwrap().as_ref().map(|s| s.argc).unwrap_or(0)
    }

    pub fn argv_addr(&self) -> u32 {
        self.address_space
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.argv_addr)
            .unwrap_or(0)
    }

    /// Records the exit status and wakes every thread blocked in
    /// [`Process::wait_for_exit`].
    pub fn finish(&self, status: i32) {
        *self.exit_status.lock().unwrap() = Some(status);
        let mut guard = self.completion.acquire();
        *guard = true;
        self.completion_cv.wake_all(&guard);
    }

    /// Blocks the calling thread until [`Process::finish`] has run, then
    /// returns the recorded exit status.
    pub fn wait_for_exit(&self) -> i32 {
        let mut guard = self.completion.acquire();
        while !*guard {
            guard = self.completion_cv.sleep(guard);
        }
        drop(guard);
        self.exit_status()
            .expect("completion flag set without a recorded exit status")
    }
}
