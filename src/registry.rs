//! Process table: pid allocation and the pid-to-process map.
//!
//! Grounded in the teacher's process table (an array/map of live processes
//! guarded by a single lock, plus a monotonically increasing next-pid
//! counter). Per the shared-state design note, this is a real
//! `std::sync::Mutex`/`AtomicU32` pair rather than the interrupt gate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::process::Process;

pub type Pid = u32;

pub struct Registry {
    next_pid: AtomicU32,
    table: Mutex<HashMap<Pid, Arc<Process>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            next_pid: AtomicU32::new(1),
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates a pid that has never been issued before.
    pub fn alloc_pid(&self) -> Pid {
        self.next_pid.fetch_add(1, Ordering::SeqCst)
    }

    pub fn insert(&self, process: Arc<Process>) {
        self.table.lock().unwrap().insert(process.pid(), process);
    }

    pub fn remove(&self, pid: Pid) -> Option<Arc<Process>> {
        self.table.lock().unwrap().remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.table.lock().unwrap().get(&pid).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::machine::{Console, OpenFile};
    use crate::vm::ProcessKind;

    struct NullFile;
    impl OpenFile for NullFile {
        fn read(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
        fn write(&mut self, buf: &[u8]) -> usize {
            buf.len()
        }
        fn read_at(&mut self, _pos: u64, _buf: &mut [u8]) -> usize {
            0
        }
        fn write_at(&mut self, _pos: u64, buf: &[u8]) -> usize {
            buf.len()
        }
        fn close(&mut self) {}
    }

    struct NullConsole;
    impl Console for NullConsole {
        fn open_stdin(&self) -> Box<dyn OpenFile> {
            Box::new(NullFile)
        }
        fn open_stdout(&self) -> Box<dyn OpenFile> {
            Box::new(NullFile)
        }
    }

    fn test_process(registry: &Registry, ppid: Pid) -> Arc<Process> {
        let pid = registry.alloc_pid();
        Arc::new(Process::new(
            pid,
            ppid,
            ProcessKind::Base,
            KernelConfig::default().max_files,
            &NullConsole,
        ))
    }

    #[test]
    fn pids_are_never_reused() {
        let registry = Registry::new();
        let a = registry.alloc_pid();
        let b = registry.alloc_pid();
        assert_ne!(a, b);
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let registry = Registry::new();
        let proc = test_process(&registry, 0);
        let pid = proc.pid();
        registry.insert(proc);
        assert!(registry.get(pid).is_some());
        assert_eq!(registry.len(), 1);
        registry.remove(pid);
        assert!(registry.get(pid).is_none());
        assert!(registry.is_empty());
    }
}
