//! Exception trap entry: the processor collaborator's sole way back into
//! the kernel.
//!
//! Grounded in the teacher's trap-handling entry point (read the cause,
//! dispatch a syscall or kill the offending process), redesigned for a
//! fixed two-way split since the only exception causes this kernel
//! recognizes are "syscall" and "everything else is fatal to the process".

use std::sync::Arc;

use log::trace;

use crate::kernel::Kernel;
use crate::machine::{ExceptionCause, Processor, Register};
use crate::process::Process;
use crate::syscall::{self, SyscallArgs};

/// Called by the processor collaborator whenever the running user thread
/// traps. For a syscall, decodes `v0`/`a0..a3`, dispatches, writes the
/// result back to `v0`, and advances the program counter past the trap
/// instruction. For any other cause, exits the current process with status 1.
pub fn enter(kernel: &Arc<Kernel>, proc: &Arc<Process>, processor: &dyn Processor, cause: ExceptionCause) {
    match cause {
        ExceptionCause::Syscall => {
            let number = processor.read_register(Register::V0) as u32;
            let args = SyscallArgs {
                a0: processor.read_register(Register::A0),
                a1: processor.read_register(Register::A1),
                a2: processor.read_register(Register::A2),
                a3: processor.read_register(Register::A3),
            };
            trace!(target: "kernel::trap", "syscall {number} pid={} args={args:?}", proc.pid());
            let result = syscall::dispatch(kernel, proc, number, args);
            processor.write_register(Register::V0, result);
            processor.advance_pc();
        }
        ExceptionCause::Other(code) => {
            trace!(target: "kernel::trap", "fault {code} pid={} -> exit(1)", proc.pid());
            kernel.exit(proc, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::machine::{Console, FileSystem, LoadedExecutable, ObjectLoader, OpenFile, Section, Timer};
    use crate::trap;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

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

    struct EmptyFs;
    impl FileSystem for EmptyFs {
        fn open(&self, _name: &str, _create_if_missing: bool) -> Option<Box<dyn OpenFile>> {
            Some(Box::new(NullFile))
        }
        fn remove(&self, _name: &str) -> bool {
            true
        }
    }

    struct FlatLoader;
    impl ObjectLoader for FlatLoader {
        fn load(&self, _file: &mut dyn OpenFile) -> Result<LoadedExecutable, crate::error::KernelError> {
            Ok(LoadedExecutable {
                sections: vec![Section {
                    first_vpn: 0,
                    num_pages: 1,
                    read_only: false,
                    data: vec![0u8; 16],
                }],
                entry_point: 0,
            })
        }
    }

    struct NullTimer;
    impl Timer for NullTimer {
        fn now(&self) -> u64 {
            0
        }
        fn set_interrupt_handler(&self, _handler: Box<dyn Fn() + Send + Sync>) {}
    }

    struct FakeProcessor {
        regs: Mutex<[i32; 7]>,
        halted: AtomicI32,
    }

    impl FakeProcessor {
        fn new() -> Self {
            FakeProcessor {
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

    impl Processor for FakeProcessor {
        fn page_size(&self) -> usize {
            16
        }
        fn num_phys_pages(&self) -> usize {
            4
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

    fn test_kernel() -> Arc<Kernel> {
        Kernel::new(
            KernelConfig {
                num_phys_pages: 4,
                page_size: 16,
                max_files: 16,
                stack_pages: 1,
                executable_suffix: ".coff".into(),
                ticks_per_interrupt: 500,
                process_kind: "base".into(),
            },
            Arc::new(EmptyFs),
            Arc::new(NullConsole),
            Arc::new(FlatLoader),
            Arc::new(FakeProcessor::new()),
            Arc::new(NullTimer),
        )
    }

    #[test]
    fn syscall_cause_writes_v0_and_advances_pc() {
        let kernel = test_kernel();
        let pid = kernel.boot("init.coff", vec![]).unwrap();
        let proc = kernel.registry().get(pid).unwrap();
        let processor = FakeProcessor::new();
        processor.write_register(Register::V0, 0); // halt, but proc is root so it halts

        trap::enter(&kernel, &proc, &processor, ExceptionCause::Syscall);
        assert_eq!(processor.read_register(Register::Pc), 4);
    }

    #[test]
    fn other_cause_exits_process_with_status_one() {
        let kernel = test_kernel();
        let pid = kernel.boot("init.coff", vec![]).unwrap();
        let proc = kernel.registry().get(pid).unwrap();
        let processor = FakeProcessor::new();

        trap::enter(&kernel, &proc, &processor, ExceptionCause::Other(13));
        assert_eq!(proc.exit_status(), Some(1));
    }
}
