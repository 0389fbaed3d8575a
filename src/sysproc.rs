//! `halt`, `exit`, `exec`, and `join` syscall handlers.
//!
//! Grounded in the teacher's `sysproc.rs` (thin handlers that validate
//! arguments, read/write user memory through the process's address space,
//! and delegate the actual state transition to the kernel/process layer).
//! Failures are returned, never mapped to a sentinel here; [`crate::syscall::dispatch`]
//! does that once, centrally.

use std::sync::Arc;

use crate::error::KernelError;
use crate::kernel::Kernel;
use crate::process::Process;
use crate::syscall::{SyscallArgs, SyscallError};

pub fn halt(kernel: &Arc<Kernel>, proc: &Arc<Process>) -> Result<i32, SyscallError> {
    if !proc.is_root() {
        return Ok(0);
    }
    kernel.halt();
    Ok(0)
}

pub fn exit(kernel: &Arc<Kernel>, proc: &Arc<Process>, status: i32) -> Result<i32, SyscallError> {
    kernel.exit(proc, status);
    Ok(0)
}

pub fn exec(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    let argc = args.a1;
    if argc < 0 {
        return Err(SyscallError::BadArgument);
    }

    let name = proc
        .with_address_space(|space| space.read_c_string(kernel.memory(), args.a0 as u32, 256))
        .flatten()
        .ok_or(SyscallError::BadArgument)?;
    if !name.ends_with(&kernel.config().executable_suffix) {
        return Err(SyscallError::Kernel(KernelError::InvalidExecutable));
    }

    let argv_addr = args.a2 as u32;
    let mut argv = Vec::with_capacity(argc as usize);
    for i in 0..argc {
        let ptr_addr = argv_addr + (i as u32) * 4;
        let mut ptr_bytes = [0u8; 4];
        let got = proc
            .with_address_space(|space| space.read_virtual_memory(kernel.memory(), ptr_addr, &mut ptr_bytes, 0, 4))
            .unwrap_or(0);
        if got != 4 {
            return Err(SyscallError::BadArgument);
        }
        let arg_addr = u32::from_le_bytes(ptr_bytes);
        let arg = proc
            .with_address_space(|space| space.read_c_string(kernel.memory(), arg_addr, 256))
            .flatten()
            .ok_or(SyscallError::BadArgument)?;
        argv.push(arg);
    }

    let pid = kernel.exec(proc, &name, argv)?;
    Ok(pid as i32)
}

pub fn join(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    let pid = args.a0 as u32;
    let status_addr = args.a1 as u32;

    let status = kernel
        .join(proc, pid)
        .ok_or(SyscallError::Kernel(KernelError::NoSuchProcess))?;

    let bytes = status.to_le_bytes();
    let written = proc
        .with_address_space(|space| space.write_virtual_memory(kernel.memory(), status_addr, &bytes, 0, 4))
        .unwrap_or(0);
    Ok(if written == 4 { 1 } else { 0 })
}
