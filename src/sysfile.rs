//! `creat`, `open`, `read`, `write`, `close`, and `unlink` syscall handlers.
//!
//! Grounded in the teacher's `sysfile.rs` (read a name or buffer through the
//! current process's address space, forward to the file-system collaborator,
//! mutate the FD table). Deferred unlink and the slot-allocation and
//! name-lookup fixes live in [`crate::file::FdTable`]; this module just
//! wires syscall arguments to it. Failures are returned, never mapped to a
//! sentinel here; [`crate::syscall::dispatch`] does that once, centrally.

use std::sync::Arc;

use log::warn;

use crate::error::KernelError;
use crate::file::{FdTable, FileDescriptor};
use crate::kernel::Kernel;
use crate::process::Process;
use crate::syscall::{SyscallArgs, SyscallError};

fn open_or_create(
    kernel: &Arc<Kernel>,
    proc: &Arc<Process>,
    args: SyscallArgs,
    create_if_missing: bool,
) -> Result<i32, SyscallError> {
    let name = proc
        .with_address_space(|space| space.read_c_string(kernel.memory(), args.a0 as u32, 256))
        .flatten()
        .ok_or(SyscallError::BadArgument)?;

    let mut fds = proc.fds();
    let slot = fds.alloc_slot().ok_or_else(|| {
        warn!(target: "kernel::sysfile", "fd table full for pid={} opening {name}", proc.pid());
        SyscallError::Kernel(KernelError::FileTableFull)
    })?;
    let open_file = kernel
        .fs()
        .open(&name, create_if_missing)
        .ok_or(SyscallError::Kernel(KernelError::FileNotFound))?;
    fds.install(
        slot,
        FileDescriptor {
            open_file,
            position: 0,
            filename: name,
            to_delete: false,
        },
    );
    Ok(slot as i32)
}

pub fn creat(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    open_or_create(kernel, proc, args, true)
}

pub fn open(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    open_or_create(kernel, proc, args, false)
}

pub fn read(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    let fd = args.a0;
    let count = args.a2;
    if fd == 1 || fd < 0 || count < 0 {
        return Err(SyscallError::BadArgument);
    }
    let fd = fd as usize;
    let mut buf = vec![0u8; count as usize];

    let got = {
        let mut fds = proc.fds();
        if fd >= fds.len() {
            return Err(SyscallError::Kernel(KernelError::BadDescriptor));
        }
        let descriptor = fds.get_mut(fd).ok_or(SyscallError::Kernel(KernelError::BadDescriptor))?;
        if fd == FdTable::STDIN {
            descriptor.open_file.read(&mut buf)
        } else {
            let got = descriptor.open_file.read_at(descriptor.position, &mut buf);
            descriptor.position += got as u64;
            got
        }
    };

    let written = proc
        .with_address_space(|space| space.write_virtual_memory(kernel.memory(), args.a1 as u32, &buf, 0, got))
        .unwrap_or(0);
    Ok(written as i32)
}

pub fn write(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    let fd = args.a0;
    let count = args.a2;
    if fd == 0 || fd < 0 || count < 0 {
        return Err(SyscallError::BadArgument);
    }
    let fd = fd as usize;
    let mut buf = vec![0u8; count as usize];
    let obtained = proc
        .with_address_space(|space| space.read_virtual_memory(kernel.memory(), args.a1 as u32, &mut buf, 0, count as usize))
        .unwrap_or(0);

    let mut fds = proc.fds();
    if fd >= fds.len() {
        return Err(SyscallError::Kernel(KernelError::BadDescriptor));
    }
    let descriptor = fds.get_mut(fd).ok_or(SyscallError::Kernel(KernelError::BadDescriptor))?;
    let written = if fd == FdTable::STDOUT {
        descriptor.open_file.write(&buf[..obtained])
    } else {
        let written = descriptor.open_file.write_at(descriptor.position, &buf[..obtained]);
        descriptor.position += written as u64;
        written
    };
    Ok(written as i32)
}

pub fn close(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    let fd = args.a0;
    if fd < 0 {
        return Err(SyscallError::BadArgument);
    }
    let fd = fd as usize;
    let mut fds = proc.fds();
    if fd >= fds.len() {
        return Err(SyscallError::Kernel(KernelError::BadDescriptor));
    }
    let mut descriptor = fds.take(fd).ok_or(SyscallError::Kernel(KernelError::BadDescriptor))?;
    descriptor.open_file.close();
    if descriptor.to_delete && !kernel.fs().remove(&descriptor.filename) {
        return Err(SyscallError::Kernel(KernelError::FileNotFound));
    }
    Ok(0)
}

pub fn unlink(kernel: &Arc<Kernel>, proc: &Arc<Process>, args: SyscallArgs) -> Result<i32, SyscallError> {
    let name = proc
        .with_address_space(|space| space.read_c_string(kernel.memory(), args.a0 as u32, 256))
        .flatten()
        .ok_or(SyscallError::BadArgument)?;

    let mut fds = proc.fds();
    if let Some(slot) = fds.find_by_name(&name) {
        if let Some(descriptor) = fds.get_mut(slot) {
            descriptor.to_delete = true;
        }
        return Ok(0);
    }
    drop(fds);

    if kernel.fs().remove(&name) {
        Ok(0)
    } else {
        Err(SyscallError::Kernel(KernelError::FileNotFound))
    }
}
