//! Physical frame allocator.
//!
//! Grounded in the teacher's page-frame free list (a plain `Vec`/`VecDeque`
//! guarded by a single lock, populated once at boot with every frame number),
//! redesigned per the shared-state design note: this lock is a real
//! `std::sync::Mutex`, not the interrupt gate in `interrupt.rs`.
//!
//! `acquire_many` exists so that address-space construction can reserve every
//! frame an executable image needs in one call. The original's page-at-a-time
//! loop can leak frames if it fails partway through a multi-page allocation;
//! reserving the whole run up front, or none of it, removes that failure mode.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::warn;

use crate::error::KernelError;

pub struct FrameAllocator {
    free: Mutex<VecDeque<usize>>,
}

impl FrameAllocator {
    /// Creates an allocator owning frames `0..num_frames`.
    pub fn new(num_frames: usize) -> Self {
        FrameAllocator {
            free: Mutex::new((0..num_frames).collect()),
        }
    }

    /// Reserves a single frame.
    pub fn acquire(&self) -> Result<usize, KernelError> {
        let frame = self.free.lock().unwrap().pop_front();
        frame.ok_or_else(|| {
            warn!(target: "kernel::frame", "frame allocator exhausted");
            KernelError::OutOfMemory
        })
    }

    /// Reserves `count` frames atomically: either all of them are returned,
    /// or none are taken and [`KernelError::OutOfMemory`] is returned.
    pub fn acquire_many(&self, count: usize) -> Result<Vec<usize>, KernelError> {
        let mut free = self.free.lock().unwrap();
        if free.len() < count {
            warn!(target: "kernel::frame", "frame allocator exhausted: wanted {count}, had {}", free.len());
            return Err(KernelError::OutOfMemory);
        }
        Ok((0..count).map(|_| free.pop_front().unwrap()).collect())
    }

    /// Returns a single frame to the free list.
    pub fn release(&self, frame: usize) {
        self.free.lock().unwrap().push_back(frame);
    }

    /// Returns a run of frames to the free list.
    pub fn release_many(&self, frames: &[usize]) {
        let mut free = self.free.lock().unwrap();
        free.extend(frames.iter().copied());
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_round_trips() {
        let frames = FrameAllocator::new(4);
        let a = frames.acquire().unwrap();
        let b = frames.acquire().unwrap();
        assert_ne!(a, b);
        assert_eq!(frames.free_count(), 2);
        frames.release(a);
        frames.release(b);
        assert_eq!(frames.free_count(), 4);
    }

    #[test]
    fn acquire_many_is_all_or_nothing() {
        let frames = FrameAllocator::new(3);
        assert!(frames.acquire_many(4).is_err());
        assert_eq!(frames.free_count(), 3, "a failed batch must not consume frames");

        let run = frames.acquire_many(3).unwrap();
        assert_eq!(run.len(), 3);
        assert_eq!(frames.free_count(), 0);
        assert!(frames.acquire().is_err());
    }

    #[test]
    fn exhaustion_reports_out_of_memory() {
        let frames = FrameAllocator::new(1);
        frames.acquire().unwrap();
        assert_eq!(frames.acquire().unwrap_err(), KernelError::OutOfMemory);
    }
}
