//! Kernel-wide configuration.
//!
//! The original hardcodes these as scattered constants (see the teacher's
//! `param.rs` for the pattern this groups). They are collected here as a
//! value rather than bare `const`s so a test harness can shrink `num_phys_pages`
//! or `max_files` to exercise the exhaustion paths called out in the spec's
//! testable properties.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of physical page frames the simulated machine exposes.
    pub num_phys_pages: usize,
    /// Bytes per page.
    pub page_size: usize,
    /// Per-process file-descriptor table size, including the reserved stdin/stdout slots.
    pub max_files: usize,
    /// Stack pages appended after the loaded sections, growing down.
    pub stack_pages: usize,
    /// Required suffix on names passed to `exec`.
    pub executable_suffix: String,
    /// Approximate tick period between timer interrupts, for documentation/tests only;
    /// the core never schedules ticks itself, it only reacts to them.
    pub ticks_per_interrupt: u64,
    /// Selects the root process's [`crate::vm::ProcessKind`] by name (see
    /// `ProcessKind::from_name`). A child inherits its parent's kind rather
    /// than consulting this field again.
    pub process_kind: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            num_phys_pages: 64,
            page_size: 1024,
            max_files: 16,
            stack_pages: 8,
            executable_suffix: ".coff".to_string(),
            ticks_per_interrupt: 500,
            process_kind: "base".to_string(),
        }
    }
}
