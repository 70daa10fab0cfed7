//! Process Control Block and the fixed 8-slot process pool.
//!
//! There is no dynamic process allocation: `MAX_PROCESSES` PCBs live in a
//! static array and `execute` claims the lowest free index, matching the
//! source kernel's `pid` assignment (smallest unused id wins, so a
//! short-lived shell under a rapidly forking program reuses the same
//! handful of ids rather than growing unbounded).

use spin::Mutex;

use crate::{arch::x86::context::SavedFrame, error::KernelError, process::fd_table::FdTable};

pub const MAX_PROCESSES: usize = 8;
/// Matches the source kernel's `parse_cmd_args` buffer: command name plus
/// a single argument string, NUL-terminated.
pub const ARGS_BUF_LEN: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessId(pub u8);

pub struct Pcb {
    pub pid: ProcessId,
    pub parent: Option<ProcessId>,
    pub terminal: u8,
    pub args: [u8; ARGS_BUF_LEN],
    pub args_len: usize,
    pub fds: FdTable,
    /// Stack frame `execute` suspended into when it dropped to user mode;
    /// `halt` resumes it.
    pub saved: SavedFrame,
    /// Stack frame saved by the scheduler's preemption tick, restored on
    /// this process's next time slice. Distinct from `saved` because a
    /// process can be preempted many times between `execute` and `halt`.
    pub preempt: SavedFrame,
    in_use: bool,
}

impl Pcb {
    const fn empty() -> Self {
        Pcb {
            pid: ProcessId(0),
            parent: None,
            terminal: 0,
            args: [0; ARGS_BUF_LEN],
            args_len: 0,
            fds: FdTable::new(),
            saved: SavedFrame { esp: 0, ebp: 0 },
            preempt: SavedFrame { esp: 0, ebp: 0 },
            in_use: false,
        }
    }

    pub fn command(&self) -> &[u8] {
        &self.args[..self.args_len]
    }
}

pub struct ProcessPool {
    slots: [Pcb; MAX_PROCESSES],
}

impl ProcessPool {
    const fn new() -> Self {
        ProcessPool {
            slots: [
                Pcb::empty(),
                Pcb::empty(),
                Pcb::empty(),
                Pcb::empty(),
                Pcb::empty(),
                Pcb::empty(),
                Pcb::empty(),
                Pcb::empty(),
            ],
        }
    }

    /// Claim the lowest-index free slot for `terminal`, with `parent` as
    /// the process that called `execute` (`None` for a terminal's first,
    /// shell-launching process).
    pub fn allocate(
        &mut self,
        parent: Option<ProcessId>,
        terminal: u8,
        args: &[u8],
    ) -> Result<&mut Pcb, KernelError> {
        let index = self
            .slots
            .iter()
            .position(|pcb| !pcb.in_use)
            .ok_or(KernelError::ProcessSlotsExhausted)?;

        let pcb = &mut self.slots[index];
        *pcb = Pcb::empty();
        pcb.pid = ProcessId(index as u8);
        pcb.parent = parent;
        pcb.terminal = terminal;
        pcb.in_use = true;
        let len = args.len().min(ARGS_BUF_LEN);
        pcb.args[..len].copy_from_slice(&args[..len]);
        pcb.args_len = len;
        Ok(pcb)
    }

    pub fn free(&mut self, pid: ProcessId) {
        self.slots[pid.0 as usize] = Pcb::empty();
    }

    pub fn get(&self, pid: ProcessId) -> &Pcb {
        &self.slots[pid.0 as usize]
    }

    pub fn get_mut(&mut self, pid: ProcessId) -> &mut Pcb {
        &mut self.slots[pid.0 as usize]
    }

    pub fn in_use(&self, pid: ProcessId) -> bool {
        self.slots[pid.0 as usize].in_use
    }
}

pub static PROCESSES: Mutex<ProcessPool> = Mutex::new(ProcessPool::new());

/// The process presently executing on the CPU, i.e. the innermost link
/// in whichever terminal's `execute`/`halt` call chain is currently live.
/// Distinct from a terminal's displayed-on-screen status: a background
/// terminal's process can be `CURRENT` while another terminal's content
/// is what the user sees.
pub static CURRENT: Mutex<Option<ProcessId>> = Mutex::new(None);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_picks_smallest_free_index() {
        let mut pool = ProcessPool::new();
        let a = pool.allocate(None, 0, b"shell").unwrap().pid;
        let b = pool.allocate(Some(a), 0, b"ls").unwrap().pid;
        assert_eq!(a, ProcessId(0));
        assert_eq!(b, ProcessId(1));
        pool.free(a);
        let c = pool.allocate(Some(b), 0, b"cat").unwrap().pid;
        assert_eq!(c, ProcessId(0));
    }

    #[test]
    fn exhausted_pool_errors() {
        let mut pool = ProcessPool::new();
        for _ in 0..MAX_PROCESSES {
            pool.allocate(None, 0, b"x").unwrap();
        }
        assert_eq!(
            pool.allocate(None, 0, b"y").unwrap_err(),
            KernelError::ProcessSlotsExhausted
        );
    }

    #[test]
    fn args_longer_than_buffer_are_truncated() {
        let mut pool = ProcessPool::new();
        let long = [b'a'; ARGS_BUF_LEN + 16];
        let pid = pool.allocate(None, 0, &long).unwrap().pid;
        assert_eq!(pool.get(pid).command().len(), ARGS_BUF_LEN);
    }
}
