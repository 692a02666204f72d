/*
 * Kernel thread records
 *
 * Threads here are always kernel-mode: there is no process/address-space
 * model in this build (out of scope), so a thread is just an execution
 * context plus the bookkeeping the scheduler and signal subsystem need.
 */

use alloc::boxed::Box;
use alloc::string::String;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::sched::config::{SIGNAL_ALTSTACK_SIZE, THREAD_STACK_SIZE};
use crate::sched::context::InterruptContext;
use crate::sched::types::{CpuId, SchedObjHandle};
use crate::signal::SignalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub usize);

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

pub struct Thread {
    pub id: ThreadId,
    pub name: String,
    pub state: ThreadState,
    pub sched_handle: SchedObjHandle,
    pub home_core: CpuId,
    pub stack: Box<[u8]>,
    /// Alternate stack a signal interceptor frame is built on when the
    /// pending signal carries `SEPARATE_STACK`, or always for
    /// `execute_local_trap`.
    pub altstack: Box<[u8]>,
    pub context: InterruptContext,
    pub signals: SignalState,
    pub cpu_ticks: u64,
    pub exit_code: Option<i32>,
    pub entry: fn(),
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("home_core", &self.home_core)
            .field("cpu_ticks", &self.cpu_ticks)
            .finish()
    }
}

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

pub fn allocate_thread_id() -> ThreadId {
    ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
}

/// Trampoline every new kernel thread's saved context points at. Runs the
/// thread's entry function, then reports exit to the scheduler rather than
/// falling off the end of the stack.
pub extern "C" fn thread_entry_trampoline() -> ! {
    let tid = crate::sched::current_thread_id();
    let entry = crate::sched::with_thread(tid, |t| t.entry).expect("current thread vanished");
    entry();
    crate::sched::exit_current_thread(0);
}

/// Namespaced thread lifecycle operations, mirroring the teacher's
/// ThreadManager as a zero-sized organizational type over the global
/// scheduler state.
pub struct ThreadManager;

impl ThreadManager {
    pub fn spawn(entry: fn(), name: &str) -> ThreadId {
        crate::sched::spawn_kernel_thread(entry, name)
    }

    pub fn exit(code: i32) -> ! {
        crate::sched::exit_current_thread(code)
    }

    pub fn current_id() -> ThreadId {
        crate::sched::current_thread_id()
    }

    pub fn with_current<F, R>(f: F) -> Option<R>
    where
        F: FnOnce(&Thread) -> R,
    {
        crate::sched::with_thread(Self::current_id(), f)
    }

    pub fn stack_size() -> usize {
        THREAD_STACK_SIZE
    }
}

/// Raw storage for a new thread's kernel stack, boxed onto the heap.
pub fn new_stack() -> Box<[u8]> {
    alloc::vec![0u8; THREAD_STACK_SIZE].into_boxed_slice()
}

/// Raw storage for a new thread's alternate signal stack, boxed onto the
/// heap.
pub fn new_altstack() -> Box<[u8]> {
    alloc::vec![0u8; SIGNAL_ALTSTACK_SIZE].into_boxed_slice()
}
