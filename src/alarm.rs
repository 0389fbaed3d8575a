//! Timer-interrupt-driven timed wakeups via a min-heap keyed on deadline.
//!
//! There is at most one alarm per kernel, wired to the timer collaborator's
//! interrupt handler at construction. Grounded in the interrupt-gate design:
//! both enqueuing a new waiter and draining due ones happen under
//! [`crate::interrupt::disable`], matching the spec's "with interrupts
//! disabled, drain every heap entry..." wording even though the heap itself
//! also needs an ordinary lock to be sound across real OS threads.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex as StdMutex};

use log::trace;

use crate::interrupt;
use crate::machine::Timer;
use crate::sync::{CondVar, Mutex};

struct Waiter {
    ready: Arc<Mutex<bool>>,
    cv: Arc<CondVar<bool>>,
}

struct HeapEntry {
    deadline: u64,
    waiter: Waiter,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    // Reversed so `BinaryHeap`, a max-heap, pops the smallest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

pub struct Alarm {
    timer: Arc<dyn Timer>,
    heap: StdMutex<BinaryHeap<HeapEntry>>,
}

impl Alarm {
    /// Builds an alarm and registers its drain routine as the timer's
    /// interrupt handler.
    pub fn new(timer: Arc<dyn Timer>) -> Arc<Self> {
        let alarm = Arc::new(Alarm {
            timer: timer.clone(),
            heap: StdMutex::new(BinaryHeap::new()),
        });
        let handler_alarm = alarm.clone();
        timer.set_interrupt_handler(Box::new(move || handler_alarm.on_tick()));
        alarm
    }

    /// Suspends the calling thread until the first timer interrupt at which
    /// `now >= now_at_call + ticks`. `ticks <= 0` returns immediately.
    pub fn wait_until(&self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        let deadline = self.timer.now() + ticks as u64;
        let ready = Arc::new(Mutex::new(false));
        let cv = Arc::new(CondVar::new(ready.clone()));

        {
            let _gate = interrupt::disable();
            self.heap.lock().unwrap().push(HeapEntry {
                deadline,
                waiter: Waiter {
                    ready: ready.clone(),
                    cv: cv.clone(),
                },
            });
        }

        let mut guard = ready.acquire();
        while !*guard {
            guard = cv.sleep(guard);
        }
    }

    /// Fires on every device tick. Wakes every waiter whose deadline has
    /// passed, in deadline order.
    fn on_tick(&self) {
        let _gate = interrupt::disable();
        let now = self.timer.now();
        let mut heap = self.heap.lock().unwrap();
        while let Some(top) = heap.peek() {
            if top.deadline >= now {
                break;
            }
            let entry = heap.pop().unwrap();
            trace!(target: "kernel::alarm", "waking waiter with deadline {} at tick {now}", entry.deadline);
            let mut guard = entry.waiter.ready.acquire();
            *guard = true;
            entry.waiter.cv.wake_all(&guard);
        }
    }
}
