//! Unbuffered synchronous many-to-many rendezvous for 32-bit words.
//!
//! Grounded in the spec's own description of the source's communicator:
//! a shared word plus a ready flag, guarded by one mutex with two condition
//! variables (one per role), built on this crate's [`crate::sync`]
//! primitives the same way the teacher's `sleeplock` sits atop its `spinlock`.

use std::sync::Arc;

use log::trace;

use crate::sync::{CondVar, Mutex};

struct State {
    word_ready: bool,
    word: i32,
    num_speakers: u32,
    num_listeners: u32,
}

pub struct Communicator {
    state: Arc<Mutex<State>>,
    speakers: CondVar<State>,
    listeners: CondVar<State>,
}

impl Communicator {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(State {
            word_ready: false,
            word: 0,
            num_speakers: 0,
            num_listeners: 0,
        }));
        Communicator {
            speakers: CondVar::new(state.clone()),
            listeners: CondVar::new(state.clone()),
            state,
        }
    }

    /// Blocks until some `listen()` call has taken `word`.
    pub fn speak(&self, word: i32) {
        let mut guard = self.state.acquire();
        guard.num_speakers += 1;
        while guard.num_listeners == 0 || guard.word_ready {
            guard = self.speakers.sleep(guard);
        }
        guard.word = word;
        guard.word_ready = true;
        trace!(target: "kernel::communicator", "paired word {word} with a listener");
        self.listeners.wake_all(&guard);
        guard.num_speakers -= 1;
    }

    /// Blocks until some `speak()` call has deposited a word, then returns it.
    pub fn listen(&self) -> i32 {
        let mut guard = self.state.acquire();
        guard.num_listeners += 1;
        while !guard.word_ready {
            self.speakers.wake_all(&guard);
            guard = self.listeners.sleep(guard);
        }
        let word = guard.word;
        guard.word_ready = false;
        guard.num_listeners -= 1;
        word
    }
}

impl Default for Communicator {
    fn default() -> Self {
        Communicator::new()
    }
}
