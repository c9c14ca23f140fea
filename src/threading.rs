//! Implements the park/wake primitive for search worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};


struct State {
    idle: bool,
    quit: bool,
}

/// The control block shared between a worker thread and its owner.
///
/// A worker spends its life inside `run`, parked on the condition
/// variable between searches. `start_thinking` wakes it for one call
/// of the supplied closure; `stop_thinking` raises the cooperative
/// stop flag the closure is expected to poll; `request_quit` makes
/// `run` return.
///
/// Callers must hold the idle/wake discipline: wait until the worker
/// is idle before starting it again, or the wake-up may be lost. The
/// search pool enforces this by stopping and waiting before every
/// start.
pub struct Control {
    state: Mutex<State>,
    condvar: Condvar,
    stop: AtomicBool,
}

impl Control {
    pub fn new() -> Control {
        Control {
            state: Mutex::new(State {
                idle: false,
                quit: false,
            }),
            condvar: Condvar::new(),
            stop: AtomicBool::new(false),
        }
    }

    /// Returns `true` if the cooperative stop flag is raised.
    ///
    /// Search code polls this on entry to every node; a raised flag
    /// makes the search unwind as soon as each frame returns.
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Raises the cooperative stop flag.
    pub fn stop_thinking(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns `true` if the worker is parked.
    pub fn is_idle(&self) -> bool {
        self.state.lock().unwrap().idle
    }

    /// Blocks until the worker is parked.
    pub fn wait_until_idle(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.idle {
            state = self.condvar.wait(state).unwrap();
        }
    }

    /// Clears the stop flag and wakes the worker for one search.
    pub fn start_thinking(&self) {
        let mut state = self.state.lock().unwrap();
        self.stop.store(false, Ordering::Release);
        state.idle = false;
        self.condvar.notify_all();
    }

    /// Makes the worker's `run` loop return. The worker is also
    /// unblocked from any running search via the stop flag.
    pub fn request_quit(&self) {
        let mut state = self.state.lock().unwrap();
        self.stop.store(true, Ordering::Release);
        state.quit = true;
        state.idle = false;
        self.condvar.notify_all();
    }

    /// The worker thread's main loop: park, run one search, park
    /// again.
    pub fn run<F: FnMut()>(&self, mut think: F) {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                state.idle = true;
                self.condvar.notify_all();
                while state.idle {
                    state = self.condvar.wait(state).unwrap();
                }
                if state.quit {
                    break;
                }
            }
            think();
        }
    }
}

impl Default for Control {
    fn default() -> Control {
        Control::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn park_wake_quit() {
        let control = Arc::new(Control::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = {
            let control = control.clone();
            let counter = counter.clone();
            thread::spawn(move || {
                control.run(|| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            })
        };

        control.wait_until_idle();
        assert!(control.is_idle());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        for expected in 1..=3 {
            control.start_thinking();
            control.wait_until_idle();
            assert_eq!(counter.load(Ordering::SeqCst), expected);
        }

        control.request_quit();
        handle.join().unwrap();
    }

    #[test]
    fn stop_flag_interrupts_a_search() {
        let control = Arc::new(Control::new());
        let handle = {
            let control = control.clone();
            thread::spawn(move || {
                control.run(|| {
                    while !control.should_stop() {
                        thread::yield_now();
                    }
                });
            })
        };

        control.wait_until_idle();
        control.start_thinking();
        assert!(!control.should_stop());
        thread::sleep(Duration::from_millis(10));
        control.stop_thinking();
        control.wait_until_idle();
        control.request_quit();
        handle.join().unwrap();
    }
}
