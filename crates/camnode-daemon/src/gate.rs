//! Network-readiness gate shared between the connectivity observer and the
//! discovery worker.
//!
//! The connectivity subsystem calls [`NetworkGate::set_ready`] whenever the
//! station gains or loses its IP address; the discovery worker blocks in
//! [`NetworkGate::wait_ready`] until the link is up. There is exactly one
//! writer (the observer) and one reader (the worker), so a single
//! Mutex-guarded flag with a condition variable is all the synchronisation
//! this needs.
//!
//! The gate also carries the process shutdown signal. The worker loop never
//! terminates on its own; [`NetworkGate::shutdown`] is how the binary asks it
//! to stop so the thread can be joined.

use std::sync::{Condvar, Mutex};

/// Outcome of a blocking wait on the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    /// The network is ready; the worker may open a session.
    Ready,
    /// Process shutdown was requested; the worker must exit.
    Shutdown,
}

#[derive(Debug, Default)]
struct GateState {
    ready: bool,
    shutdown: bool,
}

/// Readiness/shutdown signal for the discovery worker.
#[derive(Debug, Default)]
pub struct NetworkGate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl NetworkGate {
    /// Creates a gate with the network marked not ready.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change in network readiness and wakes the worker.
    pub fn set_ready(&self, ready: bool) {
        let mut state = self.state.lock().expect("gate lock poisoned");
        state.ready = ready;
        self.signal.notify_all();
    }

    /// Requests worker shutdown and wakes it if it is parked on the gate.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("gate lock poisoned");
        state.shutdown = true;
        self.signal.notify_all();
    }

    /// Returns the current readiness flag without blocking.
    pub fn is_ready(&self) -> bool {
        self.state.lock().expect("gate lock poisoned").ready
    }

    /// Returns whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().expect("gate lock poisoned").shutdown
    }

    /// Blocks until the network is ready or shutdown is requested.
    ///
    /// This is a condition-variable wait, not a poll; the calling thread
    /// suspends indefinitely until one of the two signals arrives.
    pub fn wait_ready(&self) -> GateEvent {
        let mut state = self.state.lock().expect("gate lock poisoned");
        loop {
            if state.shutdown {
                return GateEvent::Shutdown;
            }
            if state.ready {
                return GateEvent::Ready;
            }
            state = self.signal.wait(state).expect("gate lock poisoned");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_gate_starts_not_ready() {
        let gate = NetworkGate::new();
        assert!(!gate.is_ready());
        assert!(!gate.is_shutdown());
    }

    #[test]
    fn test_wait_ready_returns_immediately_when_already_ready() {
        // Arrange
        let gate = NetworkGate::new();
        gate.set_ready(true);

        // Act / Assert
        assert_eq!(gate.wait_ready(), GateEvent::Ready);
    }

    #[test]
    fn test_set_ready_false_clears_the_flag() {
        let gate = NetworkGate::new();
        gate.set_ready(true);
        gate.set_ready(false);
        assert!(!gate.is_ready());
    }

    #[test]
    fn test_wait_ready_wakes_when_another_thread_signals() {
        // Arrange
        let gate = Arc::new(NetworkGate::new());
        let writer = Arc::clone(&gate);

        // Act – signal readiness from a second thread after a short delay
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            writer.set_ready(true);
        });

        // Assert – the wait returns once signalled
        assert_eq!(gate.wait_ready(), GateEvent::Ready);
        handle.join().expect("writer thread panicked");
    }

    #[test]
    fn test_wait_ready_wakes_on_shutdown() {
        // Arrange
        let gate = Arc::new(NetworkGate::new());
        let writer = Arc::clone(&gate);

        // Act
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            writer.shutdown();
        });

        // Assert – shutdown wins over an un-ready network
        assert_eq!(gate.wait_ready(), GateEvent::Shutdown);
        handle.join().expect("writer thread panicked");
    }

    #[test]
    fn test_shutdown_takes_precedence_over_ready() {
        let gate = NetworkGate::new();
        gate.set_ready(true);
        gate.shutdown();
        assert_eq!(gate.wait_ready(), GateEvent::Shutdown);
    }
}
