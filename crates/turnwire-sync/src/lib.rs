//! Turn-gating concurrency primitives for Turnwire.
//!
//! Provides [`CountUpAndDownLatch`], a countdown latch that can also
//! count *up*, and [`PhaseGate`], the domain-facing wrapper the hub uses
//! to hold a phase change until every remote participant has
//! acknowledged it.
//!
//! # Why not a plain countdown latch
//!
//! A one-way latch fixes its count at construction. Turn coordination
//! doesn't work that way: participants join the wait set while the
//! phase is already pending (count goes up), acknowledgments arrive
//! (count goes down), and a disconnect may retract several outstanding
//! acknowledgments at once (delta). The game-logic thread parks on the
//! latch until the count reaches zero.
//!
//! # Blocking, deliberately
//!
//! `wait` parks the calling OS thread. Game logic runs on its own
//! dedicated thread, separate from connection tasks, so blocking there
//! is correct — this crate has no async runtime dependency. Shutdown
//! paths unblock waiters with [`CountUpAndDownLatch::release_all`].

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

// ---------------------------------------------------------------------------
// CountUpAndDownLatch
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LatchState {
    count: u64,
    original: u64,
}

/// A latch whose count can move in both directions.
///
/// The latch is "blocking" while `count > 0` and "open" at zero. Unlike
/// a one-shot countdown latch there is no terminal state:
/// [`increment`](Self::increment) can close an open latch again.
///
/// All transitions are atomic with respect to concurrent waiters: the
/// transition that reaches exactly zero wakes every thread currently
/// parked in [`wait`](Self::wait), a `wait` entered while the count is
/// already zero returns immediately, and the count is never observably
/// negative — decrements clamp at zero rather than underflow.
#[derive(Debug)]
pub struct CountUpAndDownLatch {
    state: Mutex<LatchState>,
    zero: Condvar,
}

impl CountUpAndDownLatch {
    /// Creates a latch with the given initial count.
    ///
    /// The initial count is remembered so
    /// [`reset_count`](Self::reset_count) can restore it later.
    pub fn new(count: u64) -> Self {
        Self {
            state: Mutex::new(LatchState {
                count,
                original: count,
            }),
            zero: Condvar::new(),
        }
    }

    /// Current count. A snapshot only — another thread may change it
    /// before the caller acts on it.
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// Raises the count by one, possibly re-closing an open latch.
    pub fn increment(&self) {
        self.lock().count += 1;
    }

    /// Lowers the count by one, clamped at zero. Reaching zero wakes
    /// all waiters; counting down an already-open latch is a no-op.
    pub fn count_down(&self) {
        self.apply_delta(-1);
    }

    /// Adjusts the count by `delta` in one atomic step, clamping at
    /// zero if the result would be negative.
    pub fn apply_delta(&self, delta: i64) {
        let mut state = self.lock();
        let before = state.count;
        state.count = if delta >= 0 {
            before.saturating_add(delta as u64)
        } else {
            before.saturating_sub(delta.unsigned_abs())
        };
        if before > 0 && state.count == 0 {
            self.zero.notify_all();
        }
    }

    /// Forces the count to zero, waking all waiters.
    pub fn release_all(&self) {
        let mut state = self.lock();
        if state.count > 0 {
            state.count = 0;
            self.zero.notify_all();
        }
    }

    /// Restores the construction-time count, whatever the current count
    /// is. For a latch constructed with zero this is equivalent to
    /// [`release_all`](Self::release_all).
    pub fn reset_count(&self) {
        let mut state = self.lock();
        let before = state.count;
        state.count = state.original;
        if before > 0 && state.count == 0 {
            self.zero.notify_all();
        }
    }

    /// Parks the calling thread until the count reaches zero. Returns
    /// immediately if the latch is already open.
    pub fn wait(&self) {
        let state = self.lock();
        // Condvar wakeups may be spurious; the predicate re-check is load-bearing.
        let _open = self
            .zero
            .wait_while(state, |s| s.count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Bounded [`wait`](Self::wait): returns `true` if the latch opened
    /// within `timeout`, `false` otherwise. Timing out has no effect on
    /// the count.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, result) = self
            .zero
            .wait_timeout_while(state, timeout, |s| s.count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        // On timeout the count may still have hit zero between the last
        // predicate check and the return; report what is actually true.
        !result.timed_out() || state.count == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LatchState> {
        // A poisoned latch would deadlock every participant; recover the
        // guard instead, the counter itself cannot be left half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// PhaseGate
// ---------------------------------------------------------------------------

/// Gates phase advancement on remote acknowledgments.
///
/// A thin domain wrapper over [`CountUpAndDownLatch`]: participants
/// joining the wait set increment the latch, acknowledgments count it
/// down, and the game-logic thread calls [`wait_all`](Self::wait_all)
/// before advancing. A participant that disconnects mid-phase is
/// retracted with [`retract`](Self::retract) so the gate cannot hang on
/// an acknowledgment that will never come.
#[derive(Debug)]
pub struct PhaseGate {
    latch: CountUpAndDownLatch,
}

impl PhaseGate {
    /// Creates an open gate with no participants.
    pub fn new() -> Self {
        Self {
            latch: CountUpAndDownLatch::new(0),
        }
    }

    /// Adds one participant whose acknowledgment the gate now requires.
    pub fn add_participant(&self) {
        self.latch.increment();
        tracing::trace!(pending = self.latch.count(), "participant added to gate");
    }

    /// Records one acknowledgment.
    pub fn acknowledge(&self) {
        self.latch.count_down();
        tracing::trace!(pending = self.latch.count(), "acknowledgment received");
    }

    /// Retracts `n` outstanding acknowledgments in one step, e.g. when a
    /// node with several pending players disconnects.
    pub fn retract(&self, n: u64) {
        self.latch.apply_delta(-(n as i64));
    }

    /// Number of acknowledgments still outstanding.
    pub fn pending(&self) -> u64 {
        self.latch.count()
    }

    /// Blocks until every participant has acknowledged.
    pub fn wait_all(&self) {
        self.latch.wait();
    }

    /// Bounded [`wait_all`](Self::wait_all); `false` on timeout.
    pub fn wait_all_timeout(&self, timeout: Duration) -> bool {
        self.latch.wait_timeout(timeout)
    }

    /// Force-opens the gate, e.g. on shutdown, waking the game-logic
    /// thread regardless of outstanding acknowledgments.
    pub fn release(&self) {
        tracing::debug!(pending = self.latch.count(), "phase gate released");
        self.latch.release_all();
    }
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_latch_reports_initial_count() {
        let latch = CountUpAndDownLatch::new(3);
        assert_eq!(latch.count(), 3);
    }

    #[test]
    fn test_count_down_reaches_zero_after_n_calls() {
        let latch = CountUpAndDownLatch::new(3);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 1);
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_count_down_past_zero_clamps() {
        let latch = CountUpAndDownLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_increment_recloses_open_latch() {
        let latch = CountUpAndDownLatch::new(0);
        latch.increment();
        assert_eq!(latch.count(), 1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_apply_delta_clamps_negative_overshoot() {
        let latch = CountUpAndDownLatch::new(2);
        latch.apply_delta(-5);
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_apply_delta_positive() {
        let latch = CountUpAndDownLatch::new(1);
        latch.apply_delta(3);
        assert_eq!(latch.count(), 4);
    }

    #[test]
    fn test_wait_on_open_latch_returns_immediately() {
        let latch = CountUpAndDownLatch::new(0);
        latch.wait(); // must not block
    }

    #[test]
    fn test_wait_timeout_expires_on_blocking_latch() {
        let latch = CountUpAndDownLatch::new(1);
        assert!(!latch.wait_timeout(Duration::from_millis(20)));
        // Timing out left the count untouched.
        assert_eq!(latch.count(), 1);
    }

    #[test]
    fn test_wait_timeout_true_on_open_latch() {
        let latch = CountUpAndDownLatch::new(0);
        assert!(latch.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_release_all_forces_zero() {
        let latch = CountUpAndDownLatch::new(5);
        latch.release_all();
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_reset_count_restores_original() {
        let latch = CountUpAndDownLatch::new(2);
        latch.count_down();
        latch.increment();
        latch.increment();
        latch.reset_count();
        assert_eq!(latch.count(), 2);
    }

    #[test]
    fn test_reset_count_of_zero_latch_opens_it() {
        let latch = CountUpAndDownLatch::new(0);
        latch.increment();
        latch.reset_count();
        assert_eq!(latch.count(), 0);
        assert!(latch.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_phase_gate_lifecycle() {
        let gate = PhaseGate::new();
        gate.add_participant();
        gate.add_participant();
        assert_eq!(gate.pending(), 2);
        gate.acknowledge();
        gate.acknowledge();
        assert_eq!(gate.pending(), 0);
        gate.wait_all(); // open, returns immediately
    }

    #[test]
    fn test_phase_gate_retract_unblocks() {
        let gate = PhaseGate::new();
        gate.add_participant();
        gate.add_participant();
        gate.add_participant();
        gate.acknowledge();
        gate.retract(2);
        assert_eq!(gate.pending(), 0);
    }
}
