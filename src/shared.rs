//! State shared between the mission thread and its observers.
//!
//! The mission thread publishes a whole [`StatusSnapshot`] at a time, so a
//! reader never sees the pose of one tick next to the wheels of another.
//! The main thread reads it for progress reporting and raises the stop flag
//! on Ctrl-C.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::control::WheelCommand;
use crate::geometry::Pose;
use crate::mission::MissionState;

/// Progress as seen from outside the mission thread.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatusSnapshot {
    pub pose: Pose,
    pub wheels: WheelCommand,
    pub state: MissionState,
    pub goal_index: usize,
    pub total_goals: usize,
    pub collisions: u32,
    pub ticks: u64,
}

/// Shared mission state.
#[derive(Debug, Default)]
pub struct SharedState {
    /// Written by the mission thread, read by observers
    status: Mutex<StatusSnapshot>,
    /// Stop requested by the operator
    stop: AtomicBool,
    finished: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published status in one step.
    pub fn publish(&self, status: StatusSnapshot) {
        *self.status.lock() = status;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        *self.status.lock()
    }

    /// Ask the mission loop to stop at its next tick.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn status_for(n: u64) -> StatusSnapshot {
        let v = n as f32;
        StatusSnapshot {
            pose: Pose::new(v, -v, 0.0),
            wheels: WheelCommand::new(v, v),
            state: MissionState::Seeking {
                goal_index: n as usize,
            },
            goal_index: n as usize,
            total_goals: n as usize + 1,
            collisions: n as u32,
            ticks: n,
        }
    }

    #[test]
    fn test_snapshot_returns_last_published() {
        let shared = SharedState::new();
        assert_eq!(shared.snapshot(), StatusSnapshot::default());

        shared.publish(status_for(7));
        assert_eq!(shared.snapshot(), status_for(7));
    }

    #[test]
    fn test_concurrent_reader_sees_whole_ticks() {
        let shared = Arc::new(SharedState::new());
        let writer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for n in 0..20_000u64 {
                    shared.publish(status_for(n));
                }
                shared.mark_finished();
            })
        };

        let mut last_tick = 0;
        while !shared.is_finished() {
            let snap = shared.snapshot();
            assert_eq!(snap, status_for(snap.ticks));
            assert!(snap.ticks >= last_tick);
            last_tick = snap.ticks;
        }
        writer.join().unwrap();
        assert_eq!(shared.snapshot(), status_for(19_999));
    }

    #[test]
    fn test_stop_flag() {
        let shared = SharedState::new();
        assert!(!shared.stop_requested());
        shared.request_stop();
        assert!(shared.stop_requested());
    }
}
