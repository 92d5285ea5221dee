use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per robot id. Holding the guard serializes every
/// navigation step and state change for that robot.
#[derive(Default)]
pub struct RobotLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

pub type RobotGuard = OwnedMutexGuard<()>;

impl RobotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, robot_id: i64) -> RobotGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(robot_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Non-blocking probe, `None` while another task holds the robot.
    pub fn try_acquire(&self, robot_id: i64) -> Option<RobotGuard> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(robot_id).or_default().clone()
        };
        lock.try_lock_owned().ok()
    }

    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Robots held by an emergency stop. Stepping stays suspended until the
/// flag is cleared by a release or an explicit resume.
#[derive(Default)]
pub struct HaltFlags {
    halted: Mutex<HashSet<i64>>,
}

impl HaltFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self, robot_id: i64) {
        self.halted.lock().unwrap_or_else(|e| e.into_inner()).insert(robot_id);
    }

    /// Returns whether the robot was halted.
    pub fn clear(&self, robot_id: i64) -> bool {
        self.halted.lock().unwrap_or_else(|e| e.into_inner()).remove(&robot_id)
    }

    pub fn is_halted(&self, robot_id: i64) -> bool {
        self.halted.lock().unwrap_or_else(|e| e.into_inner()).contains(&robot_id)
    }
}
