use super::navigation_service::{NavigationService, NavigationStep};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Completed,
    /// The robot had no active guide, e.g. it was cancelled elsewhere.
    NoActiveGuide,
    /// An emergency stop holds the robot.
    Halted,
    Stopped,
}

/// Handle to a running continuous navigation task.
pub struct NavigationLoop {
    robot_id: i64,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<LoopExit>,
}

impl NavigationLoop {
    /// Steps the robot's guide immediately and then every `interval`. A tick
    /// that arrives while a step is still running is skipped. Step errors are
    /// logged and the loop keeps going.
    pub fn start(service: Arc<NavigationService>, robot_id: i64, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                "Continuous navigation for robot {} every {} ms",
                robot_id,
                interval.as_millis()
            );

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::info!("Continuous navigation for robot {} stopped", robot_id);
                        return LoopExit::Stopped;
                    }
                    _ = ticker.tick() => {}
                }

                match service.drive_step(robot_id).await {
                    Ok(NavigationStep::Completed { .. }) => {
                        tracing::info!("Continuous navigation for robot {} completed", robot_id);
                        return LoopExit::Completed;
                    }
                    Ok(NavigationStep::Idle) => return LoopExit::NoActiveGuide,
                    Ok(NavigationStep::Halted { guide_id }) => {
                        tracing::warn!("Continuous navigation for robot {} halted on guide {}", robot_id, guide_id);
                        return LoopExit::Halted;
                    }
                    Ok(NavigationStep::Advanced { progress, .. }) => {
                        tracing::debug!(
                            "Robot {} at {:.0}% of guide {}",
                            robot_id,
                            progress.progress_percent,
                            progress.guide_id
                        );
                    }
                    Err(e) => {
                        tracing::error!("Navigation step for robot {} failed: {}", robot_id, e);
                    }
                }
            }
        });

        Self {
            robot_id,
            stop: Some(stop_tx),
            task,
        }
    }

    pub fn robot_id(&self) -> i64 {
        self.robot_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop between steps and reports how it ended.
    pub async fn stop(mut self) -> LoopExit {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.wait().await
    }

    pub async fn wait(self) -> LoopExit {
        match self.task.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!("Navigation loop for robot {} aborted: {}", self.robot_id, e);
                LoopExit::Stopped
            }
        }
    }
}

impl NavigationService {
    /// Starts a [`NavigationLoop`] at the configured interval.
    pub fn start_continuous(self: &Arc<Self>, robot_id: i64) -> NavigationLoop {
        let interval = self.navigation_config().continuous_interval();
        NavigationLoop::start(self.clone(), robot_id, interval)
    }
}
