use super::commands::RobotCommand;
use super::dispatcher::{CommandDispatcher, DispatchReceipt};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceStep {
    pub command: RobotCommand,
    /// Pause after this step; skipped after the last one.
    pub delay_after: Option<Duration>,
    pub stop_on_error: bool,
}

impl SequenceStep {
    pub fn new(command: RobotCommand) -> Self {
        Self {
            command,
            delay_after: None,
            stop_on_error: false,
        }
    }

    pub fn delay_after(mut self, delay: Duration) -> Self {
        self.delay_after = Some(delay);
        self
    }

    pub fn stop_on_error(mut self) -> Self {
        self.stop_on_error = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub index: usize,
    pub command: &'static str,
    pub success: bool,
    pub error: Option<String>,
    pub receipt: Option<DispatchReceipt>,
}

impl CommandDispatcher {
    /// Runs the steps in order. Not transactional: steps already sent stay
    /// applied when a later one fails.
    pub async fn run_sequence(&self, robot_id: i64, steps: Vec<SequenceStep>) -> Vec<StepOutcome> {
        let total = steps.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, step) in steps.into_iter().enumerate() {
            let name = step.command.name();
            tracing::debug!("Robot {} sequence step {}/{}: {}", robot_id, index + 1, total, name);

            match self.dispatch(robot_id, step.command).await {
                Ok(receipt) => {
                    outcomes.push(StepOutcome {
                        index,
                        command: name,
                        success: true,
                        error: None,
                        receipt: Some(receipt),
                    });
                    if let Some(delay) = step.delay_after.filter(|_| index + 1 < total) {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Robot {} sequence step {} ({}) failed: {}", robot_id, index + 1, name, e);
                    outcomes.push(StepOutcome {
                        index,
                        command: name,
                        success: false,
                        error: Some(e.to_string()),
                        receipt: None,
                    });
                    if step.stop_on_error {
                        break;
                    }
                }
            }
        }

        outcomes
    }
}
