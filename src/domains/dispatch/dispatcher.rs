use super::commands::{CommandMessage, MoveParams, RobotCommand};
use crate::common::{DomainError, DomainResult};
use crate::config::DispatchConfig;
use crate::domains::fleet::{OperationalState, RobotUnit};
use crate::domains::guidance::{NavigationEvent, NavigationEventSender};
use crate::domains::ports::{DeliveryReceipt, MessageBus, QoS, Repository};
use crate::domains::routing::{LocationTag, Route};
use crate::domains::topics::robot_topic;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a confirmed dispatch.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub robot_id: i64,
    pub topic: String,
    pub message: CommandMessage,
    pub delivered_at: DateTime<Utc>,
}

/// Single choke point for every outbound command. Callers that need
/// per-robot ordering hold the robot's lock around `dispatch`.
pub struct CommandDispatcher {
    repository: Arc<dyn Repository>,
    bus: Arc<dyn MessageBus>,
    ack_timeout: Option<Duration>,
    events: NavigationEventSender,
}

impl CommandDispatcher {
    pub fn new(
        repository: Arc<dyn Repository>,
        bus: Arc<dyn MessageBus>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            repository,
            bus,
            ack_timeout: config.ack_timeout(),
            events: NavigationEventSender::disabled(),
        }
    }

    pub fn with_events(mut self, events: NavigationEventSender) -> Self {
        self.events = events;
        self
    }

    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    /// Validates the robot, publishes and, for movement-class commands,
    /// marks the robot BUSY once the bus confirmed delivery. Any failure
    /// leaves the robot record untouched.
    pub async fn dispatch(&self, robot_id: i64, command: RobotCommand) -> DomainResult<DispatchReceipt> {
        if matches!(command, RobotCommand::EmergencyStop) {
            return self.emergency_stop(robot_id).await;
        }

        self.validate_robot(robot_id).await?;
        let receipt = self.publish(robot_id, &command).await?;

        if command.is_movement_class() {
            self.mark_busy(robot_id).await?;
        }
        Ok(receipt)
    }

    /// Always allowed, whatever the robot's state; only needs a live bus.
    pub async fn emergency_stop(&self, robot_id: i64) -> DomainResult<DispatchReceipt> {
        tracing::warn!("Emergency stop requested for robot {}", robot_id);
        self.publish(robot_id, &RobotCommand::EmergencyStop).await
    }

    async fn validate_robot(&self, robot_id: i64) -> DomainResult<RobotUnit> {
        let robot = self
            .repository
            .get_robot(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Robot", robot_id))?;
        if robot.is_in_maintenance() {
            return Err(DomainError::Maintenance { robot_id });
        }
        Ok(robot)
    }

    async fn publish(&self, robot_id: i64, command: &RobotCommand) -> DomainResult<DispatchReceipt> {
        if !self.bus.is_connected() {
            return Err(DomainError::Transport("message bus not connected".to_string()));
        }

        let topic = robot_topic(robot_id, command.channel().as_str());
        let message = command.to_message();
        let payload = serde_json::to_vec(&message)?;

        let delivery = self.bus.publish(&topic, payload, QoS::AtLeastOnce);
        let DeliveryReceipt { delivered_at, .. } = match self.ack_timeout {
            Some(limit) => tokio::time::timeout(limit, delivery).await.map_err(|_| {
                DomainError::Transport(format!(
                    "no acknowledgment for {} on {} within {} ms",
                    message.command,
                    topic,
                    limit.as_millis()
                ))
            })??,
            None => delivery.await?,
        };

        tracing::info!("Sent {} to robot {} on {}", message.command, robot_id, topic);
        self.events
            .emit(NavigationEvent::CommandDispatched {
                robot_id,
                topic: topic.clone(),
                command: message.command.clone(),
                timestamp: delivered_at,
            })
            .await;

        Ok(DispatchReceipt {
            robot_id,
            topic,
            message,
            delivered_at,
        })
    }

    async fn mark_busy(&self, robot_id: i64) -> DomainResult<()> {
        // re-read so telemetry written while publishing is not overwritten
        let mut robot = self
            .repository
            .get_robot(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Robot", robot_id))?;
        if robot.operational_state == OperationalState::Busy {
            return Ok(());
        }
        robot.mark_busy();
        self.repository.save_robot(&robot).await?;
        tracing::debug!("Robot {} is now BUSY", robot_id);
        self.events
            .emit(NavigationEvent::RobotStateChanged {
                robot_id,
                state: OperationalState::Busy,
                timestamp: Utc::now(),
            })
            .await;
        Ok(())
    }

    pub async fn move_forward(&self, robot_id: i64, params: MoveParams) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::MoveForward(params)).await
    }

    pub async fn move_backward(&self, robot_id: i64, params: MoveParams) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::MoveBackward(params)).await
    }

    pub async fn turn_left(&self, robot_id: i64, angle: f64, speed: u8) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::TurnLeft { angle, speed }).await
    }

    pub async fn turn_right(&self, robot_id: i64, angle: f64, speed: u8) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::TurnRight { angle, speed }).await
    }

    pub async fn stop(&self, robot_id: i64) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::Stop).await
    }

    pub async fn set_speed(&self, robot_id: i64, speed: f64) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::set_speed(speed)).await
    }

    pub async fn wait(&self, robot_id: i64, duration: Duration) -> DomainResult<DispatchReceipt> {
        let duration_ms = duration.as_millis().min(u64::MAX as u128) as u64;
        self.dispatch(robot_id, RobotCommand::Wait { duration_ms }).await
    }

    pub async fn follow_route(&self, robot_id: i64, route: &Route) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::follow_route(route)).await
    }

    pub async fn navigate_to(&self, robot_id: i64, location: LocationTag) -> DomainResult<DispatchReceipt> {
        self.dispatch(robot_id, RobotCommand::NavigateTo { location }).await
    }

    pub async fn go_to_coordinates(&self, robot_id: i64, lat: f64, lng: f64) -> DomainResult<DispatchReceipt> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(DomainError::validation("Target coordinates must be finite numbers"));
        }
        self.dispatch(robot_id, RobotCommand::GoToCoordinates { lat, lng }).await
    }
}
