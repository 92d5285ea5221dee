use super::robot_locks::{HaltFlags, RobotLocks};
use crate::common::{DomainError, DomainResult};
use crate::config::{Config, NavigationConfig};
use crate::domains::dispatch::{
    CommandDispatcher, DispatchReceipt, MoveParams, RobotCommand, SequenceStep, StepOutcome,
};
use crate::domains::fleet::{DevicePosition, OperationalState, PositionFix, RobotUnit};
use crate::domains::geodesy::{
    bearing_degrees, decide_turn, distance_meters, signed_heading_difference, TurnDirection,
};
use crate::domains::guidance::{
    Guide, GuideProgress, GuideStats, NavigationEvent, NavigationEventSender, NewGuide,
};
use crate::domains::mapping::{
    center_geo, contains_geo, polygon_area_pixels, CampusMap, CoordinateMapper, GeoConversion,
    NewCampusMap, PixelConversion,
};
use crate::domains::ports::{MessageBus, Repository};
use crate::domains::routing::{DistanceMetric, LocationTag, NewRoute, Route};
use crate::domains::DynLogger;
use chrono::Utc;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a successful guide request.
#[derive(Debug, Clone, Serialize)]
pub struct GuideAssignment {
    pub guide: Guide,
    pub robot: RobotUnit,
    pub route: Route,
}

/// What one navigation trigger did for a robot.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationStep {
    /// The robot has no active guide; only its position was recorded.
    Idle,
    Advanced {
        turn: TurnDirection,
        bearing_degrees: f64,
        distance_m: f64,
        progress: GuideProgress,
    },
    Completed { progress: GuideProgress },
    /// An emergency stop holds the robot; the guide did not move.
    Halted { guide_id: i64 },
}

impl NavigationStep {
    pub fn progress(&self) -> Option<&GuideProgress> {
        match self {
            NavigationStep::Idle | NavigationStep::Halted { .. } => None,
            NavigationStep::Advanced { progress, .. } | NavigationStep::Completed { progress } => {
                Some(progress)
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, NavigationStep::Completed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateQuery {
    Geo { lat: f64, lng: f64 },
    Pixel { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CoordinateConversion {
    Pixel(PixelConversion),
    Geo(GeoConversion),
}

/// Status telemetry, already decoded from the robot's payload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusReport {
    pub state: Option<OperationalState>,
    pub battery_level: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    Finalize,
    Cancel,
}

/// Orchestrates guides, robots and commands. Every operation touching a
/// robot's guide or state runs under that robot's lock.
pub struct NavigationService {
    repository: Arc<dyn Repository>,
    dispatcher: Arc<CommandDispatcher>,
    mapper: CoordinateMapper,
    locks: Arc<RobotLocks>,
    halts: HaltFlags,
    config: NavigationConfig,
    events: NavigationEventSender,
    logger: DynLogger,
}

impl NavigationService {
    pub fn new(
        repository: Arc<dyn Repository>,
        bus: Arc<dyn MessageBus>,
        config: &Config,
        logger: DynLogger,
        events: NavigationEventSender,
    ) -> Self {
        let dispatcher = CommandDispatcher::new(repository.clone(), bus, &config.dispatch)
            .with_events(events.clone());
        Self {
            repository,
            dispatcher: Arc::new(dispatcher),
            mapper: CoordinateMapper::new(config.mapping),
            locks: Arc::new(RobotLocks::new()),
            halts: HaltFlags::new(),
            config: config.navigation.clone(),
            events,
            logger,
        }
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn navigation_config(&self) -> &NavigationConfig {
        &self.config
    }

    async fn load_robot(&self, robot_id: i64) -> DomainResult<RobotUnit> {
        self.repository
            .get_robot(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Robot", robot_id))
    }

    async fn load_route(&self, route_id: i64) -> DomainResult<Route> {
        self.repository
            .get_route(route_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Route", route_id))
    }

    async fn load_guide(&self, guide_id: i64) -> DomainResult<Guide> {
        self.repository
            .get_guide(guide_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Guide", guide_id))
    }

    async fn load_map(&self, map_id: i64) -> DomainResult<CampusMap> {
        self.repository
            .get_map(map_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Map", map_id))
    }

    // ---- guides ----

    /// Binds the first eligible robot of the assistant to the shortest
    /// route between the two locations.
    pub async fn request_guide(
        &self,
        assistant_id: i64,
        start: LocationTag,
        end: LocationTag,
    ) -> DomainResult<GuideAssignment> {
        let mut robots = self.repository.robots_for_assistant(assistant_id).await?;
        if robots.is_empty() {
            return Err(DomainError::not_found("Robot for assistant", assistant_id));
        }
        robots.sort_by_key(|r| r.id);

        let route = self
            .repository
            .routes_between(start, end)
            .await?
            .into_iter()
            .filter(Route::is_valid)
            .min_by_key(|r| OrderedFloat(r.total_length(DistanceMetric::Geodesic)))
            .ok_or_else(|| DomainError::not_found("Route", format!("{} -> {}", start, end)))?;

        let min_battery = self.config.min_battery_level;
        for candidate in robots.iter().filter(|r| r.can_accept_guide(min_battery)) {
            let _guard = self.locks.acquire(candidate.id).await;

            // state may have changed while waiting for the lock
            let mut robot = self.load_robot(candidate.id).await?;
            if !robot.can_accept_guide(min_battery) || self.halts.is_halted(robot.id) {
                continue;
            }
            if self.repository.active_guide_for_robot(robot.id).await?.is_some() {
                continue;
            }

            let guide = self
                .repository
                .insert_guide(NewGuide::for_route(&route, robot.id)?)
                .await?;
            robot.assign_route(route.id);
            self.repository.save_robot(&robot).await?;

            self.logger.info(&format!(
                "Guide {} started: robot {} on route {} ({} -> {})",
                guide.id, robot.id, route.id, start, end
            ));
            self.events
                .emit(NavigationEvent::GuideStarted {
                    guide_id: guide.id,
                    robot_id: robot.id,
                    route_id: route.id,
                    timestamp: guide.started_at,
                })
                .await;
            self.emit_state(robot.id, OperationalState::Busy).await;

            return Ok(GuideAssignment {
                guide,
                robot,
                route,
            });
        }

        self.logger.warn(&format!(
            "No robot of assistant {} can take a guide from {} to {}",
            assistant_id, start, end
        ));
        Err(DomainError::Unavailable {
            reason: format!(
                "no free robot with at least {}% battery for assistant {}",
                min_battery, assistant_id
            ),
        })
    }

    /// Records the reported position, then drives the robot's active guide
    /// one waypoint forward.
    pub async fn advance_on_telemetry(
        &self,
        robot_id: i64,
        lat: f64,
        lng: f64,
        heading_degrees: Option<f64>,
    ) -> DomainResult<NavigationStep> {
        let fix = PositionFix::new(lat, lng, heading_degrees)?;
        let _guard = self.locks.acquire(robot_id).await;

        self.load_robot(robot_id).await?;
        let position = self.record_position_locked(robot_id, fix).await?;
        self.step_locked(robot_id, &position).await
    }

    /// Drives one step from the last known position.
    pub async fn drive_step(&self, robot_id: i64) -> DomainResult<NavigationStep> {
        let _guard = self.locks.acquire(robot_id).await;
        self.load_robot(robot_id).await?;
        let position = self
            .repository
            .get_device_position(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Device position", robot_id))?;
        self.step_locked(robot_id, &position).await
    }

    async fn step_locked(&self, robot_id: i64, position: &DevicePosition) -> DomainResult<NavigationStep> {
        let Some(mut guide) = self.repository.active_guide_for_robot(robot_id).await? else {
            return Ok(NavigationStep::Idle);
        };
        if self.halts.is_halted(robot_id) {
            return Ok(NavigationStep::Halted { guide_id: guide.id });
        }
        let route = self.load_route(guide.route_id).await?;

        let Some(next) = route.waypoint(guide.current_waypoint_index + 1).cloned() else {
            self.release_locked(&mut guide, Release::Finalize).await?;
            return Ok(NavigationStep::Completed {
                progress: GuideProgress::compute(&guide, &route),
            });
        };

        let heading = position.heading_degrees;
        let bearing = bearing_degrees(position.lat, position.lng, next.lat, next.lng);
        let turn = decide_turn(heading, bearing, self.config.turn_threshold_degrees);

        if turn != TurnDirection::Forward {
            let angle = signed_heading_difference(heading, bearing).abs();
            let speed = self.config.turn_speed;
            match turn {
                TurnDirection::Left => self.dispatcher.turn_left(robot_id, angle, speed).await?,
                // about-face is a right turn by the full difference
                _ => self.dispatcher.turn_right(robot_id, angle, speed).await?,
            };
            tokio::time::sleep(self.config.turn_settle()).await;
        }
        // an emergency stop may have arrived while turning
        if self.halts.is_halted(robot_id) {
            tracing::warn!("Robot {} halted mid-step, guide {} not advanced", robot_id, guide.id);
            return Ok(NavigationStep::Halted { guide_id: guide.id });
        }

        let distance = distance_meters(position.lat, position.lng, next.lat, next.lng);
        let duration_ms = if self.config.nominal_speed_mps > 0.0 {
            (distance / self.config.nominal_speed_mps * 1000.0).round() as u64
        } else {
            0
        };
        let params = MoveParams::with_speed(self.config.forward_speed)
            .distance(distance)
            .duration_ms(duration_ms);
        self.dispatcher.move_forward(robot_id, params).await?;

        guide.advance()?;
        self.repository.save_guide(&guide).await?;
        let progress = GuideProgress::compute(&guide, &route);

        tracing::info!(
            "Robot {} heading {} to waypoint {} of guide {} ({:.1} m)",
            robot_id,
            turn.as_str(),
            guide.current_waypoint_index,
            guide.id,
            distance
        );
        self.events
            .emit(NavigationEvent::GuideAdvanced {
                guide_id: guide.id,
                robot_id,
                waypoint_index: guide.current_waypoint_index,
                progress_percent: progress.progress_percent,
                timestamp: Utc::now(),
            })
            .await;

        Ok(NavigationStep::Advanced {
            turn,
            bearing_degrees: bearing,
            distance_m: distance,
            progress,
        })
    }

    /// Cancels the robot's active guide wherever it is.
    pub async fn cancel_guide(&self, robot_id: i64) -> DomainResult<Guide> {
        let _guard = self.locks.acquire(robot_id).await;
        let mut guide = self
            .repository
            .active_guide_for_robot(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Active guide for robot", robot_id))?;
        self.release_locked(&mut guide, Release::Cancel).await?;
        Ok(guide)
    }

    pub async fn cancel_guide_by_id(&self, guide_id: i64) -> DomainResult<Guide> {
        self.release_by_id(guide_id, Release::Cancel).await
    }

    pub async fn finalize_guide(&self, guide_id: i64) -> DomainResult<Guide> {
        self.release_by_id(guide_id, Release::Finalize).await
    }

    async fn release_by_id(&self, guide_id: i64, release: Release) -> DomainResult<Guide> {
        let robot_id = self.load_guide(guide_id).await?.robot_id;
        let _guard = self.locks.acquire(robot_id).await;
        let mut guide = self.load_guide(guide_id).await?;
        self.release_locked(&mut guide, release).await?;
        Ok(guide)
    }

    /// Applies the terminal transition and frees the robot. A guide that is
    /// already terminal is rejected and its robot is not touched.
    async fn release_locked(&self, guide: &mut Guide, release: Release) -> DomainResult<()> {
        let robot_id = guide.robot_id;
        if !guide.is_active() {
            return Err(DomainError::invalid_state(format!(
                "Guide {} of robot {} is already {}",
                guide.id, robot_id, guide.state
            )));
        }
        if self.config.stop_on_release {
            if let Err(e) = self.dispatcher.stop(robot_id).await {
                self.logger
                    .warn(&format!("Stop before releasing robot {} failed: {}", robot_id, e));
            }
        }

        let mut robot = self.load_robot(robot_id).await?;
        let was = robot.operational_state;
        match release {
            Release::Finalize => guide.finalize(&mut robot)?,
            Release::Cancel => guide.cancel(&mut robot)?,
        }
        self.repository.save_robot(&robot).await?;
        if was != robot.operational_state {
            self.emit_state(robot_id, robot.operational_state).await;
        }

        self.repository.save_guide(guide).await?;
        self.halts.clear(robot_id);
        let event = match release {
            Release::Finalize => {
                self.logger.info(&format!("Guide {} completed, robot {} released", guide.id, robot_id));
                NavigationEvent::GuideCompleted {
                    guide_id: guide.id,
                    robot_id,
                    timestamp: Utc::now(),
                }
            }
            Release::Cancel => {
                self.logger.info(&format!(
                    "Guide {} cancelled at waypoint {}, robot {} released",
                    guide.id, guide.current_waypoint_index, robot_id
                ));
                NavigationEvent::GuideCancelled {
                    guide_id: guide.id,
                    robot_id,
                    waypoint_index: guide.current_waypoint_index,
                    timestamp: Utc::now(),
                }
            }
        };
        self.events.emit(event).await;
        Ok(())
    }

    /// Manual correction of the active guide's current waypoint.
    pub async fn go_to_waypoint(&self, robot_id: i64, index: usize) -> DomainResult<Guide> {
        let _guard = self.locks.acquire(robot_id).await;
        let mut guide = self
            .repository
            .active_guide_for_robot(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Active guide for robot", robot_id))?;
        guide.go_to_waypoint(index)?;
        self.repository.save_guide(&guide).await?;
        Ok(guide)
    }

    pub async fn guide_progress(&self, robot_id: i64) -> DomainResult<GuideProgress> {
        let guide = self
            .repository
            .active_guide_for_robot(robot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Active guide for robot", robot_id))?;
        let route = self.load_route(guide.route_id).await?;
        Ok(GuideProgress::compute(&guide, &route))
    }

    pub async fn guide_progress_by_id(&self, guide_id: i64) -> DomainResult<GuideProgress> {
        let guide = self.load_guide(guide_id).await?;
        let route = self.load_route(guide.route_id).await?;
        Ok(GuideProgress::compute(&guide, &route))
    }

    pub async fn guide_history(&self, robot_id: i64) -> DomainResult<Vec<Guide>> {
        self.load_robot(robot_id).await?;
        self.repository.guides_for_robot(robot_id).await
    }

    pub async fn guide_stats(&self) -> DomainResult<GuideStats> {
        let guides = self.repository.list_guides().await?;
        Ok(GuideStats::from_guides(&guides))
    }

    /// Only guides that are no longer active can be removed.
    pub async fn delete_guide(&self, guide_id: i64) -> DomainResult<Guide> {
        let guide = self.load_guide(guide_id).await?;
        if guide.is_active() {
            return Err(DomainError::invalid_state(format!(
                "Guide {} is active, cancel it before deleting",
                guide_id
            )));
        }
        self.repository.delete_guide(guide_id).await?;
        Ok(guide)
    }

    // ---- robots ----

    /// Sends one command while holding the robot's lock.
    pub async fn send_command(&self, robot_id: i64, command: RobotCommand) -> DomainResult<DispatchReceipt> {
        if matches!(command, RobotCommand::EmergencyStop) {
            return self.emergency_stop(robot_id).await;
        }
        let _guard = self.locks.acquire(robot_id).await;
        self.dispatcher.dispatch(robot_id, command).await
    }

    /// Bypasses the robot lock so it can interrupt a running step. The robot
    /// stays halted until it is released or resumed.
    pub async fn emergency_stop(&self, robot_id: i64) -> DomainResult<DispatchReceipt> {
        self.halts.halt(robot_id);
        let receipt = self.dispatcher.emergency_stop(robot_id).await?;
        self.logger.warn(&format!("Emergency stop sent to robot {}", robot_id));
        Ok(receipt)
    }

    /// Lifts an emergency halt so the active guide can be stepped again.
    pub async fn resume_navigation(&self, robot_id: i64) -> DomainResult<bool> {
        let _guard = self.locks.acquire(robot_id).await;
        self.load_robot(robot_id).await?;
        let was_halted = self.halts.clear(robot_id);
        if was_halted {
            self.logger.info(&format!("Robot {} resumed after emergency stop", robot_id));
        }
        Ok(was_halted)
    }

    pub fn is_halted(&self, robot_id: i64) -> bool {
        self.halts.is_halted(robot_id)
    }

    /// Runs the whole sequence under the robot's lock.
    pub async fn run_sequence(&self, robot_id: i64, steps: Vec<SequenceStep>) -> Vec<StepOutcome> {
        let _guard = self.locks.acquire(robot_id).await;
        self.dispatcher.run_sequence(robot_id, steps).await
    }

    /// Frees the robot, cancelling its active guide if it has one.
    pub async fn release_robot(&self, robot_id: i64) -> DomainResult<RobotUnit> {
        let _guard = self.locks.acquire(robot_id).await;
        self.halts.clear(robot_id);
        if let Some(mut guide) = self.repository.active_guide_for_robot(robot_id).await? {
            self.release_locked(&mut guide, Release::Cancel).await?;
            return self.load_robot(robot_id).await;
        }

        let mut robot = self.load_robot(robot_id).await?;
        if robot.is_in_maintenance() {
            return Err(DomainError::Maintenance { robot_id });
        }
        if robot.operational_state != OperationalState::Free {
            robot.release();
            self.repository.save_robot(&robot).await?;
            self.emit_state(robot_id, OperationalState::Free).await;
        }
        Ok(robot)
    }

    pub async fn set_robot_maintenance(&self, robot_id: i64, maintenance: bool) -> DomainResult<RobotUnit> {
        let _guard = self.locks.acquire(robot_id).await;
        let mut robot = self.load_robot(robot_id).await?;

        let target = if maintenance {
            if self.repository.active_guide_for_robot(robot_id).await?.is_some() {
                return Err(DomainError::invalid_state(format!(
                    "Robot {} has an active guide, cancel it first",
                    robot_id
                )));
            }
            OperationalState::Maintenance
        } else {
            OperationalState::Free
        };

        if robot.operational_state != target {
            robot.operational_state = target;
            robot.active_route_id = None;
            self.repository.save_robot(&robot).await?;
            self.logger
                .info(&format!("Robot {} is now {}", robot_id, target));
            self.emit_state(robot_id, target).await;
        }
        Ok(robot)
    }

    // ---- telemetry ----

    async fn record_position_locked(&self, robot_id: i64, fix: PositionFix) -> DomainResult<DevicePosition> {
        let position = self.repository.record_position(robot_id, fix).await?;
        self.events
            .emit(NavigationEvent::PositionUpdated {
                robot_id,
                lat: position.lat,
                lng: position.lng,
                heading_degrees: position.heading_degrees,
                timestamp: position.updated_at,
            })
            .await;
        Ok(position)
    }

    pub async fn record_battery(&self, robot_id: i64, level: f64) -> DomainResult<RobotUnit> {
        let _guard = self.locks.acquire(robot_id).await;
        let mut robot = self.load_robot(robot_id).await?;
        robot.set_battery_level(level)?;
        self.repository.save_robot(&robot).await?;
        tracing::debug!("Robot {} battery at {}%", robot_id, robot.battery_level);
        self.events
            .emit(NavigationEvent::BatteryUpdated {
                robot_id,
                level: robot.battery_level,
                timestamp: Utc::now(),
            })
            .await;
        Ok(robot)
    }

    pub async fn record_status(&self, robot_id: i64, report: StatusReport) -> DomainResult<RobotUnit> {
        let _guard = self.locks.acquire(robot_id).await;
        let mut robot = self.load_robot(robot_id).await?;
        let before = robot.operational_state;

        if let Some(state) = report.state {
            let guide = self.repository.active_guide_for_robot(robot_id).await?;
            match guide {
                // the guide owns the robot's state until it ends
                Some(guide) if state != OperationalState::Busy => {
                    tracing::warn!(
                        "Robot {} reported {} during guide {}, state kept",
                        robot_id,
                        state,
                        guide.id
                    );
                }
                _ => {
                    robot.operational_state = state;
                    if state != OperationalState::Busy {
                        robot.active_route_id = None;
                    }
                }
            }
        }
        if let Some(level) = report.battery_level {
            robot.set_battery_level(level)?;
        }
        self.repository.save_robot(&robot).await?;

        if before != robot.operational_state {
            self.emit_state(robot_id, robot.operational_state).await;
        }
        Ok(robot)
    }

    async fn emit_state(&self, robot_id: i64, state: OperationalState) {
        self.events
            .emit(NavigationEvent::RobotStateChanged {
                robot_id,
                state,
                timestamp: Utc::now(),
            })
            .await;
    }

    // ---- maps and routes ----

    pub async fn convert_coordinates(&self, map_id: i64, query: CoordinateQuery) -> DomainResult<CoordinateConversion> {
        let map = self.load_map(map_id).await?;
        match query {
            CoordinateQuery::Geo { lat, lng } => self
                .mapper
                .geo_to_pixel(&map, lat, lng)
                .map(CoordinateConversion::Pixel),
            CoordinateQuery::Pixel { x, y } => self
                .mapper
                .pixel_to_geo(&map, x, y)
                .map(CoordinateConversion::Geo),
        }
    }

    /// The first map created becomes primary.
    pub async fn create_map(&self, map: NewCampusMap) -> DomainResult<CampusMap> {
        map.validate()?;
        let has_primary = self.repository.primary_map().await?.is_some();
        let mut created = self.repository.insert_map(map).await?;
        if !has_primary {
            self.repository.set_primary_map(created.id).await?;
            created.is_primary = true;
        }
        self.logger.info(&format!(
            "Map {} '{}' created with {} reference points",
            created.id,
            created.name,
            created.reference_points.len()
        ));
        Ok(created)
    }

    pub async fn update_map(&self, map_id: i64, update: NewCampusMap) -> DomainResult<CampusMap> {
        let mut map = self.load_map(map_id).await?;
        map.apply_update(update)?;
        self.repository.update_map(&map).await?;
        Ok(map)
    }

    pub async fn set_primary_map(&self, map_id: i64) -> DomainResult<CampusMap> {
        let mut map = self.load_map(map_id).await?;
        self.repository.set_primary_map(map_id).await?;
        map.is_primary = true;
        Ok(map)
    }

    pub async fn primary_map(&self) -> DomainResult<CampusMap> {
        self.repository
            .primary_map()
            .await?
            .ok_or_else(|| DomainError::not_found("Primary map", "none"))
    }

    pub async fn map_area_pixels(&self, map_id: i64) -> DomainResult<f64> {
        Ok(polygon_area_pixels(&self.load_map(map_id).await?))
    }

    pub async fn map_center(&self, map_id: i64) -> DomainResult<(f64, f64)> {
        let map = self.load_map(map_id).await?;
        center_geo(&map).ok_or_else(|| DomainError::validation(format!("Map {} has no reference points", map_id)))
    }

    /// Whether a GPS fix falls inside the map's boundary polygon.
    pub async fn validate_location(&self, map_id: i64, lat: f64, lng: f64) -> DomainResult<bool> {
        PositionFix::new(lat, lng, None)?;
        Ok(contains_geo(&self.load_map(map_id).await?, lat, lng))
    }

    pub async fn create_route(&self, route: NewRoute) -> DomainResult<Route> {
        route.validate()?;
        self.load_map(route.map_id).await?;
        let created = self.repository.insert_route(route).await?;
        self.logger.info(&format!(
            "Route {} '{}' created: {} -> {}, {} waypoints",
            created.id,
            created.name,
            created.start_tag,
            created.end_tag,
            created.waypoints.len()
        ));
        Ok(created)
    }
}
