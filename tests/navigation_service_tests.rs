use campus_guide::adapters::outbound::{init_noop_logger, InMemoryBus, InMemoryRepository};
use campus_guide::application::*;
use campus_guide::common::DomainError;
use campus_guide::domains::dispatch::{MoveParams, RobotCommand, SequenceStep};
use campus_guide::domains::fleet::{OperationalState, RobotUnit};
use campus_guide::domains::geodesy::TurnDirection;
use campus_guide::domains::guidance::{navigation_event_channel, GuideState, NavigationEventActor, NavigationEventSender};
use campus_guide::domains::mapping::{ConversionMethod, NewCampusMap, ReferencePoint};
use campus_guide::domains::routing::{LocationTag, NewRoute, Route, Waypoint};
use campus_guide::domains::Repository;
use campus_guide::Config;
use std::sync::Arc;
use std::time::Duration;

const ASSISTANT: i64 = 10;
const BASE_LAT: f64 = 4.6000;
const BASE_LNG: f64 = -74.0650;

struct Harness {
    service: Arc<NavigationService>,
    repository: Arc<InMemoryRepository>,
    bus: Arc<InMemoryBus>,
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.navigation.turn_settle_ms = 0;
    config.navigation.continuous_interval_ms = 10;
    config
}

fn harness_with(config: Config, events: NavigationEventSender) -> Harness {
    let repository = Arc::new(InMemoryRepository::new());
    let bus = Arc::new(InMemoryBus::new());
    let service = Arc::new(NavigationService::new(
        repository.clone(),
        bus.clone(),
        &config,
        init_noop_logger(),
        events,
    ));
    Harness {
        service,
        repository,
        bus,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), NavigationEventSender::disabled())
}

/// Waypoints due north of the base point, 0.001° apart.
fn northbound(waypoints: usize) -> Vec<Waypoint> {
    (0..waypoints)
        .map(|i| {
            Waypoint::new(
                i as u32 + 1,
                BASE_LAT + 0.001 * i as f64,
                BASE_LNG,
                200.0,
                600.0 - 100.0 * i as f64,
            )
        })
        .collect()
}

fn waypoint_lat(index: usize) -> f64 {
    BASE_LAT + 0.001 * index as f64
}

fn campus_map() -> NewCampusMap {
    NewCampusMap {
        name: "Campus".to_string(),
        image_url: "maps/campus.png".to_string(),
        reference_points: vec![
            ReferencePoint::new(0.0, 0.0, 0.0, 100.0),
            ReferencePoint::new(0.0, 1.0, 100.0, 100.0),
            ReferencePoint::new(1.0, 1.0, 100.0, 0.0),
            ReferencePoint::new(1.0, 0.0, 0.0, 0.0),
        ],
    }
}

impl Harness {
    async fn add_robot(&self, robot: RobotUnit) {
        self.repository.save_robot(&robot).await.unwrap();
    }

    async fn add_route(&self, waypoints: Vec<Waypoint>) -> Route {
        let map_id = match self.repository.primary_map().await.unwrap() {
            Some(map) => map.id,
            None => self.service.create_map(campus_map()).await.unwrap().id,
        };
        self.service
            .create_route(NewRoute {
                name: format!("Gate to Block B ({} stops)", waypoints.len()),
                waypoints,
                start_tag: LocationTag::Puerta1,
                end_tag: LocationTag::BloqueB,
                map_id,
            })
            .await
            .unwrap()
    }

    async fn robot(&self, robot_id: i64) -> RobotUnit {
        self.repository.get_robot(robot_id).await.unwrap().unwrap()
    }

    /// One robot of the assistant on a three-waypoint northbound guide.
    async fn guided_robot(&self) -> GuideAssignment {
        self.add_robot(RobotUnit::new(1).with_assistant(ASSISTANT)).await;
        self.add_route(northbound(3)).await;
        self.service
            .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_request_guide_binds_robot_to_route() {
    let h = harness();
    let assignment = h.guided_robot().await;

    assert_eq!(assignment.guide.state, GuideState::Active);
    assert_eq!(assignment.guide.current_waypoint_index, 0);
    assert_eq!(assignment.guide.waypoint_count, 3);
    assert_eq!(assignment.robot.operational_state, OperationalState::Busy);

    let stored = h.robot(1).await;
    assert_eq!(stored.operational_state, OperationalState::Busy);
    assert_eq!(stored.active_route_id, Some(assignment.route.id));
    // binding a guide sends nothing to the robot
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn test_telemetry_walks_the_guide_to_completion() {
    let h = harness();
    let assignment = h.guided_robot().await;

    // at the first waypoint, facing north: straight ahead
    let step = h
        .service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
        .await
        .unwrap();
    match &step {
        NavigationStep::Advanced {
            turn,
            distance_m,
            progress,
            ..
        } => {
            assert_eq!(*turn, TurnDirection::Forward);
            assert!(*distance_m > 100.0 && *distance_m < 120.0);
            assert_eq!(progress.current_waypoint_index, 1);
            assert_eq!(progress.progress_percent, 50.0);
        }
        other => panic!("expected an advance, got {:?}", other),
    }
    assert_eq!(h.bus.commands(), vec!["MOVE_FORWARD"]);
    let forward = h.bus.published_on("robots/1/movement")[0].json();
    assert_eq!(forward["params"]["speed"], 50);
    assert!(forward["params"]["duration"].as_u64().unwrap() > 0);

    // at the second waypoint, facing east: turn right then go
    let step = h
        .service
        .advance_on_telemetry(1, waypoint_lat(1), BASE_LNG, Some(90.0))
        .await
        .unwrap();
    assert!(matches!(step, NavigationStep::Advanced { turn: TurnDirection::Right, .. }));
    assert_eq!(step.progress().unwrap().progress_percent, 100.0);
    assert_eq!(h.bus.commands(), vec!["MOVE_FORWARD", "TURN_RIGHT", "MOVE_FORWARD"]);
    let turn = h.bus.published_on("robots/1/movement")[1].json();
    assert!((turn["params"]["angle"].as_f64().unwrap() - 90.0).abs() < 1e-6);

    // the last waypoint is reached; the next trigger completes the guide
    let guide = h.repository.get_guide(assignment.guide.id).await.unwrap().unwrap();
    assert!(guide.is_active());

    let step = h
        .service
        .advance_on_telemetry(1, waypoint_lat(2), BASE_LNG, None)
        .await
        .unwrap();
    assert!(step.is_completed());

    let guide = h.repository.get_guide(assignment.guide.id).await.unwrap().unwrap();
    assert_eq!(guide.state, GuideState::Completed);
    assert!(guide.completed_at.is_some());
    let robot = h.robot(1).await;
    assert_eq!(robot.operational_state, OperationalState::Free);
    assert_eq!(robot.active_route_id, None);
    assert_eq!(h.bus.commands().last().map(String::as_str), Some("STOP"));

    // without a guide, telemetry only moves the device
    let step = h
        .service
        .advance_on_telemetry(1, waypoint_lat(2), BASE_LNG, None)
        .await
        .unwrap();
    assert!(matches!(step, NavigationStep::Idle));
    let device = h.repository.get_device_position(1).await.unwrap().unwrap();
    assert_eq!(device.heading_degrees, 90.0);
}

#[tokio::test]
async fn test_opposite_heading_turns_around() {
    let h = harness();
    h.guided_robot().await;

    let step = h
        .service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(180.0))
        .await
        .unwrap();
    assert!(matches!(step, NavigationStep::Advanced { turn: TurnDirection::Backward, .. }));
    assert_eq!(h.bus.commands(), vec!["TURN_RIGHT", "MOVE_FORWARD"]);
    let turn = h.bus.published()[0].json();
    assert!((turn["params"]["angle"].as_f64().unwrap() - 180.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_invalid_telemetry_changes_nothing() {
    let h = harness();
    h.guided_robot().await;

    let err = h
        .service
        .advance_on_telemetry(1, 91.0, BASE_LNG, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));
    assert!(h.repository.get_device_position(1).await.unwrap().is_none());
    assert!(h.bus.published().is_empty());

    let err = h
        .service
        .advance_on_telemetry(42, BASE_LAT, BASE_LNG, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_failed_forward_does_not_advance() {
    let h = harness();
    let assignment = h.guided_robot().await;
    h.bus.set_connected(false);

    let err = h
        .service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Transport(_)));

    let guide = h.repository.get_guide(assignment.guide.id).await.unwrap().unwrap();
    assert_eq!(guide.current_waypoint_index, 0);
    // the position itself was still recorded
    assert!(h.repository.get_device_position(1).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cancel_mid_route() {
    let h = harness();
    let assignment = h.guided_robot().await;
    h.service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
        .await
        .unwrap();

    let cancelled = h.service.cancel_guide(1).await.unwrap();
    assert_eq!(cancelled.id, assignment.guide.id);
    assert_eq!(cancelled.state, GuideState::Cancelled);
    assert_eq!(cancelled.current_waypoint_index, 1);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Free);
    assert_eq!(h.bus.commands(), vec!["MOVE_FORWARD", "STOP"]);

    assert!(matches!(
        h.service.cancel_guide(1).await.unwrap_err(),
        DomainError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_second_finalize_is_rejected_and_robot_stays_free() {
    let h = harness();
    let assignment = h.guided_robot().await;

    h.service.finalize_guide(assignment.guide.id).await.unwrap();
    let err = h.service.finalize_guide(assignment.guide.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Free);

    let err = h.service.cancel_guide_by_id(assignment.guide.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));
}

#[tokio::test]
async fn test_stale_guide_release_leaves_new_guide_alone() {
    let h = harness();
    let first = h.guided_robot().await;
    h.service.cancel_guide(1).await.unwrap();

    let second = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap();
    assert_ne!(first.guide.id, second.guide.id);

    assert!(h.service.finalize_guide(first.guide.id).await.is_err());
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Busy);
    let active = h.repository.active_guide_for_robot(1).await.unwrap().unwrap();
    assert_eq!(active.id, second.guide.id);
}

#[tokio::test]
async fn test_request_guide_eligibility() {
    let h = harness();
    h.add_route(northbound(3)).await;

    let err = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));

    h.add_robot(RobotUnit::new(1).with_assistant(ASSISTANT).with_battery(10)).await;
    let mut resting = RobotUnit::new(2).with_assistant(ASSISTANT);
    resting.operational_state = OperationalState::Maintenance;
    h.add_robot(resting).await;

    let err = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { .. }));
    assert!(err.is_retryable());

    h.add_robot(RobotUnit::new(3).with_assistant(ASSISTANT).with_battery(20)).await;
    let assignment = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap();
    assert_eq!(assignment.robot.id, 3);

    // robot 3 is busy now
    let err = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { .. }));
}

#[tokio::test]
async fn test_request_guide_needs_a_route() {
    let h = harness();
    h.add_robot(RobotUnit::new(1).with_assistant(ASSISTANT)).await;
    h.add_route(northbound(2)).await;

    let err = h
        .service
        .request_guide(ASSISTANT, LocationTag::Salida, LocationTag::BloqueC)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Free);
}

#[tokio::test]
async fn test_shortest_route_is_chosen() {
    let h = harness();
    h.add_robot(RobotUnit::new(1).with_assistant(ASSISTANT)).await;
    let long = h.add_route(northbound(5)).await;
    let short = h.add_route(northbound(2)).await;
    assert!(long.id < short.id);

    let assignment = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap();
    assert_eq!(assignment.route.id, short.id);
}

#[tokio::test]
async fn test_only_one_active_guide_per_robot() {
    let h = harness();
    let assignment = h.guided_robot().await;

    // even if the robot is forced back to FREE, a second guide is refused
    let mut robot = h.robot(1).await;
    robot.release();
    h.repository.save_robot(&robot).await.unwrap();

    let err = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unavailable { .. }));

    let err = h
        .repository
        .insert_guide(campus_guide::domains::guidance::NewGuide::for_route(&assignment.route, 1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_telemetry_is_serialized_per_robot() {
    let h = harness();
    let assignment = h.guided_robot().await;

    let first = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
                .await
        })
    };
    let second = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let guide = h.repository.get_guide(assignment.guide.id).await.unwrap().unwrap();
    assert_eq!(guide.current_waypoint_index, 2);
    assert_eq!(h.bus.commands(), vec!["MOVE_FORWARD", "MOVE_FORWARD"]);
}

#[tokio::test]
async fn test_continuous_navigation_runs_to_completion() {
    let h = harness();
    let assignment = h.guided_robot().await;
    // seed a position without stepping
    h.repository
        .record_position(
            1,
            campus_guide::domains::fleet::PositionFix::new(waypoint_lat(0), BASE_LNG, Some(0.0)).unwrap(),
        )
        .await
        .unwrap();

    let navigation = h.service.start_continuous(1);
    assert_eq!(navigation.robot_id(), 1);
    let exit = tokio::time::timeout(Duration::from_secs(5), navigation.wait())
        .await
        .expect("loop should finish");
    assert_eq!(exit, LoopExit::Completed);

    let guide = h.repository.get_guide(assignment.guide.id).await.unwrap().unwrap();
    assert_eq!(guide.state, GuideState::Completed);
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Free);
}

#[tokio::test]
async fn test_continuous_navigation_stops_on_request() {
    let mut config = test_config();
    config.navigation.continuous_interval_ms = 60_000;
    let h = harness_with(config, NavigationEventSender::disabled());
    h.guided_robot().await;
    h.repository
        .record_position(
            1,
            campus_guide::domains::fleet::PositionFix::new(waypoint_lat(0), BASE_LNG, Some(0.0)).unwrap(),
        )
        .await
        .unwrap();

    let navigation = h.service.start_continuous(1);
    // let the immediate first tick run
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(navigation.stop().await, LoopExit::Stopped);
    assert_eq!(h.bus.commands(), vec!["MOVE_FORWARD"]);
}

#[tokio::test]
async fn test_continuous_navigation_without_guide_ends() {
    let h = harness();
    h.add_robot(RobotUnit::new(5)).await;
    h.service
        .advance_on_telemetry(5, BASE_LAT, BASE_LNG, None)
        .await
        .unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(5), h.service.start_continuous(5).wait())
        .await
        .unwrap();
    assert_eq!(exit, LoopExit::NoActiveGuide);
}

#[tokio::test]
async fn test_drive_step_needs_a_known_position() {
    let h = harness();
    h.guided_robot().await;
    let err = h.service.drive_step(1).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_progress_history_stats_and_delete() {
    let h = harness();
    let first = h.guided_robot().await;
    h.service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
        .await
        .unwrap();

    let progress = h.service.guide_progress(1).await.unwrap();
    assert_eq!(progress.guide_id, first.guide.id);
    assert_eq!(progress.progress_percent, 50.0);
    assert_eq!(progress.estimated_minutes, 2);

    let err = h.service.delete_guide(first.guide.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));

    h.service.finalize_guide(first.guide.id).await.unwrap();
    let second = h
        .service
        .request_guide(ASSISTANT, LocationTag::Puerta1, LocationTag::BloqueB)
        .await
        .unwrap();
    h.service.cancel_guide(1).await.unwrap();

    let history = h.service.guide_history(1).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.guide.id);

    let stats = h.service.guide_stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.success_rate_percent, 50.0);

    let by_id = h.service.guide_progress_by_id(first.guide.id).await.unwrap();
    assert!(by_id.complete);

    let deleted = h.service.delete_guide(second.guide.id).await.unwrap();
    assert_eq!(deleted.state, GuideState::Cancelled);
    assert_eq!(h.service.guide_history(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_manual_waypoint_correction() {
    let h = harness();
    h.guided_robot().await;

    let guide = h.service.go_to_waypoint(1, 2).await.unwrap();
    assert_eq!(guide.current_waypoint_index, 2);
    assert!(h.service.go_to_waypoint(1, 3).await.is_err());
    assert_eq!(h.service.guide_progress(1).await.unwrap().progress_percent, 100.0);
}

#[tokio::test]
async fn test_maintenance_blocks_commands_but_not_emergency_stop() {
    let h = harness();
    h.guided_robot().await;

    let err = h.service.set_robot_maintenance(1, true).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));

    let released = h.service.release_robot(1).await.unwrap();
    assert_eq!(released.operational_state, OperationalState::Free);
    assert!(h.repository.active_guide_for_robot(1).await.unwrap().is_none());
    h.bus.clear();

    let robot = h.service.set_robot_maintenance(1, true).await.unwrap();
    assert_eq!(robot.operational_state, OperationalState::Maintenance);

    let err = h
        .service
        .send_command(1, RobotCommand::MoveForward(MoveParams::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Maintenance { robot_id: 1 }));
    assert!(matches!(
        h.service.release_robot(1).await.unwrap_err(),
        DomainError::Maintenance { .. }
    ));

    h.service.send_command(1, RobotCommand::EmergencyStop).await.unwrap();
    assert_eq!(h.bus.commands(), vec!["EMERGENCY_STOP"]);
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Maintenance);

    let robot = h.service.set_robot_maintenance(1, false).await.unwrap();
    assert_eq!(robot.operational_state, OperationalState::Free);
}

#[tokio::test]
async fn test_sequence_through_service() {
    let h = harness();
    h.add_robot(RobotUnit::new(1)).await;

    let outcomes = h
        .service
        .run_sequence(
            1,
            vec![
                SequenceStep::new(RobotCommand::set_speed(80.0)),
                SequenceStep::new(RobotCommand::MoveForward(MoveParams::default())),
                SequenceStep::new(RobotCommand::Stop),
            ],
        )
        .await;
    assert!(outcomes.iter().all(|o| o.success));
    assert_eq!(h.bus.commands(), vec!["SET_SPEED", "MOVE_FORWARD", "STOP"]);
}

#[tokio::test]
async fn test_status_and_battery_telemetry() {
    let h = harness();
    h.add_robot(RobotUnit::new(1)).await;

    let robot = h.service.record_battery(1, 42.4).await.unwrap();
    assert_eq!(robot.battery_level, 42);
    assert!(h.service.record_battery(1, f64::NAN).await.is_err());

    let robot = h
        .service
        .record_status(
            1,
            StatusReport {
                state: Some(OperationalState::Maintenance),
                battery_level: Some(150.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(robot.operational_state, OperationalState::Maintenance);
    assert_eq!(robot.battery_level, 100);
}

#[tokio::test]
async fn test_maps_and_conversion() {
    let h = harness();
    let first = h.service.create_map(campus_map()).await.unwrap();
    assert!(first.is_primary);
    let second = h.service.create_map(campus_map()).await.unwrap();
    assert!(!second.is_primary);

    let converted = h
        .service
        .convert_coordinates(first.id, CoordinateQuery::Geo { lat: 0.5, lng: 0.5 })
        .await
        .unwrap();
    match converted {
        CoordinateConversion::Pixel(p) => {
            assert!((p.x - 50.0).abs() < 0.01);
            assert!((p.y - 50.0).abs() < 0.01);
        }
        other => panic!("expected pixels, got {:?}", other),
    }

    let converted = h
        .service
        .convert_coordinates(first.id, CoordinateQuery::Pixel { x: 0.0, y: 0.0 })
        .await
        .unwrap();
    match converted {
        CoordinateConversion::Geo(g) => {
            assert_eq!((g.lat, g.lng), (1.0, 0.0));
            assert_eq!(g.method, ConversionMethod::Interpolated { samples: 1 });
        }
        other => panic!("expected geo, got {:?}", other),
    }

    assert!(h
        .service
        .convert_coordinates(999, CoordinateQuery::Geo { lat: 0.5, lng: 0.5 })
        .await
        .is_err());

    h.service.set_primary_map(second.id).await.unwrap();
    assert_eq!(h.service.primary_map().await.unwrap().id, second.id);
    assert!(!h.repository.get_map(first.id).await.unwrap().unwrap().is_primary);

    assert_eq!(h.service.map_area_pixels(first.id).await.unwrap(), 10_000.0);
    assert_eq!(h.service.map_center(first.id).await.unwrap(), (0.5, 0.5));
    assert!(h.service.validate_location(first.id, 0.5, 0.5).await.unwrap());
    assert!(!h.service.validate_location(first.id, 2.0, 0.5).await.unwrap());
    assert!(h.service.validate_location(first.id, 200.0, 0.5).await.is_err());

    let mut update = campus_map();
    update.name = "Renamed".to_string();
    let updated = h.service.update_map(first.id, update).await.unwrap();
    assert_eq!(updated.name, "Renamed");
}

#[tokio::test]
async fn test_route_creation_validates() {
    let h = harness();
    let map = h.service.create_map(campus_map()).await.unwrap();

    let err = h
        .service
        .create_route(NewRoute {
            name: "Too short".to_string(),
            waypoints: northbound(1),
            start_tag: LocationTag::Puerta1,
            end_tag: LocationTag::Salida,
            map_id: map.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));

    let err = h
        .service
        .create_route(NewRoute {
            name: "No map".to_string(),
            waypoints: northbound(2),
            start_tag: LocationTag::Puerta1,
            end_tag: LocationTag::Salida,
            map_id: 999,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn test_events_reach_projection_and_bus() {
    let (events, rx) = navigation_event_channel(256);
    let h = harness_with(test_config(), events);
    let actor = NavigationEventActor::new(rx).with_bus(h.bus.clone());
    let projections = actor.projections();
    let actor_task = tokio::spawn(actor.run());

    h.guided_robot().await;
    h.service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
        .await
        .unwrap();
    h.service.record_battery(1, 77.0).await.unwrap();

    let bus = h.bus.clone();
    drop(h);
    tokio::time::timeout(Duration::from_secs(5), actor_task)
        .await
        .unwrap()
        .unwrap();

    let store = projections.read().await;
    let overview = store.robots.get(&1).unwrap();
    assert_eq!(overview.state, Some(OperationalState::Busy));
    assert_eq!(overview.waypoint_index, 1);
    assert_eq!(overview.progress_percent, 50.0);
    assert_eq!(overview.battery_level, Some(77));
    assert_eq!(overview.last_command.as_deref(), Some("MOVE_FORWARD"));
    assert_eq!(store.active_guides(), 1);

    let forwarded = bus.published_on("robots/1/events");
    assert!(forwarded
        .iter()
        .any(|m| m.json()["event_type"] == "GuideStarted"));
}

#[tokio::test]
async fn test_refinalizing_archived_guide_keeps_maintenance() {
    let h = harness();
    let assignment = h.guided_robot().await;
    h.service.finalize_guide(assignment.guide.id).await.unwrap();
    h.service.set_robot_maintenance(1, true).await.unwrap();

    let err = h.service.finalize_guide(assignment.guide.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));
    let err = h.service.cancel_guide_by_id(assignment.guide.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState { .. }));

    assert_eq!(h.robot(1).await.operational_state, OperationalState::Maintenance);
}

#[tokio::test]
async fn test_emergency_stop_interrupts_a_turning_step() {
    let mut config = test_config();
    config.navigation.turn_settle_ms = 300;
    let h = harness_with(config, NavigationEventSender::disabled());
    let assignment = h.guided_robot().await;

    // facing east, the next waypoint is north
    let service = h.service.clone();
    let step = tokio::spawn(async move {
        service
            .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(90.0))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.service.emergency_stop(1).await.unwrap();

    let outcome = step.await.unwrap().unwrap();
    assert!(matches!(outcome, NavigationStep::Halted { guide_id } if guide_id == assignment.guide.id));
    assert_eq!(h.bus.commands(), vec!["TURN_RIGHT", "EMERGENCY_STOP"]);
    let guide = h.repository.get_guide(assignment.guide.id).await.unwrap().unwrap();
    assert_eq!(guide.current_waypoint_index, 0);
    assert!(guide.is_active());

    // later fixes do not drive the robot either
    let outcome = h
        .service
        .advance_on_telemetry(1, waypoint_lat(0), BASE_LNG, Some(0.0))
        .await
        .unwrap();
    assert!(matches!(outcome, NavigationStep::Halted { .. }));
    assert_eq!(h.bus.commands().len(), 2);

    assert!(h.service.resume_navigation(1).await.unwrap());
    assert!(!h.service.is_halted(1));
    let outcome = h.service.drive_step(1).await.unwrap();
    assert!(matches!(outcome, NavigationStep::Advanced { .. }));
    assert_eq!(h.bus.commands().last().map(String::as_str), Some("MOVE_FORWARD"));
}

#[tokio::test]
async fn test_release_lifts_an_emergency_halt() {
    let h = harness();
    h.guided_robot().await;
    h.service.emergency_stop(1).await.unwrap();
    assert!(h.service.is_halted(1));

    h.service.release_robot(1).await.unwrap();
    assert!(!h.service.is_halted(1));
    assert_eq!(h.robot(1).await.operational_state, OperationalState::Free);
}

#[tokio::test]
async fn test_status_report_cannot_free_a_guided_robot() {
    let h = harness();
    let assignment = h.guided_robot().await;

    for state in [OperationalState::Free, OperationalState::Maintenance] {
        let robot = h
            .service
            .record_status(
                1,
                StatusReport {
                    state: Some(state),
                    battery_level: Some(55.0),
                },
            )
            .await
            .unwrap();
        assert_eq!(robot.operational_state, OperationalState::Busy);
        assert_eq!(robot.active_route_id, Some(assignment.route.id));
        assert_eq!(robot.battery_level, 55);
    }

    h.service.cancel_guide(1).await.unwrap();
    let robot = h
        .service
        .record_status(
            1,
            StatusReport {
                state: Some(OperationalState::Maintenance),
                battery_level: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(robot.operational_state, OperationalState::Maintenance);
}
