#[cfg(feature = "pg_integration")]
use campus_guide::adapters::outbound::PostgresRepository;
#[cfg(feature = "pg_integration")]
use campus_guide::common::DomainError;
#[cfg(feature = "pg_integration")]
use campus_guide::config::PostgresConfig;
#[cfg(feature = "pg_integration")]
use campus_guide::domains::fleet::{OperationalState, PositionFix, RobotUnit};
#[cfg(feature = "pg_integration")]
use campus_guide::domains::guidance::{GuideState, NewGuide};
#[cfg(feature = "pg_integration")]
use campus_guide::domains::mapping::{NewCampusMap, ReferencePoint};
#[cfg(feature = "pg_integration")]
use campus_guide::domains::routing::{LocationTag, NewRoute, Waypoint};
#[cfg(feature = "pg_integration")]
use campus_guide::domains::Repository;
#[cfg(all(feature = "pg_integration", feature = "use_testcontainers"))]
use testcontainers::runners::AsyncRunner;
#[cfg(all(feature = "pg_integration", feature = "use_testcontainers"))]
use testcontainers_modules::postgres::Postgres;

#[cfg(feature = "pg_integration")]
fn pg_config(port: u16) -> PostgresConfig {
    PostgresConfig {
        host: "127.0.0.1".to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_connections: 4,
    }
}

/// Retries until Postgres accepts connections and the schema is in place.
#[cfg(feature = "pg_integration")]
async fn connect(port: u16) -> Result<PostgresRepository, Box<dyn std::error::Error>> {
    let mut last_error = String::new();
    for _ in 0..20 {
        match PostgresRepository::new(pg_config(port)).await {
            Ok(repository) => return Ok(repository),
            Err(e) => {
                last_error = e;
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        }
    }
    Err(format!("Postgres did not become ready: {}", last_error).into())
}

#[cfg(feature = "pg_integration")]
async fn exercise_repository(repo: &PostgresRepository) -> Result<(), Box<dyn std::error::Error>> {
    // robots and telemetry
    repo.save_robot(&RobotUnit::new(1).with_assistant(9).with_battery(80)).await?;
    let robots = repo.robots_for_assistant(9).await?;
    assert_eq!(robots.len(), 1);
    assert_eq!(robots[0].battery_level, 80);

    let first = repo.record_position(1, PositionFix::new(4.6, -74.06, Some(45.0))?).await?;
    let second = repo.record_position(1, PositionFix::new(4.601, -74.06, None)?).await?;
    assert_eq!(first.id, second.id);
    assert_eq!(second.heading_degrees, 45.0);
    assert_eq!(repo.get_robot(1).await?.and_then(|r| r.device_id), Some(first.id));

    // maps
    let points = vec![
        ReferencePoint::new(4.60, -74.07, 0.0, 500.0),
        ReferencePoint::new(4.60, -74.06, 500.0, 500.0),
        ReferencePoint::new(4.61, -74.06, 500.0, 0.0),
    ];
    let map_a = repo
        .insert_map(NewCampusMap {
            name: "North".to_string(),
            image_url: "north.png".to_string(),
            reference_points: points.clone(),
        })
        .await?;
    let map_b = repo
        .insert_map(NewCampusMap {
            name: "South".to_string(),
            image_url: "south.png".to_string(),
            reference_points: points,
        })
        .await?;
    repo.set_primary_map(map_a.id).await?;
    repo.set_primary_map(map_b.id).await?;
    assert_eq!(repo.primary_map().await?.map(|m| m.id), Some(map_b.id));
    assert_eq!(repo.list_maps().await?.len(), 2);

    // routes
    let route = repo
        .insert_route(NewRoute {
            name: "Gate to B".to_string(),
            waypoints: vec![
                Waypoint::new(2, 4.601, -74.065, 10.0, 20.0),
                Waypoint::new(1, 4.600, -74.065, 10.0, 30.0),
            ],
            start_tag: LocationTag::Puerta1,
            end_tag: LocationTag::BloqueB,
            map_id: map_a.id,
        })
        .await?;
    assert_eq!(route.waypoints[0].sequence, 1);
    let found = repo.routes_between(LocationTag::Puerta1, LocationTag::BloqueB).await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].waypoints, route.waypoints);

    // guides: one active per robot, enforced by the database
    let mut guide = repo.insert_guide(NewGuide::for_route(&route, 1)?).await?;
    let duplicate = repo.insert_guide(NewGuide::for_route(&route, 1)?).await;
    assert!(matches!(duplicate, Err(DomainError::InvalidState { .. })));

    let mut robot = repo.get_robot(1).await?.ok_or("robot missing")?;
    guide.advance()?;
    guide.finalize(&mut robot)?;
    repo.save_guide(&guide).await?;
    repo.save_robot(&robot).await?;

    let stored = repo.get_guide(guide.id).await?.ok_or("guide missing")?;
    assert_eq!(stored.state, GuideState::Completed);
    assert_eq!(stored.current_waypoint_index, 1);
    assert!(repo.active_guide_for_robot(1).await?.is_none());
    assert_eq!(
        repo.get_robot(1).await?.map(|r| r.operational_state),
        Some(OperationalState::Free)
    );

    let next = repo.insert_guide(NewGuide::for_route(&route, 1)?).await?;
    let history = repo.guides_for_robot(1).await?;
    assert_eq!(history.first().map(|g| g.id), Some(next.id));
    assert!(repo.delete_guide(guide.id).await?);
    assert!(!repo.delete_guide(guide.id).await?);

    Ok(())
}

#[cfg(all(feature = "pg_integration", feature = "use_testcontainers"))]
#[tokio::test]
async fn test_postgres_repository_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let node = Postgres::default().start().await?;
    let port = node.get_host_port_ipv4(5432).await?;
    let repo = connect(port).await?;
    exercise_repository(&repo).await
}

/// Runs against an externally started Postgres on `PG_TEST_PORT` (default 5433).
#[cfg(all(feature = "pg_integration", not(feature = "use_testcontainers")))]
#[tokio::test]
async fn test_postgres_repository_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::var("PG_TEST_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(5433u16);
    let repo = connect(port).await?;
    exercise_repository(&repo).await
}
