use crate::common::{DomainError, DomainResult};
use crate::config::PostgresConfig;
use crate::domains::fleet::{DevicePosition, PositionFix, RobotUnit};
use crate::domains::guidance::{Guide, GuideState, NewGuide};
use crate::domains::mapping::{CampusMap, NewCampusMap, ReferencePoint};
use crate::domains::ports::Repository;
use crate::domains::routing::{LocationTag, NewRoute, Route, Waypoint};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::Json;
use tokio_postgres::{NoTls, Row};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS robots (
        id BIGINT PRIMARY KEY,
        operational_state VARCHAR(16) NOT NULL,
        battery_level SMALLINT NOT NULL,
        active_route_id BIGINT,
        device_id BIGINT,
        assistant_id BIGINT
    );

    CREATE INDEX IF NOT EXISTS idx_robots_assistant ON robots(assistant_id);

    CREATE TABLE IF NOT EXISTS devices (
        id BIGSERIAL PRIMARY KEY,
        robot_id BIGINT NOT NULL UNIQUE,
        lat DOUBLE PRECISION NOT NULL,
        lng DOUBLE PRECISION NOT NULL,
        heading_degrees DOUBLE PRECISION NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE TABLE IF NOT EXISTS maps (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        image_url TEXT NOT NULL,
        reference_points JSONB NOT NULL,
        is_primary BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_maps_single_primary
    ON maps(is_primary) WHERE is_primary;

    CREATE TABLE IF NOT EXISTS routes (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        waypoints JSONB NOT NULL,
        start_tag VARCHAR(32) NOT NULL,
        end_tag VARCHAR(32) NOT NULL,
        map_id BIGINT NOT NULL REFERENCES maps(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_routes_tags ON routes(start_tag, end_tag);

    CREATE TABLE IF NOT EXISTS guides (
        id BIGSERIAL PRIMARY KEY,
        route_id BIGINT NOT NULL REFERENCES routes(id),
        robot_id BIGINT NOT NULL,
        current_waypoint_index INTEGER NOT NULL DEFAULT 0,
        state VARCHAR(16) NOT NULL,
        waypoint_count INTEGER NOT NULL,
        started_at TIMESTAMPTZ NOT NULL,
        last_advanced_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ,
        cancelled_at TIMESTAMPTZ
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_guides_one_active_per_robot
    ON guides(robot_id) WHERE state = 'ACTIVE';

    CREATE INDEX IF NOT EXISTS idx_guides_robot_started
    ON guides(robot_id, started_at DESC);
"#;

const GUIDE_COLUMNS: &str = "id, route_id, robot_id, current_waypoint_index, state, waypoint_count, \
     started_at, last_advanced_at, completed_at, cancelled_at";
const MAP_COLUMNS: &str = "id, name, image_url, reference_points, is_primary, created_at, updated_at";
const ROUTE_COLUMNS: &str = "id, name, waypoints, start_tag, end_tag, map_id, created_at";
const ROBOT_COLUMNS: &str =
    "id, operational_state, battery_level, active_route_id, device_id, assistant_id";

fn db_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repository(e.to_string())
}

pub struct PostgresRepository {
    pool: Pool,
}

impl PostgresRepository {
    pub async fn new(config: PostgresConfig) -> Result<Self, String> {
        let mut pg_config = Config::new();
        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);
        pg_config.pool = Some(PoolConfig::new(config.max_connections as usize));

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| format!("Failed to create PostgreSQL pool: {}", e))?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: Pool) -> Result<Self, String> {
        let repository = Self { pool };
        repository.initialize_schema().await?;
        Ok(repository)
    }

    async fn initialize_schema(&self) -> Result<(), String> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| format!("Failed to get database connection: {}", e))?;
        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| format!("Failed to initialize database schema: {}", e))?;
        Ok(())
    }

    async fn client(&self) -> DomainResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(db_err)
    }
}

fn robot_from_row(row: &Row) -> DomainResult<RobotUnit> {
    let state: String = row.try_get("operational_state").map_err(db_err)?;
    let battery: i16 = row.try_get("battery_level").map_err(db_err)?;
    Ok(RobotUnit {
        id: row.try_get("id").map_err(db_err)?,
        operational_state: state.parse()?,
        battery_level: battery.clamp(0, 100) as u8,
        active_route_id: row.try_get("active_route_id").map_err(db_err)?,
        device_id: row.try_get("device_id").map_err(db_err)?,
        assistant_id: row.try_get("assistant_id").map_err(db_err)?,
    })
}

fn position_from_row(row: &Row) -> DomainResult<DevicePosition> {
    Ok(DevicePosition {
        id: row.try_get("id").map_err(db_err)?,
        robot_id: row.try_get("robot_id").map_err(db_err)?,
        lat: row.try_get("lat").map_err(db_err)?,
        lng: row.try_get("lng").map_err(db_err)?,
        heading_degrees: row.try_get("heading_degrees").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn map_from_row(row: &Row) -> DomainResult<CampusMap> {
    let Json(reference_points): Json<Vec<ReferencePoint>> =
        row.try_get("reference_points").map_err(db_err)?;
    Ok(CampusMap {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        image_url: row.try_get("image_url").map_err(db_err)?,
        reference_points,
        is_primary: row.try_get("is_primary").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn route_from_row(row: &Row) -> DomainResult<Route> {
    let Json(waypoints): Json<Vec<Waypoint>> = row.try_get("waypoints").map_err(db_err)?;
    let start: String = row.try_get("start_tag").map_err(db_err)?;
    let end: String = row.try_get("end_tag").map_err(db_err)?;
    Ok(Route {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        waypoints,
        start_tag: start.parse()?,
        end_tag: end.parse()?,
        map_id: row.try_get("map_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn guide_from_row(row: &Row) -> DomainResult<Guide> {
    let state: String = row.try_get("state").map_err(db_err)?;
    let index: i32 = row.try_get("current_waypoint_index").map_err(db_err)?;
    let count: i32 = row.try_get("waypoint_count").map_err(db_err)?;
    Ok(Guide {
        id: row.try_get("id").map_err(db_err)?,
        route_id: row.try_get("route_id").map_err(db_err)?,
        robot_id: row.try_get("robot_id").map_err(db_err)?,
        current_waypoint_index: index.max(0) as usize,
        state: state.parse::<GuideState>()?,
        waypoint_count: count.max(0) as usize,
        started_at: row.try_get("started_at").map_err(db_err)?,
        last_advanced_at: row.try_get("last_advanced_at").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
        cancelled_at: row.try_get("cancelled_at").map_err(db_err)?,
    })
}

fn to_i32(value: usize) -> DomainResult<i32> {
    i32::try_from(value).map_err(|_| DomainError::validation(format!("{} does not fit the schema", value)))
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_robot(&self, robot_id: i64) -> DomainResult<Option<RobotUnit>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM robots WHERE id = $1", ROBOT_COLUMNS);
        client
            .query_opt(sql.as_str(), &[&robot_id])
            .await
            .map_err(db_err)?
            .as_ref()
            .map(robot_from_row)
            .transpose()
    }

    async fn save_robot(&self, robot: &RobotUnit) -> DomainResult<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO robots (id, operational_state, battery_level, active_route_id, device_id, assistant_id)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (id) DO UPDATE SET
                 operational_state = EXCLUDED.operational_state,
                 battery_level = EXCLUDED.battery_level,
                 active_route_id = EXCLUDED.active_route_id,
                 device_id = EXCLUDED.device_id,
                 assistant_id = EXCLUDED.assistant_id",
                &[
                    &robot.id,
                    &robot.operational_state.as_str(),
                    &(robot.battery_level as i16),
                    &robot.active_route_id,
                    &robot.device_id,
                    &robot.assistant_id,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn robots_for_assistant(&self, assistant_id: i64) -> DomainResult<Vec<RobotUnit>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM robots WHERE assistant_id = $1 ORDER BY id",
            ROBOT_COLUMNS
        );
        client
            .query(sql.as_str(), &[&assistant_id])
            .await
            .map_err(db_err)?
            .iter()
            .map(robot_from_row)
            .collect()
    }

    async fn get_device_position(&self, robot_id: i64) -> DomainResult<Option<DevicePosition>> {
        let client = self.client().await?;
        client
            .query_opt(
                "SELECT id, robot_id, lat, lng, heading_degrees, updated_at FROM devices WHERE robot_id = $1",
                &[&robot_id],
            )
            .await
            .map_err(db_err)?
            .as_ref()
            .map(position_from_row)
            .transpose()
    }

    async fn record_position(&self, robot_id: i64, fix: PositionFix) -> DomainResult<DevicePosition> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(db_err)?;
        let row = tx
            .query_one(
                "INSERT INTO devices (robot_id, lat, lng, heading_degrees, updated_at)
                 VALUES ($1, $2, $3, COALESCE($4::DOUBLE PRECISION, 0.0), NOW())
                 ON CONFLICT (robot_id) DO UPDATE SET
                 lat = EXCLUDED.lat,
                 lng = EXCLUDED.lng,
                 heading_degrees = COALESCE($4::DOUBLE PRECISION, devices.heading_degrees),
                 updated_at = EXCLUDED.updated_at
                 RETURNING id, robot_id, lat, lng, heading_degrees, updated_at",
                &[&robot_id, &fix.lat, &fix.lng, &fix.heading_degrees],
            )
            .await
            .map_err(db_err)?;
        let position = position_from_row(&row)?;
        tx.execute(
            "UPDATE robots SET device_id = $2 WHERE id = $1 AND device_id IS DISTINCT FROM $2",
            &[&robot_id, &position.id],
        )
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(position)
    }

    async fn get_map(&self, map_id: i64) -> DomainResult<Option<CampusMap>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM maps WHERE id = $1", MAP_COLUMNS);
        client
            .query_opt(sql.as_str(), &[&map_id])
            .await
            .map_err(db_err)?
            .as_ref()
            .map(map_from_row)
            .transpose()
    }

    async fn list_maps(&self) -> DomainResult<Vec<CampusMap>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM maps ORDER BY id", MAP_COLUMNS);
        client
            .query(sql.as_str(), &[])
            .await
            .map_err(db_err)?
            .iter()
            .map(map_from_row)
            .collect()
    }

    async fn insert_map(&self, map: NewCampusMap) -> DomainResult<CampusMap> {
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO maps (name, image_url, reference_points, is_primary)
             VALUES ($1, $2, $3, FALSE) RETURNING {}",
            MAP_COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[&map.name, &map.image_url, &Json(&map.reference_points)],
            )
            .await
            .map_err(db_err)?;
        map_from_row(&row)
    }

    async fn update_map(&self, map: &CampusMap) -> DomainResult<()> {
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE maps SET name = $2, image_url = $3, reference_points = $4, updated_at = $5
                 WHERE id = $1",
                &[
                    &map.id,
                    &map.name,
                    &map.image_url,
                    &Json(&map.reference_points),
                    &map.updated_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(DomainError::not_found("Map", map.id));
        }
        Ok(())
    }

    async fn set_primary_map(&self, map_id: i64) -> DomainResult<()> {
        let mut client = self.client().await?;
        let tx = client.transaction().await.map_err(db_err)?;
        tx.execute(
            "UPDATE maps SET is_primary = FALSE WHERE is_primary AND id <> $1",
            &[&map_id],
        )
        .await
        .map_err(db_err)?;
        let updated = tx
            .execute(
                "UPDATE maps SET is_primary = TRUE, updated_at = $2 WHERE id = $1",
                &[&map_id, &Utc::now()],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            // dropping the transaction rolls the first update back
            return Err(DomainError::not_found("Map", map_id));
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn primary_map(&self) -> DomainResult<Option<CampusMap>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM maps WHERE is_primary LIMIT 1", MAP_COLUMNS);
        client
            .query_opt(sql.as_str(), &[])
            .await
            .map_err(db_err)?
            .as_ref()
            .map(map_from_row)
            .transpose()
    }

    async fn get_route(&self, route_id: i64) -> DomainResult<Option<Route>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM routes WHERE id = $1", ROUTE_COLUMNS);
        client
            .query_opt(sql.as_str(), &[&route_id])
            .await
            .map_err(db_err)?
            .as_ref()
            .map(route_from_row)
            .transpose()
    }

    async fn routes_between(&self, start: LocationTag, end: LocationTag) -> DomainResult<Vec<Route>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM routes WHERE start_tag = $1 AND end_tag = $2 ORDER BY id",
            ROUTE_COLUMNS
        );
        client
            .query(sql.as_str(), &[&start.as_str(), &end.as_str()])
            .await
            .map_err(db_err)?
            .iter()
            .map(route_from_row)
            .collect()
    }

    async fn insert_route(&self, route: NewRoute) -> DomainResult<Route> {
        // ordering by sequence happens in into_route
        let ordered = route.into_route(0);
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO routes (name, waypoints, start_tag, end_tag, map_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ROUTE_COLUMNS
        );
        let row = client
            .query_one(
                sql.as_str(),
                &[
                    &ordered.name,
                    &Json(&ordered.waypoints),
                    &ordered.start_tag.as_str(),
                    &ordered.end_tag.as_str(),
                    &ordered.map_id,
                    &ordered.created_at,
                ],
            )
            .await
            .map_err(db_err)?;
        route_from_row(&row)
    }

    async fn get_guide(&self, guide_id: i64) -> DomainResult<Option<Guide>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM guides WHERE id = $1", GUIDE_COLUMNS);
        client
            .query_opt(sql.as_str(), &[&guide_id])
            .await
            .map_err(db_err)?
            .as_ref()
            .map(guide_from_row)
            .transpose()
    }

    async fn active_guide_for_robot(&self, robot_id: i64) -> DomainResult<Option<Guide>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM guides WHERE robot_id = $1 AND state = 'ACTIVE'",
            GUIDE_COLUMNS
        );
        client
            .query_opt(sql.as_str(), &[&robot_id])
            .await
            .map_err(db_err)?
            .as_ref()
            .map(guide_from_row)
            .transpose()
    }

    async fn insert_guide(&self, guide: NewGuide) -> DomainResult<Guide> {
        let draft = guide.into_guide(0);
        let client = self.client().await?;
        let sql = format!(
            "INSERT INTO guides (route_id, robot_id, current_waypoint_index, state, waypoint_count, started_at)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            GUIDE_COLUMNS
        );
        let result = client
            .query_one(
                sql.as_str(),
                &[
                    &draft.route_id,
                    &draft.robot_id,
                    &to_i32(draft.current_waypoint_index)?,
                    &draft.state.as_str(),
                    &to_i32(draft.waypoint_count)?,
                    &draft.started_at,
                ],
            )
            .await;

        match result {
            Ok(row) => guide_from_row(&row),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Err(DomainError::invalid_state(
                format!("Robot {} already has an active guide", draft.robot_id),
            )),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn save_guide(&self, guide: &Guide) -> DomainResult<()> {
        let client = self.client().await?;
        let updated = client
            .execute(
                "UPDATE guides SET current_waypoint_index = $2, state = $3, last_advanced_at = $4,
                 completed_at = $5, cancelled_at = $6
                 WHERE id = $1",
                &[
                    &guide.id,
                    &to_i32(guide.current_waypoint_index)?,
                    &guide.state.as_str(),
                    &guide.last_advanced_at,
                    &guide.completed_at,
                    &guide.cancelled_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(DomainError::not_found("Guide", guide.id));
        }
        Ok(())
    }

    async fn guides_for_robot(&self, robot_id: i64) -> DomainResult<Vec<Guide>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {} FROM guides WHERE robot_id = $1 ORDER BY started_at DESC, id DESC",
            GUIDE_COLUMNS
        );
        client
            .query(sql.as_str(), &[&robot_id])
            .await
            .map_err(db_err)?
            .iter()
            .map(guide_from_row)
            .collect()
    }

    async fn list_guides(&self) -> DomainResult<Vec<Guide>> {
        let client = self.client().await?;
        let sql = format!("SELECT {} FROM guides ORDER BY id", GUIDE_COLUMNS);
        client
            .query(sql.as_str(), &[])
            .await
            .map_err(db_err)?
            .iter()
            .map(guide_from_row)
            .collect()
    }

    async fn delete_guide(&self, guide_id: i64) -> DomainResult<bool> {
        let client = self.client().await?;
        let deleted = client
            .execute("DELETE FROM guides WHERE id = $1", &[&guide_id])
            .await
            .map_err(db_err)?;
        Ok(deleted > 0)
    }
}
