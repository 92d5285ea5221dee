use campus_guide::adapters::inbound::TelemetryListener;
use campus_guide::adapters::outbound::{init_logger, InMemoryRepository, KafkaMessageBus, PostgresRepository};
use campus_guide::application::NavigationService;
use campus_guide::config::StorageBackend;
use campus_guide::domains::guidance::{navigation_event_channel, NavigationEventActor};
use campus_guide::domains::{MessageBus, Repository};
use campus_guide::{ApplicationError, ApplicationResult, Config};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> ApplicationResult<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting campus guide with {}", config_path);
    info!("Kafka brokers: {:?}", config.kafka.brokers);

    let logger = init_logger(&config.logging);

    let repository: Arc<dyn Repository> = match config.storage.backend {
        StorageBackend::Postgres => {
            info!("PostgreSQL host: {}:{}", config.postgres.host, config.postgres.port);
            let postgres = PostgresRepository::new(config.postgres.clone())
                .await
                .map_err(ApplicationError::Startup)?;
            Arc::new(postgres)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, nothing survives a restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    let kafka = KafkaMessageBus::new(config.kafka.clone()).map_err(ApplicationError::Startup)?;
    if !kafka.probe().await {
        warn!("Commands will fail until the Kafka brokers are reachable");
    }
    let bus: Arc<dyn MessageBus> = Arc::new(kafka);

    let (events, event_rx) = navigation_event_channel(EVENT_BUFFER);
    let actor = NavigationEventActor::new(event_rx).with_bus(bus.clone());
    let actor_task = tokio::spawn(actor.run());

    let service = Arc::new(NavigationService::new(
        repository,
        bus.clone(),
        &config,
        logger.clone(),
        events,
    ));

    let listeners = TelemetryListener::new(service.clone(), bus).start().await?;
    logger.info(&format!("Campus guide ready, {} telemetry subscriptions", listeners.len()));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ApplicationError::Startup(e.to_string()))?;
    info!("Shutting down campus guide");

    for listener in listeners {
        listener.abort();
        let _ = listener.await;
    }
    // the actor drains once the service drops its event sender
    drop(service);
    if let Err(e) = actor_task.await {
        error!("Event actor ended abnormally: {}", e);
    }

    Ok(())
}
