use anyhow::Context;
use appointment_scheduler::{
    configuration::Configuration,
    configuration_handler::ConfigurationHandler,
    http::{start_server, AppState},
    local_repository::LocalRepository,
    repository::Repository,
    types::{AppointmentBlock, AppointmentType, LocationId, ProviderId},
};
use chrono::{Duration, DurationRound, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn insert_example_blocks<R: Repository, C: Configuration>(state: &AppState<R, C>) -> anyhow::Result<()> {
    const NUMBER_OF_EXAMPLES: i64 = 5;

    let appointment_type = state
        .repository
        .save(AppointmentType::new("General consultation", Some(30)))?;
    let today = Utc::now().duration_trunc(Duration::days(1))?;

    for day in 1..=NUMBER_OF_EXAMPLES {
        let start = today + Duration::days(day) + Duration::hours(9);
        let block = AppointmentBlock::new(
            ProviderId(1),
            LocationId(1),
            appointment_type.id,
            start,
            start + Duration::hours(3),
        )?;
        state
            .slot_generator
            .save_block(block, state.configuration.default_slot_length_minutes())?;
    }
    info!(blocks = NUMBER_OF_EXAMPLES, "Inserted example blocks");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("#########################");
    info!("# Appointment Scheduler #");
    info!("#########################");

    let configuration = ConfigurationHandler::parse_arguments();
    let state = AppState::new(LocalRepository::default(), configuration.clone());
    if configuration.example_data() {
        insert_example_blocks(&state)?;
    }

    let address = format!("{}:{}", configuration.host(), configuration.port());
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Accessible at {address}");

    start_server(listener, state).await?;
    Ok(())
}
