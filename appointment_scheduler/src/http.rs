use crate::availability::AvailabilityResolver;
use crate::configuration::Configuration;
use crate::error::SchedulingError;
use crate::lifecycle::LifecycleManager;
use crate::repository::Repository;
use crate::slot_generator::SlotGenerator;
use crate::types::{
    Appointment, AppointmentBlock, AppointmentStatus, AppointmentType, Entity, EntityId,
    LocationId, ProviderId, TimeSlot,
};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use validator::Validate;

#[derive(Clone)]
pub struct AppState<R: Repository, C: Configuration> {
    pub repository: R,
    pub slot_generator: SlotGenerator<R>,
    pub lifecycle: LifecycleManager<R>,
    pub availability: AvailabilityResolver<R>,
    pub configuration: C,
}

impl<R: Repository, C: Configuration> AppState<R, C> {
    pub fn new(repository: R, configuration: C) -> Self {
        Self {
            slot_generator: SlotGenerator::new(repository.clone()),
            lifecycle: LifecycleManager::new(repository.clone()),
            availability: AvailabilityResolver::new(repository.clone()),
            repository,
            configuration,
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Scheduling(err) => match err {
                SchedulingError::Integrity { .. } | SchedulingError::MissingReference { .. } => {
                    StatusCode::CONFLICT
                }
                SchedulingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        };

        if status.is_server_error() {
            error!(err = %self, "Request failed");
        } else {
            debug!(err = %self, %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn validated<T: Validate>(request: T) -> Result<T, ApiError> {
    request
        .validate()
        .map_err(|err| ApiError::Validation(err.to_string()))?;
    Ok(request)
}

fn find<R: Repository, C: Configuration, E: Entity>(
    state: &AppState<R, C>,
    id: EntityId,
) -> Result<E, ApiError> {
    state
        .lifecycle
        .get::<E>(id)?
        .ok_or_else(|| ApiError::NotFound(format!("{} {id}", E::KIND)))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ListQuery {
    #[serde(default)]
    include_voided: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct VoidRequest {
    #[validate(length(min = 1, max = 255))]
    reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AppointmentTypeRequest {
    #[validate(length(min = 1, max = 255))]
    name: String,
    description: Option<String>,
    #[validate(range(min = 1))]
    duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct SaveBlockRequest {
    id: Option<EntityId>,
    provider: ProviderId,
    location: LocationId,
    appointment_type_id: Option<EntityId>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[validate(range(min = 1))]
    slot_length_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedBlock {
    block: AppointmentBlock,
    slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AddSlotRequest {
    block_id: EntityId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BookAppointmentRequest {
    time_slot_id: EntityId,
    provider: Option<ProviderId>,
    appointment_type_id: Option<EntityId>,
    status: Option<AppointmentStatus>,
    #[validate(length(max = 1024))]
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AvailabilityQuery {
    appointment_type_id: Option<EntityId>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    provider_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotLength {
    slot_length_minutes: Option<i64>,
}

fn with_lifecycle_routes<R, C, E>(
    router: Router<AppState<R, C>>,
    prefix: &str,
) -> Router<AppState<R, C>>
where
    R: Repository,
    C: Configuration,
    E: Entity + Serialize,
{
    router
        .route(
            &format!("{prefix}/:id"),
            get(get_entity::<R, C, E>).delete(purge_entity::<R, C, E>),
        )
        .route(&format!("{prefix}/:id/void"), post(void_entity::<R, C, E>))
        .route(
            &format!("{prefix}/:id/unvoid"),
            post(unvoid_entity::<R, C, E>),
        )
}

pub fn create_app<R: Repository, C: Configuration>(state: AppState<R, C>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route(
            "/appointment_types",
            get(list_entities::<R, C, AppointmentType>).post(save_appointment_type),
        )
        .route(
            "/blocks",
            get(list_entities::<R, C, AppointmentBlock>).post(save_block),
        )
        .route("/blocks/:id/slots", get(get_block_slots))
        .route("/blocks/:id/slot_length", get(get_block_slot_length))
        .route("/slots", get(list_entities::<R, C, TimeSlot>).post(add_slot))
        .route("/slots/:id/appointments", get(get_slot_appointments))
        .route(
            "/appointments",
            get(list_entities::<R, C, Appointment>).post(book_appointment),
        )
        .route("/availability", get(find_available_slots));

    let router = with_lifecycle_routes::<R, C, AppointmentType>(router, "/appointment_types");
    let router = with_lifecycle_routes::<R, C, AppointmentBlock>(router, "/blocks");
    let router = with_lifecycle_routes::<R, C, TimeSlot>(router, "/slots");
    let router = with_lifecycle_routes::<R, C, Appointment>(router, "/appointments");

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn start_server<R: Repository, C: Configuration>(
    listener: TcpListener,
    state: AppState<R, C>,
) -> std::io::Result<()> {
    axum::serve(listener, create_app(state)).await
}

async fn list_entities<R: Repository, C: Configuration, E: Entity + Serialize>(
    State(state): State<AppState<R, C>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<E>>, ApiError> {
    Ok(Json(state.lifecycle.list::<E>(query.include_voided)?))
}

async fn get_entity<R: Repository, C: Configuration, E: Entity + Serialize>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
) -> Result<Json<E>, ApiError> {
    Ok(Json(find::<R, C, E>(&state, id)?))
}

async fn void_entity<R: Repository, C: Configuration, E: Entity + Serialize>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
    Json(request): Json<VoidRequest>,
) -> Result<Json<E>, ApiError> {
    let request = validated(request)?;
    let entity = find::<R, C, E>(&state, id)?;
    Ok(Json(state.lifecycle.void(entity, &request.reason)?))
}

async fn unvoid_entity<R: Repository, C: Configuration, E: Entity + Serialize>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
) -> Result<Json<E>, ApiError> {
    let entity = find::<R, C, E>(&state, id)?;
    Ok(Json(state.lifecycle.unvoid(entity)?))
}

async fn purge_entity<R: Repository, C: Configuration, E: Entity + Serialize>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
) -> Result<StatusCode, ApiError> {
    let entity = find::<R, C, E>(&state, id)?;
    state.lifecycle.purge(&entity)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn save_appointment_type<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Json(request): Json<AppointmentTypeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = validated(request)?;
    let mut appointment_type = AppointmentType::new(request.name, request.duration_minutes);
    appointment_type.description = request.description;

    let appointment_type = state.repository.save(appointment_type)?;
    Ok((StatusCode::CREATED, Json(appointment_type)))
}

async fn save_block<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Json(request): Json<SaveBlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = validated(request)?;
    let slot_length_minutes = request
        .slot_length_minutes
        .unwrap_or_else(|| state.configuration.default_slot_length_minutes());

    let block = match request.id {
        Some(id) => {
            let mut block = find::<R, C, AppointmentBlock>(&state, id)?;
            block.provider = request.provider;
            block.location = request.location;
            block.appointment_type_id = request.appointment_type_id;
            block.start = request.start;
            block.end = request.end;
            block
        }
        None => AppointmentBlock::new(
            request.provider,
            request.location,
            request.appointment_type_id,
            request.start,
            request.end,
        )?,
    };

    let (block, slots) = state.slot_generator.save_block(block, slot_length_minutes)?;
    Ok((StatusCode::CREATED, Json(SavedBlock { block, slots })))
}

async fn get_block_slots<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
) -> Result<Json<Vec<TimeSlot>>, ApiError> {
    let block = state.lifecycle.get::<AppointmentBlock>(id)?;
    Ok(Json(state.availability.find_slots_in_block(block.as_ref())?))
}

async fn get_block_slot_length<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
) -> Result<Json<SlotLength>, ApiError> {
    let block = find::<R, C, AppointmentBlock>(&state, id)?;
    Ok(Json(SlotLength {
        slot_length_minutes: state.slot_generator.current_slot_length(&block)?,
    }))
}

async fn add_slot<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Json(request): Json<AddSlotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let slot = TimeSlot::new(request.block_id, request.start, request.end)?;
    let slot = state.slot_generator.add_slot(slot)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn get_slot_appointments<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Path(id): Path<EntityId>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let slot = find::<R, C, TimeSlot>(&state, id)?;
    Ok(Json(state.availability.find_appointments_in_slot(&slot)?))
}

async fn book_appointment<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = validated(request)?;
    let mut appointment = Appointment::new(
        request.time_slot_id,
        request.provider,
        request.appointment_type_id,
    );
    appointment.status = request.status.unwrap_or_default();
    appointment.reason = request.reason;

    let appointment = state.repository.save(appointment)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn find_available_slots<R: Repository, C: Configuration>(
    State(state): State<AppState<R, C>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<TimeSlot>>, ApiError> {
    let appointment_type = match query.appointment_type_id {
        Some(id) => state.lifecycle.get::<AppointmentType>(id)?,
        None => None,
    };

    let slots = state.availability.find_slots_by_constraints(
        appointment_type.as_ref(),
        query.from,
        query.to,
        query.provider_id.map(ProviderId),
    )?;
    Ok(Json(slots))
}
