//! Axum Handlers for the REST API
//!
//! This module contains the management surface for doctors and appointments,
//! the health check, and the ephemeral realtime session token endpoint. The
//! appointment creation handler goes through the same `AvailabilityResolver`
//! as the voice booking tool, so both paths share one validation routine.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hakim_core::{
    appointment::{AppointmentStatus, PatientContact},
    availability::BookingError,
    schedule::{NewDoctor, TimeSlot},
    store::AppointmentFilter,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::{
    models::{
        AppointmentResponse, AvailabilityQuery, AvailabilitySlotResponse, CreateAppointmentPayload,
        CreateDoctorPayload, DoctorResponse, ErrorResponse, ListAppointmentsQuery,
        ListDoctorsQuery, SessionTokenPayload, UpdateAppointmentStatusPayload,
    },
    state::AppState,
};

const REALTIME_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Upstream(StatusCode, String),
    InternalServerError(anyhow::Error),
}

impl ApiError {
    /// Maps resolver failures onto HTTP statuses. Not a `From` impl because
    /// the blanket anyhow conversion below would collide with it.
    fn from_booking(err: BookingError) -> Self {
        match err {
            BookingError::DoctorNotFound => ApiError::NotFound(err.to_string()),
            BookingError::DayUnavailable(_) | BookingError::SlotOutsideSchedule => {
                ApiError::BadRequest(err.to_string())
            }
            BookingError::SlotConflict => ApiError::Conflict(err.to_string()),
            BookingError::Store(e) => ApiError::InternalServerError(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Upstream(status, message) => {
                (status, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Service health check.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up")
    )
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Create an ephemeral realtime session token for WebRTC clients.
///
/// This is a stateless forwarding call: the request is relayed to the
/// realtime sessions endpoint and the upstream response (token included)
/// is returned as-is.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = SessionTokenPayload,
    responses(
        (status = 200, description = "Ephemeral session created"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_realtime_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionTokenPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let model = payload
        .model
        .unwrap_or_else(|| state.config.realtime_model.clone());
    let voice = payload
        .voice
        .unwrap_or_else(|| state.config.realtime_voice.clone());

    let mut body = serde_json::json!({ "model": model, "voice": voice });
    if let Some(instructions) = payload.system_prompt {
        body["instructions"] = serde_json::Value::String(instructions);
    }

    let response = state
        .http
        .post(REALTIME_SESSIONS_URL)
        .bearer_auth(&state.config.openai_api_key)
        .json(&body)
        .send()
        .await?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Upstream(status, text));
    }
    Ok(Json(serde_json::from_str(&text)?))
}

/// Register a new doctor with their weekly availability.
#[utoipa::path(
    post,
    path = "/api/v1/doctors",
    request_body = CreateDoctorPayload,
    responses(
        (status = 201, description = "Doctor created", body = DoctorResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse)
    )
)]
pub async fn create_doctor(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDoctorPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().len() < 2 {
        return Err(ApiError::BadRequest(
            "name must be at least 2 characters".to_string(),
        ));
    }

    let doctor = state
        .store
        .insert_doctor(NewDoctor {
            name: payload.name.trim().to_string(),
            specialization: payload.specialization,
            availability: payload.availability,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DoctorResponse::from(doctor))))
}

/// List doctors, optionally filtered by a name/specialization search term.
#[utoipa::path(
    get,
    path = "/api/v1/doctors",
    params(ListDoctorsQuery),
    responses(
        (status = 200, description = "List of doctors", body = [DoctorResponse])
    )
)]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDoctorsQuery>,
) -> Result<Json<Vec<DoctorResponse>>, ApiError> {
    let doctors = match query.q {
        Some(text) => {
            state
                .store
                .find_doctors_by_name_or_specialization(&text)
                .await?
        }
        None => state.store.list_doctors().await?,
    };
    Ok(Json(doctors.into_iter().map(DoctorResponse::from).collect()))
}

/// Get a single doctor by id.
#[utoipa::path(
    get,
    path = "/api/v1/doctors/{id}",
    params(
        ("id" = Uuid, Path, description = "Doctor ID")
    ),
    responses(
        (status = 200, description = "Doctor details", body = DoctorResponse),
        (status = 404, description = "Doctor not found", body = ErrorResponse)
    )
)]
pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DoctorResponse>, ApiError> {
    let doctor = state
        .store
        .find_doctor_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".to_string()))?;
    Ok(Json(DoctorResponse::from(doctor)))
}

/// List a doctor's declared slots over a date range, flagged with whether
/// each slot is still free.
#[utoipa::path(
    get,
    path = "/api/v1/doctors/{id}/availability",
    params(
        ("id" = Uuid, Path, description = "Doctor ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability per declared slot", body = [AvailabilitySlotResponse]),
        (status = 400, description = "Invalid date range", body = ErrorResponse),
        (status = 404, description = "Doctor not found", body = ErrorResponse)
    )
)]
pub async fn doctor_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<AvailabilitySlotResponse>>, ApiError> {
    if query.end_date < query.start_date {
        return Err(ApiError::BadRequest(
            "end_date must not be before start_date".to_string(),
        ));
    }

    let listing = state
        .resolver
        .list_availability(id, query.start_date, query.end_date)
        .await
        .map_err(ApiError::from_booking)?;

    Ok(Json(
        listing.into_iter().map(AvailabilitySlotResponse::from).collect(),
    ))
}

/// Book an appointment through the management surface.
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    request_body = CreateAppointmentPayload,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentResponse),
        (status = 400, description = "Outside the doctor's schedule", body = ErrorResponse),
        (status = 404, description = "Doctor not found", body = ErrorResponse),
        (status = 409, description = "Slot already booked", body = ErrorResponse)
    )
)]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAppointmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let slot = TimeSlot::new(payload.start_time, payload.end_time)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let patient = PatientContact {
        name: payload.patient_name,
        email: payload.patient_email,
        phone: payload.patient_phone,
    };

    let appointment = state
        .resolver
        .book(payload.doctor_id, patient, payload.appointment_date, slot)
        .await
        .map_err(ApiError::from_booking)?;

    let doctor = state.store.find_doctor_by_id(appointment.doctor_id).await?;
    let response = AppointmentResponse::from(appointment).with_doctor(doctor.as_ref());
    Ok((StatusCode::CREATED, Json(response)))
}

/// List appointments with optional doctor/date/patient/status filters.
#[utoipa::path(
    get,
    path = "/api/v1/appointments",
    params(ListAppointmentsQuery),
    responses(
        (status = 200, description = "List of appointments", body = [AppointmentResponse])
    )
)]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, ApiError> {
    let appointments = state
        .store
        .list_appointments(AppointmentFilter {
            doctor_id: query.doctor_id,
            date: query.appointment_date,
            patient_email: query.patient_email,
            status: query.status,
        })
        .await?;

    let mut responses = Vec::with_capacity(appointments.len());
    for appointment in appointments {
        let doctor = state.store.find_doctor_by_id(appointment.doctor_id).await?;
        responses.push(AppointmentResponse::from(appointment).with_doctor(doctor.as_ref()));
    }
    Ok(Json(responses))
}

/// Get a single appointment by id.
#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}",
    params(
        ("id" = Uuid, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Appointment details", body = AppointmentResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse)
    )
)]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = state
        .store
        .find_appointment_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;
    let doctor = state.store.find_doctor_by_id(appointment.doctor_id).await?;
    Ok(Json(
        AppointmentResponse::from(appointment).with_doctor(doctor.as_ref()),
    ))
}

/// Update an appointment's status (the cancellation path that frees a slot).
#[utoipa::path(
    patch,
    path = "/api/v1/appointments/{id}/status",
    request_body = UpdateAppointmentStatusPayload,
    params(
        ("id" = Uuid, Path, description = "Appointment ID")
    ),
    responses(
        (status = 200, description = "Status updated", body = AppointmentResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
        (status = 409, description = "Reactivation would double-book the slot", body = ErrorResponse)
    )
)]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentStatusPayload>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let existing = state
        .store
        .find_appointment_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    // Reactivating a released appointment must not overlap bookings made in
    // the meantime.
    if payload.status.is_active() && !existing.status.is_active() {
        let released = [AppointmentStatus::Cancelled, AppointmentStatus::NoShow];
        let active = state
            .store
            .appointments_on(existing.doctor_id, existing.date, &released)
            .await?;
        if active
            .iter()
            .any(|a| a.id != existing.id && a.slot.overlaps(&existing.slot))
        {
            return Err(ApiError::Conflict(
                "This time slot is already booked".to_string(),
            ));
        }
    }

    let updated = state
        .store
        .update_appointment_status(id, payload.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    let doctor = state.store.find_doctor_by_id(updated.doctor_id).await?;
    Ok(Json(
        AppointmentResponse::from(updated).with_doctor(doctor.as_ref()),
    ))
}
