//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, the websocket proxy endpoint, and OpenAPI
//! documentation.

use crate::{
    handlers,
    models::{
        AppointmentResponse, AvailabilitySlotResponse, CreateAppointmentPayload,
        CreateDoctorPayload, DoctorResponse, DoctorSummary, ErrorResponse, SessionTokenPayload,
        UpdateAppointmentStatusPayload,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, patch, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::create_realtime_session,
        handlers::create_doctor,
        handlers::list_doctors,
        handlers::get_doctor,
        handlers::doctor_availability,
        handlers::create_appointment,
        handlers::list_appointments,
        handlers::get_appointment,
        handlers::update_appointment_status,
    ),
    components(
        schemas(
            SessionTokenPayload,
            CreateDoctorPayload,
            DoctorResponse,
            DoctorSummary,
            CreateAppointmentPayload,
            AppointmentResponse,
            UpdateAppointmentStatusPayload,
            AvailabilitySlotResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "Hakim API", description = "Doctor and appointment management for the Hakim voice gateway")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/sessions", post(handlers::create_realtime_session))
        .route(
            "/api/v1/doctors",
            get(handlers::list_doctors).post(handlers::create_doctor),
        )
        .route("/api/v1/doctors/{id}", get(handlers::get_doctor))
        .route(
            "/api/v1/doctors/{id}/availability",
            get(handlers::doctor_availability),
        )
        .route(
            "/api/v1/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route("/api/v1/appointments/{id}", get(handlers::get_appointment))
        .route(
            "/api/v1/appointments/{id}/status",
            patch(handlers::update_appointment_status),
        )
        .route("/ws/proxy", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
