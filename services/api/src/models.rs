//! API Models
//!
//! Request payloads and response shapes for the management surface, kept
//! separate from the domain types in `hakim-core` so the wire contract and
//! the OpenAPI document can evolve without touching the scheduling logic.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use hakim_core::{
    appointment::{Appointment, AppointmentStatus},
    availability::SlotAvailability,
    schedule::{DaySchedule, Doctor, Specialization},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

/// Payload for the ephemeral realtime session token endpoint. Everything is
/// optional; omitted fields fall back to the configured defaults.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionTokenPayload {
    #[schema(example = "gpt-4o-realtime-preview-2024-12-17")]
    pub model: Option<String>,
    #[schema(example = "alloy")]
    pub voice: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDoctorPayload {
    #[schema(example = "Dr. Alice Johnson")]
    pub name: String,
    #[schema(value_type = String, example = "General Dentist")]
    pub specialization: Specialization,
    #[schema(value_type = Vec<Object>)]
    pub availability: Vec<DaySchedule>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DoctorResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "General Dentist")]
    pub specialization: Specialization,
    #[schema(value_type = Vec<Object>)]
    pub availability: Vec<DaySchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Doctor> for DoctorResponse {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            specialization: doctor.specialization,
            availability: doctor.availability,
            created_at: doctor.created_at,
            updated_at: doctor.updated_at,
        }
    }
}

/// The doctor fields embedded into appointment responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct DoctorSummary {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "General Dentist")]
    pub specialization: Specialization,
}

impl From<&Doctor> for DoctorSummary {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name.clone(),
            specialization: doctor.specialization,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAppointmentPayload {
    #[schema(value_type = String, format = Uuid)]
    pub doctor_id: Uuid,
    pub patient_name: Option<String>,
    #[schema(example = "john@example.com")]
    pub patient_email: String,
    pub patient_phone: Option<String>,
    pub appointment_date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "09:30:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AppointmentResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub doctor_id: Uuid,
    pub patient_name: Option<String>,
    pub patient_email: String,
    pub patient_phone: Option<String>,
    pub appointment_date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "09:30:00")]
    pub end_time: NaiveTime,
    #[schema(value_type = String, example = "confirmed")]
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub doctor: Option<DoctorSummary>,
}

impl AppointmentResponse {
    pub fn with_doctor(mut self, doctor: Option<&Doctor>) -> Self {
        self.doctor = doctor.map(DoctorSummary::from);
        self
    }
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            doctor_id: appointment.doctor_id,
            patient_name: appointment.patient.name,
            patient_email: appointment.patient.email,
            patient_phone: appointment.patient.phone,
            appointment_date: appointment.date,
            start_time: appointment.slot.start(),
            end_time: appointment.slot.end(),
            status: appointment.status,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
            doctor: None,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAppointmentStatusPayload {
    #[schema(value_type = String, example = "cancelled")]
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListDoctorsQuery {
    /// Substring match over doctor names and specializations.
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAppointmentsQuery {
    #[param(value_type = Option<String>, format = Uuid)]
    pub doctor_id: Option<Uuid>,
    pub patient_email: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, example = "confirmed")]
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilitySlotResponse {
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "12:00:00")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl From<SlotAvailability> for AvailabilitySlotResponse {
    fn from(slot: SlotAvailability) -> Self {
        Self {
            date: slot.date,
            start_time: slot.slot.start(),
            end_time: slot.slot.end(),
            is_available: slot.is_available,
        }
    }
}
