//! Appointment records and their status lifecycle.

use crate::schedule::TimeSlot;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle states of an appointment. Cancellation and no-shows keep the
/// record around but release the time slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Active appointments hold their slot; cancelled and no-show ones don't.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        };
        write!(f, "{label}")
    }
}

/// Patient identity attached to a booking. Only the email is mandatory; the
/// booking tool often has nothing more than a spoken name and an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContact {
    #[serde(
        rename = "patient_name",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(rename = "patient_email")]
    pub email: String,
    #[serde(
        rename = "patient_phone",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
}

/// A booked appointment. `doctor_id` is a non-owning reference; doctor data
/// is looked up on demand. Appointments are never physically deleted here,
/// cancellation is a status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    #[serde(flatten)]
    pub patient: PatientContact,
    #[serde(rename = "appointment_date")]
    pub date: NaiveDate,
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an appointment; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub patient: PatientContact,
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub status: AppointmentStatus,
}
