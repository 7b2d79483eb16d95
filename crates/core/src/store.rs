//! The scheduling store: the one resource shared across sessions.
//!
//! The gateway consumes the store through the [`SchedulingStore`] trait so
//! the persistence backend can change without touching the resolver or the
//! tool handlers. The shipped [`MemoryStore`] keeps everything in process
//! and implements the conditional appointment insert as an atomic write:
//! the overlap invariant is re-checked under the same write guard that
//! performs the insert, so two racing bookings can never both commit.

use crate::appointment::{Appointment, AppointmentStatus, NewAppointment};
use crate::schedule::{Doctor, NewDoctor};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Failure talking to the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Result of a conditional appointment insert.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(Appointment),
    /// An active appointment for the same doctor and date already overlaps
    /// the requested slot.
    Conflict,
}

/// Filters for the appointment listing surface.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub patient_email: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn find_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;

    /// Case-insensitive substring match over doctor names and
    /// specializations. An empty query returns the full roster.
    async fn find_doctors_by_name_or_specialization(
        &self,
        text: &str,
    ) -> Result<Vec<Doctor>, StoreError>;

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError>;

    async fn insert_doctor(&self, doctor: NewDoctor) -> Result<Doctor, StoreError>;

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Appointments for one doctor on one date, excluding the given
    /// statuses, ordered by start time.
    async fn appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        excluded: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Atomic conditional write: inserts unless an active appointment for
    /// the same doctor and date overlaps the new slot. The check and the
    /// insert happen under one writer-exclusive section.
    async fn insert_appointment_if_no_conflict(
        &self,
        appointment: NewAppointment,
    ) -> Result<InsertOutcome, StoreError>;

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError>;
}

#[derive(Default)]
struct Inner {
    doctors: HashMap<Uuid, Doctor>,
    appointments: HashMap<Uuid, Appointment>,
}

/// In-process store. Reads share the lock; only doctor creation and the
/// conditional appointment insert take it exclusively, so bookings for
/// different doctors contend only for the duration of a map insert.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    async fn find_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.doctors.get(&id).cloned())
    }

    async fn find_doctors_by_name_or_specialization(
        &self,
        text: &str,
    ) -> Result<Vec<Doctor>, StoreError> {
        let query = text.trim().to_lowercase();
        let inner = self.inner.read().await;
        let mut doctors: Vec<Doctor> = inner
            .doctors
            .values()
            .filter(|doctor| {
                query.is_empty()
                    || doctor.name.to_lowercase().contains(&query)
                    || doctor
                        .specialization
                        .to_string()
                        .to_lowercase()
                        .contains(&query)
            })
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn list_doctors(&self) -> Result<Vec<Doctor>, StoreError> {
        let inner = self.inner.read().await;
        let mut doctors: Vec<Doctor> = inner.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn insert_doctor(&self, doctor: NewDoctor) -> Result<Doctor, StoreError> {
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: doctor.name,
            specialization: doctor.specialization,
            availability: doctor.availability,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.write().await;
        inner.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.appointments.get(&id).cloned())
    }

    async fn appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        excluded: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.read().await;
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id && a.date == date && !excluded.contains(&a.status)
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.slot.start());
        Ok(appointments)
    }

    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.read().await;
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| {
                filter.doctor_id.is_none_or(|id| a.doctor_id == id)
                    && filter.date.is_none_or(|d| a.date == d)
                    && filter
                        .patient_email
                        .as_deref()
                        .is_none_or(|email| a.patient.email == email)
                    && filter.status.is_none_or(|s| a.status == s)
            })
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.date, a.slot.start()));
        Ok(appointments)
    }

    async fn insert_appointment_if_no_conflict(
        &self,
        appointment: NewAppointment,
    ) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let conflicting = inner.appointments.values().any(|existing| {
            existing.doctor_id == appointment.doctor_id
                && existing.date == appointment.date
                && existing.status.is_active()
                && existing.slot.overlaps(&appointment.slot)
        });
        if conflicting {
            return Ok(InsertOutcome::Conflict);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: appointment.doctor_id,
            patient: appointment.patient,
            date: appointment.date,
            slot: appointment.slot,
            status: appointment.status,
            created_at: now,
            updated_at: now,
        };
        inner.appointments.insert(appointment.id, appointment.clone());
        Ok(InsertOutcome::Inserted(appointment))
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.appointments.get_mut(&id) {
            Some(appointment) => {
                appointment.status = status;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            None => Ok(None),
        }
    }
}
