//! Slot validation and booking.
//!
//! The resolver is pure decision logic over the store contract: it owns the
//! weekday/containment/overlap checks and is the single validation routine
//! behind every appointment creation path (the voice booking tool and the
//! management surface both go through [`AvailabilityResolver::book`]).

use crate::appointment::{Appointment, AppointmentStatus, NewAppointment, PatientContact};
use crate::schedule::{weekday_index, Doctor, TimeSlot};
use crate::store::{InsertOutcome, SchedulingStore, StoreError};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Statuses that do not hold a slot and are ignored by conflict checks.
const RELEASED_STATUSES: [AppointmentStatus; 2] =
    [AppointmentStatus::Cancelled, AppointmentStatus::NoShow];

/// Why a slot cannot be checked or booked. The messages are stable: the
/// speech model reads them verbatim and reacts to the wording.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Doctor not found")]
    DoctorNotFound,
    #[error("Doctor is not available on this day (day {0})")]
    DayUnavailable(u8),
    #[error("Doctor is not available during this time slot")]
    SlotOutsideSchedule,
    #[error("This time slot is already booked")]
    SlotConflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One declared schedule slot on a concrete date, flagged with whether it is
/// still free of active appointments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotAvailability {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub is_available: bool,
}

pub struct AvailabilityResolver {
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityResolver {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    async fn doctor(&self, doctor_id: uuid::Uuid) -> Result<Doctor, BookingError> {
        self.store
            .find_doctor_by_id(doctor_id)
            .await?
            .ok_or(BookingError::DoctorNotFound)
    }

    /// Validates a requested slot against the doctor's declared schedule and
    /// the active bookings on that date.
    pub async fn check_slot(
        &self,
        doctor_id: uuid::Uuid,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<(), BookingError> {
        let doctor = self.doctor(doctor_id).await?;
        let weekday = weekday_index(date);
        if !doctor.is_available_on(weekday) {
            return Err(BookingError::DayUnavailable(weekday));
        }
        if !doctor.slots_for(weekday).any(|declared| declared.contains(&slot)) {
            return Err(BookingError::SlotOutsideSchedule);
        }

        let booked = self
            .store
            .appointments_on(doctor_id, date, &RELEASED_STATUSES)
            .await?;
        if booked.iter().any(|existing| existing.slot.overlaps(&slot)) {
            return Err(BookingError::SlotConflict);
        }
        Ok(())
    }

    /// The declared schedule for the given date's weekday, without any
    /// conflict check. Backs the `get_doctor_availability` tool.
    pub async fn day_schedule(
        &self,
        doctor_id: uuid::Uuid,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        let doctor = self.doctor(doctor_id).await?;
        let weekday = weekday_index(date);
        if !doctor.is_available_on(weekday) {
            return Err(BookingError::DayUnavailable(weekday));
        }
        Ok(doctor.slots_for(weekday).copied().collect())
    }

    /// Every declared slot in the inclusive date range, flagged with whether
    /// an active appointment already overlaps it. Ordered by date, then slot
    /// start; read-only and restartable by re-invocation.
    pub async fn list_availability(
        &self,
        doctor_id: uuid::Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, BookingError> {
        let doctor = self.doctor(doctor_id).await?;

        let mut listing = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            let weekday = weekday_index(date);
            let mut slots: Vec<TimeSlot> = doctor.slots_for(weekday).copied().collect();
            if slots.is_empty() {
                continue;
            }
            slots.sort_by_key(TimeSlot::start);

            let booked = self
                .store
                .appointments_on(doctor_id, date, &RELEASED_STATUSES)
                .await?;
            for slot in slots {
                let is_available = !booked.iter().any(|a| a.slot.overlaps(&slot));
                listing.push(SlotAvailability {
                    date,
                    slot,
                    is_available,
                });
            }
        }
        Ok(listing)
    }

    /// Books the slot with status `confirmed`.
    ///
    /// `check_slot` and the insert are not one critical section here; the
    /// store's conditional write is the serialization point, so a racing
    /// booking that passes the check still loses cleanly with
    /// [`BookingError::SlotConflict`].
    pub async fn book(
        &self,
        doctor_id: uuid::Uuid,
        patient: PatientContact,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> Result<Appointment, BookingError> {
        self.check_slot(doctor_id, date, slot).await?;

        let outcome = self
            .store
            .insert_appointment_if_no_conflict(NewAppointment {
                doctor_id,
                patient,
                date,
                slot,
                status: AppointmentStatus::Confirmed,
            })
            .await?;

        match outcome {
            InsertOutcome::Inserted(appointment) => Ok(appointment),
            InsertOutcome::Conflict => {
                warn!(%doctor_id, %date, %slot, "booking lost the race for a slot");
                Err(BookingError::SlotConflict)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{DaySchedule, NewDoctor, Specialization};
    use crate::store::MemoryStore;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(start: (u32, u32), end: (u32, u32)) -> TimeSlot {
        TimeSlot::new(t(start.0, start.1), t(end.0, end.1)).unwrap()
    }

    fn patient(email: &str) -> PatientContact {
        PatientContact {
            name: None,
            email: email.to_string(),
            phone: None,
        }
    }

    // 2025-04-07 is a Monday, 2025-04-08 a Tuesday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 7).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 8).unwrap()
    }

    /// Doctor with Monday 09:00-12:00 and 13:00-17:00, nothing else.
    async fn fixture() -> (Arc<MemoryStore>, AvailabilityResolver, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let doctor = store
            .insert_doctor(NewDoctor {
                name: "Dr. Alice Johnson".to_string(),
                specialization: Specialization::GeneralDentist,
                availability: vec![DaySchedule::new(
                    0,
                    vec![slot((9, 0), (12, 0)), slot((13, 0), (17, 0))],
                )
                .unwrap()],
            })
            .await
            .unwrap();
        let resolver = AvailabilityResolver::new(store.clone() as Arc<dyn SchedulingStore>);
        (store, resolver, doctor.id)
    }

    #[tokio::test]
    async fn books_a_free_slot_as_confirmed() {
        let (_, resolver, doctor_id) = fixture().await;

        let appointment = resolver
            .book(doctor_id, patient("john@example.com"), monday(), slot((9, 0), (9, 30)))
            .await
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(appointment.doctor_id, doctor_id);

        // The identical window is now taken.
        let err = resolver
            .check_slot(doctor_id, monday(), slot((9, 0), (9, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotConflict));
    }

    #[tokio::test]
    async fn overlapping_booking_conflicts_and_adjacent_does_not() {
        let (_, resolver, doctor_id) = fixture().await;

        resolver
            .book(doctor_id, patient("john@example.com"), monday(), slot((9, 0), (9, 30)))
            .await
            .unwrap();

        let err = resolver
            .book(doctor_id, patient("jane@example.com"), monday(), slot((9, 15), (9, 45)))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotConflict));

        // Starts exactly where the previous booking ends.
        resolver
            .book(doctor_id, patient("jane@example.com"), monday(), slot((9, 30), (10, 0)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_days_off_and_out_of_schedule_windows() {
        let (_, resolver, doctor_id) = fixture().await;

        let err = resolver
            .check_slot(doctor_id, tuesday(), slot((9, 0), (9, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DayUnavailable(1)));

        // Crosses the end of the morning block.
        let err = resolver
            .check_slot(doctor_id, monday(), slot((11, 30), (12, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotOutsideSchedule));

        // Ending exactly at the declared end is fine.
        resolver
            .check_slot(doctor_id, monday(), slot((11, 30), (12, 0)))
            .await
            .unwrap();

        let err = resolver
            .check_slot(Uuid::new_v4(), monday(), slot((9, 0), (9, 30)))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DoctorNotFound));
    }

    #[tokio::test]
    async fn day_schedule_reports_declared_slots_or_day_off() {
        let (_, resolver, doctor_id) = fixture().await;

        let slots = resolver.day_schedule(doctor_id, monday()).await.unwrap();
        assert_eq!(slots, vec![slot((9, 0), (12, 0)), slot((13, 0), (17, 0))]);

        let err = resolver.day_schedule(doctor_id, tuesday()).await.unwrap_err();
        assert!(matches!(err, BookingError::DayUnavailable(1)));
    }

    #[tokio::test]
    async fn availability_listing_tracks_bookings_and_cancellations() {
        let (store, resolver, doctor_id) = fixture().await;

        let listing = resolver
            .list_availability(doctor_id, monday(), tuesday())
            .await
            .unwrap();
        // Tuesday has no schedule, so only Monday's two blocks appear.
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|s| s.is_available));
        assert_eq!(listing[0].slot, slot((9, 0), (12, 0)));
        assert_eq!(listing[1].slot, slot((13, 0), (17, 0)));

        let appointment = resolver
            .book(doctor_id, patient("john@example.com"), monday(), slot((10, 0), (10, 30)))
            .await
            .unwrap();

        let listing = resolver
            .list_availability(doctor_id, monday(), monday())
            .await
            .unwrap();
        assert!(!listing[0].is_available);
        assert!(listing[1].is_available);

        store
            .update_appointment_status(appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let listing = resolver
            .list_availability(doctor_id, monday(), monday())
            .await
            .unwrap();
        assert!(listing[0].is_available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_overlapping_bookings_commit_at_most_once() {
        let (store, _, doctor_id) = fixture().await;
        let resolver = Arc::new(AvailabilityResolver::new(
            store.clone() as Arc<dyn SchedulingStore>
        ));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let mut tasks = Vec::new();
        for (email, window) in [
            ("john@example.com", slot((9, 0), (9, 30))),
            ("jane@example.com", slot((9, 15), (9, 45))),
        ] {
            let resolver = resolver.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                resolver
                    .book(doctor_id, patient(email), monday(), window)
                    .await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(BookingError::SlotConflict) => conflicts += 1,
                Err(other) => panic!("unexpected booking failure: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
    }
}
