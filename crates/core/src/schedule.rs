//! Doctor schedules: time slots, weekly availability, and the doctor record.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A schedule entry failed validation while being constructed or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("end_time must be after start_time")]
    EmptyTimeSlot,
    #[error("day_of_week must be between 0 (Monday) and 6 (Sunday), got {0}")]
    InvalidWeekday(u8),
}

/// A half-open interval `[start, end)` of time within one day.
///
/// Two slots overlap when `s1 < e2 && s2 < e1`; touching endpoints do not
/// overlap, so back-to-back bookings are allowed. The `end > start`
/// invariant is enforced on every construction path, including
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSlot")]
pub struct TimeSlot {
    #[serde(rename = "start_time")]
    start: NaiveTime,
    #[serde(rename = "end_time")]
    end: NaiveTime,
}

#[derive(Deserialize)]
struct RawTimeSlot {
    start_time: NaiveTime,
    end_time: NaiveTime,
}

impl TryFrom<RawTimeSlot> for TimeSlot {
    type Error = ScheduleError;

    fn try_from(raw: RawTimeSlot) -> Result<Self, Self::Error> {
        Self::new(raw.start_time, raw.end_time)
    }
}

impl TimeSlot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if end <= start {
            return Err(ScheduleError::EmptyTimeSlot);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Half-open overlap test: `[s1, e1)` intersects `[s2, e2)`.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `inner` lies fully within this slot (`end == self.end` counts).
    pub fn contains(&self, inner: &TimeSlot) -> bool {
        inner.start >= self.start && inner.end <= self.end
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The declared working slots for one weekday of a doctor's week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDaySchedule")]
pub struct DaySchedule {
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u8,
    pub time_slots: Vec<TimeSlot>,
}

#[derive(Deserialize)]
struct RawDaySchedule {
    day_of_week: u8,
    time_slots: Vec<TimeSlot>,
}

impl TryFrom<RawDaySchedule> for DaySchedule {
    type Error = ScheduleError;

    fn try_from(raw: RawDaySchedule) -> Result<Self, Self::Error> {
        Self::new(raw.day_of_week, raw.time_slots)
    }
}

impl DaySchedule {
    pub fn new(day_of_week: u8, time_slots: Vec<TimeSlot>) -> Result<Self, ScheduleError> {
        if day_of_week > 6 {
            return Err(ScheduleError::InvalidWeekday(day_of_week));
        }
        Ok(Self {
            day_of_week,
            time_slots,
        })
    }
}

/// Weekday index for a calendar date, Monday = 0 .. Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Dental specialties offered by the clinic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Specialization {
    #[serde(rename = "General Dentist")]
    GeneralDentist,
    #[serde(rename = "Orthodontics")]
    Orthodontics,
    #[serde(rename = "Prosthodontics")]
    Prosthodontics,
    #[serde(rename = "Endodontics")]
    Endodontics,
    #[serde(rename = "Oral Surgeon")]
    OralSurgeon,
    #[serde(rename = "Pediatric Dentist")]
    PediatricDentist,
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Specialization::GeneralDentist => "General Dentist",
            Specialization::Orthodontics => "Orthodontics",
            Specialization::Prosthodontics => "Prosthodontics",
            Specialization::Endodontics => "Endodontics",
            Specialization::OralSurgeon => "Oral Surgeon",
            Specialization::PediatricDentist => "Pediatric Dentist",
        };
        write!(f, "{label}")
    }
}

/// A doctor and their weekly availability. Read-mostly: the management
/// surface and the seed loader write doctors, everything else only reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: Specialization,
    pub availability: Vec<DaySchedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    /// Whether any schedule entry exists for the given weekday.
    pub fn is_available_on(&self, weekday: u8) -> bool {
        self.availability.iter().any(|d| d.day_of_week == weekday)
    }

    /// All declared slots for the given weekday, in declaration order.
    pub fn slots_for(&self, weekday: u8) -> impl Iterator<Item = &TimeSlot> {
        self.availability
            .iter()
            .filter(move |d| d.day_of_week == weekday)
            .flat_map(|d| d.time_slots.iter())
    }
}

/// Input for creating a doctor; the store assigns the id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: Specialization,
    pub availability: Vec<DaySchedule>,
}
