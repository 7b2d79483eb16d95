//! Hakim Core
//!
//! Domain logic for the Hakim voice appointment gateway: doctor schedules,
//! appointments, the scheduling store contract, and the availability
//! resolver that validates and books time slots. This crate is free of any
//! HTTP or websocket concerns; the gateway service consumes it through the
//! [`store::SchedulingStore`] trait and [`availability::AvailabilityResolver`].

pub mod appointment;
pub mod availability;
pub mod schedule;
pub mod store;
