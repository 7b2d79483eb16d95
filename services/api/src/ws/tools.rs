//! The tool registry the speech model can invoke mid-conversation.
//!
//! The registry is closed: every operation is a variant of
//! [`ToolInvocation`] with its own typed argument structure. Dispatch never
//! lets a handler failure escape to the session; every request produces
//! exactly one correlated `tool_response`, with failures converted into an
//! `{"error": ...}` content object. Domain failures keep their distinct
//! messages so the model can react to the wording; unexpected failures are
//! logged at error level to keep them distinguishable in the logs.

use crate::ws::protocol::{OutboundFrame, ToolCallRequest, ToolSpec};
use chrono::{NaiveDate, NaiveTime};
use hakim_core::{
    appointment::PatientContact,
    availability::{AvailabilityResolver, BookingError},
    schedule::TimeSlot,
    store::SchedulingStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct SearchDoctorArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityArgs {
    doctor_id: Uuid,
    date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct BookAppointmentArgs {
    doctor_id: Uuid,
    patient_email: String,
    patient_name: Option<String>,
    appointment_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
}

/// A fully decoded tool invocation.
#[derive(Debug)]
enum ToolInvocation {
    SearchDoctorByName(SearchDoctorArgs),
    GetDoctorAvailability(AvailabilityArgs),
    BookAppointment {
        doctor_id: Uuid,
        patient: PatientContact,
        date: NaiveDate,
        slot: TimeSlot,
    },
}

enum ParseError {
    UnknownTool,
    InvalidArguments(String),
}

impl ToolInvocation {
    fn parse(name: &str, content: Value) -> Result<Self, ParseError> {
        fn args<T: serde::de::DeserializeOwned>(content: Value) -> Result<T, ParseError> {
            serde_json::from_value(content).map_err(|e| ParseError::InvalidArguments(e.to_string()))
        }

        match name {
            "search_doctor_by_name" => Ok(Self::SearchDoctorByName(args(content)?)),
            "get_doctor_availability" => Ok(Self::GetDoctorAvailability(args(content)?)),
            "book_appointment" => {
                let raw: BookAppointmentArgs = args(content)?;
                let slot = TimeSlot::new(raw.start_time, raw.end_time)
                    .map_err(|e| ParseError::InvalidArguments(e.to_string()))?;
                Ok(Self::BookAppointment {
                    doctor_id: raw.doctor_id,
                    patient: PatientContact {
                        name: raw.patient_name,
                        email: raw.patient_email,
                        phone: None,
                    },
                    date: raw.appointment_date,
                    slot,
                })
            }
            _ => Err(ParseError::UnknownTool),
        }
    }
}

/// Routes decoded tool calls to the scheduling domain.
pub struct ToolDispatcher {
    store: Arc<dyn SchedulingStore>,
    resolver: Arc<AvailabilityResolver>,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn SchedulingStore>, resolver: Arc<AvailabilityResolver>) -> Self {
        Self { store, resolver }
    }

    /// Handles one tool call and always yields the correlated response
    /// frame, never an error.
    pub async fn dispatch(&self, request: ToolCallRequest) -> OutboundFrame {
        info!(tool = %request.name, call_id = %request.id, "Dispatching tool call");

        let content = match ToolInvocation::parse(&request.name, request.content.clone()) {
            Ok(invocation) => match self.invoke(invocation).await {
                Ok(result) => result,
                Err(err) => {
                    match &err {
                        BookingError::Store(source) => {
                            error!(tool = %request.name, call_id = %request.id, %source,
                                "Tool handler hit an unexpected failure");
                        }
                        domain => {
                            warn!(tool = %request.name, call_id = %request.id, %domain,
                                "Tool call failed with a domain error");
                        }
                    }
                    json!({ "error": err.to_string() })
                }
            },
            Err(ParseError::UnknownTool) => {
                warn!(tool = %request.name, call_id = %request.id, "Unknown tool requested");
                json!({ "error": "Unknown tool" })
            }
            Err(ParseError::InvalidArguments(detail)) => {
                warn!(tool = %request.name, call_id = %request.id, %detail,
                    "Tool call carried invalid arguments");
                json!({ "error": format!("Invalid arguments for tool '{}': {detail}", request.name) })
            }
        };

        OutboundFrame::ToolResponse {
            call_id: request.id,
            name: request.name,
            content,
        }
    }

    async fn invoke(&self, invocation: ToolInvocation) -> Result<Value, BookingError> {
        match invocation {
            ToolInvocation::SearchDoctorByName(args) => {
                let doctors = self
                    .store
                    .find_doctors_by_name_or_specialization(&args.name)
                    .await?;
                Ok(json!({ "doctors": doctors }))
            }
            ToolInvocation::GetDoctorAvailability(args) => {
                let slots = self.resolver.day_schedule(args.doctor_id, args.date).await?;
                Ok(json!({ "available_slots": slots }))
            }
            ToolInvocation::BookAppointment {
                doctor_id,
                patient,
                date,
                slot,
            } => {
                let appointment = self.resolver.book(doctor_id, patient, date, slot).await?;
                Ok(json!({
                    "status": "success",
                    "message": "Appointment booked successfully!",
                    "appointment": appointment,
                }))
            }
        }
    }
}

/// The tool catalog advertised to the speech model at session start.
pub fn tool_catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            kind: "function",
            name: "search_doctor_by_name",
            description: "Search for doctors by name or specialization.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "The name or specialization the patient is looking for"
                    }
                },
                "required": ["name"]
            }),
        },
        ToolSpec {
            kind: "function",
            name: "get_doctor_availability",
            description: "Show a doctor's declared schedule for a specific day.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "doctor_id": { "type": "string" },
                    "date": { "type": "string", "format": "date" }
                },
                "required": ["doctor_id", "date"]
            }),
        },
        ToolSpec {
            kind: "function",
            name: "book_appointment",
            description: "Book an appointment after the patient confirms.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "doctor_id": { "type": "string" },
                    "patient_email": { "type": "string" },
                    "patient_name": { "type": "string" },
                    "appointment_date": { "type": "string", "format": "date" },
                    "start_time": { "type": "string", "format": "time" },
                    "end_time": { "type": "string", "format": "time" }
                },
                "required": ["doctor_id", "patient_email", "appointment_date", "start_time", "end_time"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hakim_core::schedule::{DaySchedule, NewDoctor, Specialization};
    use hakim_core::store::MemoryStore;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// Dispatcher over a store holding one doctor with Monday 09:00-12:00.
    async fn fixture() -> (ToolDispatcher, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let doctor = store
            .insert_doctor(NewDoctor {
                name: "Dr. Alice Johnson".to_string(),
                specialization: Specialization::GeneralDentist,
                availability: vec![
                    DaySchedule::new(0, vec![TimeSlot::new(t(9, 0), t(12, 0)).unwrap()]).unwrap(),
                ],
            })
            .await
            .unwrap();

        let store: Arc<dyn SchedulingStore> = store;
        let resolver = Arc::new(AvailabilityResolver::new(store.clone()));
        (ToolDispatcher::new(store, resolver), doctor.id)
    }

    fn request(id: &str, name: &str, content: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            content,
        }
    }

    fn response_content(frame: OutboundFrame, expected_id: &str) -> Value {
        let OutboundFrame::ToolResponse {
            call_id, content, ..
        } = frame
        else {
            panic!("expected a tool response");
        };
        assert_eq!(call_id, expected_id);
        content
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_content() {
        let (dispatcher, _) = fixture().await;
        let frame = dispatcher
            .dispatch(request("call-1", "definitely_not_a_tool", json!({})))
            .await;
        let content = response_content(frame, "call-1");
        assert_eq!(content, json!({ "error": "Unknown tool" }));
    }

    #[tokio::test]
    async fn search_returns_matching_doctors() {
        let (dispatcher, _) = fixture().await;
        let frame = dispatcher
            .dispatch(request(
                "call-2",
                "search_doctor_by_name",
                json!({ "name": "alice" }),
            ))
            .await;
        let content = response_content(frame, "call-2");
        assert_eq!(content["doctors"].as_array().unwrap().len(), 1);
        assert_eq!(content["doctors"][0]["name"], "Dr. Alice Johnson");

        // No match is an empty list, not an error.
        let frame = dispatcher
            .dispatch(request(
                "call-3",
                "search_doctor_by_name",
                json!({ "name": "cardiology" }),
            ))
            .await;
        let content = response_content(frame, "call-3");
        assert_eq!(content["doctors"], json!([]));
    }

    #[tokio::test]
    async fn availability_reports_schedule_or_day_off() {
        let (dispatcher, doctor_id) = fixture().await;

        let frame = dispatcher
            .dispatch(request(
                "call-4",
                "get_doctor_availability",
                json!({ "doctor_id": doctor_id, "date": "2025-04-07" }),
            ))
            .await;
        let content = response_content(frame, "call-4");
        assert_eq!(content["available_slots"][0]["start_time"], "09:00:00");

        // 2025-04-08 is a Tuesday, which this doctor does not work.
        let frame = dispatcher
            .dispatch(request(
                "call-5",
                "get_doctor_availability",
                json!({ "doctor_id": doctor_id, "date": "2025-04-08" }),
            ))
            .await;
        let content = response_content(frame, "call-5");
        assert_eq!(
            content,
            json!({ "error": "Doctor is not available on this day (day 1)" })
        );
    }

    #[tokio::test]
    async fn booking_succeeds_then_conflicts_with_distinct_messages() {
        let (dispatcher, doctor_id) = fixture().await;
        let book = |id: &str, start: &str, end: &str| {
            request(
                id,
                "book_appointment",
                json!({
                    "doctor_id": doctor_id,
                    "patient_email": "john@example.com",
                    "appointment_date": "2025-04-07",
                    "start_time": start,
                    "end_time": end,
                }),
            )
        };

        let content =
            response_content(dispatcher.dispatch(book("call-6", "09:00:00", "09:30:00")).await, "call-6");
        assert_eq!(content["status"], "success");
        assert_eq!(content["appointment"]["status"], "confirmed");

        let content =
            response_content(dispatcher.dispatch(book("call-7", "09:15:00", "09:45:00")).await, "call-7");
        assert_eq!(content, json!({ "error": "This time slot is already booked" }));

        let content =
            response_content(dispatcher.dispatch(book("call-8", "18:00:00", "18:30:00")).await, "call-8");
        assert_eq!(
            content,
            json!({ "error": "Doctor is not available during this time slot" })
        );

        let unknown_doctor = request(
            "call-9",
            "book_appointment",
            json!({
                "doctor_id": Uuid::new_v4(),
                "patient_email": "john@example.com",
                "appointment_date": "2025-04-07",
                "start_time": "09:30:00",
                "end_time": "10:00:00",
            }),
        );
        let content = response_content(dispatcher.dispatch(unknown_doctor).await, "call-9");
        assert_eq!(content, json!({ "error": "Doctor not found" }));
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported_not_propagated() {
        let (dispatcher, _) = fixture().await;

        let frame = dispatcher
            .dispatch(request("call-10", "search_doctor_by_name", json!({})))
            .await;
        let content = response_content(frame, "call-10");
        let message = content["error"].as_str().unwrap();
        assert!(message.starts_with("Invalid arguments for tool 'search_doctor_by_name'"));

        // An inverted booking window is caught at argument parsing.
        let (dispatcher, doctor_id) = fixture().await;
        let frame = dispatcher
            .dispatch(request(
                "call-11",
                "book_appointment",
                json!({
                    "doctor_id": doctor_id,
                    "patient_email": "john@example.com",
                    "appointment_date": "2025-04-07",
                    "start_time": "10:00:00",
                    "end_time": "09:00:00",
                }),
            ))
            .await;
        let content = response_content(frame, "call-11");
        assert!(
            content["error"]
                .as_str()
                .unwrap()
                .contains("end_time must be after start_time")
        );
    }

    #[test]
    fn catalog_covers_all_registered_tools() {
        let catalog = tool_catalog();
        let names: Vec<&str> = catalog.iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "search_doctor_by_name",
                "get_doctor_availability",
                "book_appointment"
            ]
        );
        assert!(catalog.iter().all(|t| t.kind == "function"));
        assert!(
            catalog
                .iter()
                .all(|t| t.parameters["type"] == "object" && t.parameters["required"].is_array())
        );
    }
}
