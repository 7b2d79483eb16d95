//! Per-session supervision of the websocket proxy.
//!
//! Each connected client gets one supervisor that walks the session through
//! `Connecting -> Configuring -> Active -> Closing -> Closed`. The
//! supervisor owns both sockets: it establishes the upstream connection,
//! sends the one-time configuration frame, runs the bridge, and finally
//! closes both sides with a code and reason describing what ended the
//! session.

use crate::state::AppState;
use crate::ws::bridge::{self, SessionEnd, UpstreamStream};
use crate::ws::protocol::{OutboundFrame, SessionConfig, SessionSetup};
use crate::ws::tools::{ToolDispatcher, tool_catalog};
use anyhow::{Context, Result};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, close_code},
    },
    response::Response,
};
use axum::extract::WebSocketUpgrade;
use futures_util::{SinkExt, StreamExt};
use hakim_core::{appointment::Appointment, schedule::Doctor, store::AppointmentFilter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest},
};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Lifecycle states of one proxied session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Configuring,
    Active,
    Closing,
    Closed,
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new client connection. Performs the configuration
/// handshake and then spawns the supervised session.
#[instrument(name = "voice_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New client connection. Awaiting session configuration...");

    let (client_tx, mut client_rx) = socket.split();
    let client_tx = Arc::new(Mutex::new(client_tx));

    // The first client frame configures the session (model and prompt
    // overrides). Everything after it is relayed untouched.
    let setup = loop {
        match client_rx.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<SessionSetup>(&text) {
                Ok(setup) => break setup,
                Err(e) => {
                    warn!(error = %e, "Rejected malformed session configuration");
                    bridge::close_client(
                        &client_tx,
                        close_code::PROTOCOL,
                        format!("Invalid session configuration: {e}"),
                    )
                    .await;
                    return;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                info!("Client disconnected before configuring the session.");
                return;
            }
            Some(Ok(_)) => {
                bridge::close_client(
                    &client_tx,
                    close_code::PROTOCOL,
                    "First frame must be a text configuration message".to_string(),
                )
                .await;
                return;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Client connection failed during handshake");
                return;
            }
        }
    };

    let session_span = tracing::info_span!("session_runtime", %session_id);
    tokio::spawn(
        async move {
            run_session(state, client_tx, client_rx, setup).await;
        }
        .instrument(session_span),
    );
}

/// Drives one session through its lifecycle phases.
async fn run_session(
    state: Arc<AppState>,
    client_tx: Arc<Mutex<bridge::ClientSink>>,
    client_rx: futures_util::stream::SplitStream<WebSocket>,
    setup: SessionSetup,
) {
    let model = setup
        .model
        .clone()
        .unwrap_or_else(|| state.config.realtime_model.clone());

    info!(phase = ?Phase::Connecting, %model, "Connecting to the realtime API");
    let upstream = match connect_upstream(&state, &model).await {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(error = ?e, "Upstream connection failed");
            bridge::close_client(
                &client_tx,
                close_code::ERROR,
                format!("Connection error: {e:#}"),
            )
            .await;
            info!(phase = ?Phase::Closed, "Session closed before activation");
            return;
        }
    };
    let (upstream_tx, upstream_rx) = upstream.split();
    let upstream_tx = Arc::new(Mutex::new(upstream_tx));

    info!(phase = ?Phase::Configuring, "Sending session configuration upstream");
    if let Err(e) = configure_session(&state, &setup, &upstream_tx).await {
        error!(error = ?e, "Session configuration failed");
        info!(phase = ?Phase::Closing, "Tearing the session down");
        bridge::close_client(
            &client_tx,
            close_code::ERROR,
            format!("Connection error: {e:#}"),
        )
        .await;
        bridge::close_upstream(&upstream_tx).await;
        info!(phase = ?Phase::Closed, "Session closed");
        return;
    }

    info!(phase = ?Phase::Active, "Session is live");
    let dispatcher = Arc::new(ToolDispatcher::new(
        state.store.clone(),
        state.resolver.clone(),
    ));
    let end = bridge::run(
        client_rx,
        client_tx.clone(),
        upstream_rx,
        upstream_tx.clone(),
        dispatcher,
    )
    .await;

    info!(phase = ?Phase::Closing, cause = ?end, "Session terminating");
    match &end {
        SessionEnd::Protocol(detail) => error!(%detail, "Session ended on a protocol error"),
        SessionEnd::UpstreamTransport(e) => warn!(error = %e, "Upstream transport failed"),
        SessionEnd::ClientTransport(e) => warn!(error = %e, "Client transport failed"),
        _ => {}
    }
    if !end.client_gone() {
        bridge::close_client(&client_tx, end.close_code(), end.reason()).await;
    }
    bridge::close_upstream(&upstream_tx).await;
    info!(phase = ?Phase::Closed, "Session closed");
}

/// Opens the upstream websocket with the realtime auth headers.
async fn connect_upstream(state: &Arc<AppState>, model: &str) -> Result<UpstreamStream> {
    let url = format!("{}?model={}", state.config.realtime_ws_url, model);
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", state.config.openai_api_key).parse()?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse()?);

    let (ws_stream, _) = connect_async(request)
        .await
        .context("Failed to connect to the realtime API")?;
    info!("Connected to the realtime API");
    Ok(ws_stream)
}

/// Builds the instructions from the live store and sends the one-time
/// `session.update` frame declaring them along with the tool catalog.
async fn configure_session(
    state: &Arc<AppState>,
    setup: &SessionSetup,
    upstream_tx: &Arc<Mutex<bridge::UpstreamSink>>,
) -> Result<()> {
    let doctors = state.store.list_doctors().await?;
    let appointments = state
        .store
        .list_appointments(AppointmentFilter::default())
        .await?;
    let base_prompt = setup
        .system_prompt
        .as_deref()
        .unwrap_or(state.system_prompt.as_str());
    let instructions = render_instructions(base_prompt, &doctors, &appointments)?;

    let frame = OutboundFrame::SessionUpdate {
        session: SessionConfig {
            instructions,
            tools: tool_catalog(),
            tool_choice: "auto".to_string(),
        },
    };
    let json = serde_json::to_string(&frame)?;
    upstream_tx
        .lock()
        .await
        .send(tungstenite::Message::Text(json.into()))
        .await
        .context("Failed to send the session configuration frame")?;
    Ok(())
}

/// Appends the current doctor roster and the still-active bookings to the
/// base prompt so the model starts from live data instead of a frozen
/// snapshot.
fn render_instructions(
    base_prompt: &str,
    doctors: &[Doctor],
    appointments: &[Appointment],
) -> Result<String> {
    let active: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.status.is_active())
        .collect();
    let roster = serde_json::to_string_pretty(doctors)?;
    let booked = serde_json::to_string_pretty(&active)?;
    Ok(format!(
        "{base_prompt}\n\n### Doctor roster\n{roster}\n\n### Booked appointments\n{booked}\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use hakim_core::appointment::{AppointmentStatus, PatientContact};
    use hakim_core::schedule::{Specialization, TimeSlot};

    #[test]
    fn setup_frame_tolerates_missing_fields() {
        let setup: SessionSetup = serde_json::from_str("{}").unwrap();
        assert!(setup.model.is_none());
        assert!(setup.system_prompt.is_none());

        let setup: SessionSetup =
            serde_json::from_str(r#"{"model":"gpt-4o-realtime-preview-2024-10-01"}"#).unwrap();
        assert_eq!(
            setup.model.as_deref(),
            Some("gpt-4o-realtime-preview-2024-10-01")
        );
    }

    #[test]
    fn instructions_carry_live_roster_and_skip_released_bookings() {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Alice Johnson".to_string(),
            specialization: Specialization::GeneralDentist,
            availability: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let slot = TimeSlot::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        )
        .unwrap();
        let confirmed = Appointment {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            patient: PatientContact {
                name: None,
                email: "john@example.com".to_string(),
                phone: None,
            },
            date: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
            slot,
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut cancelled = confirmed.clone();
        cancelled.id = Uuid::new_v4();
        cancelled.status = AppointmentStatus::Cancelled;
        cancelled.patient.email = "jane@example.com".to_string();

        let instructions = render_instructions(
            "You help patients book appointments.",
            &[doctor],
            &[confirmed, cancelled],
        )
        .unwrap();

        assert!(instructions.starts_with("You help patients book appointments."));
        assert!(instructions.contains("Dr. Alice Johnson"));
        assert!(instructions.contains("john@example.com"));
        // Cancelled bookings no longer hold their slot.
        assert!(!instructions.contains("jane@example.com"));
    }
}
