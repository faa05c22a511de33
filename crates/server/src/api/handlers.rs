//! Status and order handlers for the reception.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use plazza_core::{Command, CommandId, Config, Ticket, TicketId};

use crate::metrics::encode_metrics;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Only tickets of this command
    pub command: Option<String>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: usize,
}

/// Request body for taking an order
#[derive(Debug, Deserialize)]
pub struct TakeOrderBody {
    /// Order line, e.g. `regina XXL x2; fantasia M x3`
    pub order: String,
}

/// A command as shown to API clients
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub id: CommandId,
    pub pizzas: Vec<String>,
}

impl From<Command> for CommandResponse {
    fn from(command: Command) -> Self {
        Self {
            id: command.id(),
            pizzas: command.pizzas().iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct KitchensResponse {
    pub connected: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// Snapshot of the reception's board
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let board = state.reception().board();
    let tickets = match params.command {
        Some(raw) => {
            let command_id: CommandId = raw.parse().map_err(|_| {
                error_response(StatusCode::BAD_REQUEST, format!("Invalid command id: {}", raw))
            })?;
            board.get_tickets_of(command_id)
        }
        None => board.get_tickets(),
    };

    Ok(Json(ListTicketsResponse {
        total: tickets.len(),
        tickets,
    }))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, (StatusCode, Json<ErrorResponse>)> {
    let ticket_id: TicketId = id.parse().map_err(|_| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid ticket id: {}", id))
    })?;

    state
        .reception()
        .board()
        .get_ticket(ticket_id)
        .map(Json)
        .ok_or_else(|| {
            error_response(StatusCode::NOT_FOUND, format!("Ticket not found: {}", id))
        })
}

pub async fn take_order(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TakeOrderBody>,
) -> Result<(StatusCode, Json<CommandResponse>), (StatusCode, Json<ErrorResponse>)> {
    state
        .reception()
        .take_order(&body.order)
        .map(|command| (StatusCode::CREATED, Json(command.into())))
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))
}

/// Commands still being cooked
pub async fn list_orders(State(state): State<Arc<AppState>>) -> Json<Vec<CommandResponse>> {
    Json(
        state
            .reception()
            .pending_commands()
            .into_iter()
            .map(CommandResponse::from)
            .collect(),
    )
}

pub async fn list_kitchens(State(state): State<Arc<AppState>>) -> Json<KitchensResponse> {
    Json(KitchensResponse {
        connected: state.reception().kitchen_count(),
    })
}

/// Prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
