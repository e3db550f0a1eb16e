use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the health payload, including the number of active rooms.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.rooms().len())
}
