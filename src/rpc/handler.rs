//! Request/response RPC over plain HTTP.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use super::RpcState;
use crate::error::EdgeError;

#[derive(Debug, Serialize)]
pub struct CallResult {
    pub result: Value,
}

/// `GET|POST /rpc/{procedure}`. The JSON body is the input; an empty body means none.
pub async fn call(
    State(state): State<RpcState>,
    Path(procedure): Path<String>,
    body: Body,
) -> Result<Json<CallResult>, EdgeError> {
    if !state.registry.contains(&procedure) {
        return Err(EdgeError::UnknownProcedure(procedure));
    }

    let bytes = axum::body::to_bytes(body, state.config.max_body_bytes)
        .await
        .map_err(|e| EdgeError::InvalidInput {
            procedure: procedure.clone(),
            reason: format!("unreadable body: {e}"),
        })?;

    let input = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).map_err(|e| EdgeError::InvalidInput {
            procedure: procedure.clone(),
            reason: e.to_string(),
        })?
    };

    let result = state.registry.dispatch(&procedure, input).await?;
    Ok(Json(CallResult { result }))
}
