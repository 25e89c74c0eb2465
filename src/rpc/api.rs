//! Procedures exposed by the edge server.

use chrono::{DateTime, Utc};

use super::registry::{ProcedureError, Registry};
use crate::error::EdgeError;

async fn hello(_: ()) -> Result<String, ProcedureError> {
    Ok("Hello there!".to_string())
}

async fn echo(message: String) -> Result<String, ProcedureError> {
    Ok(message)
}

async fn date(_: ()) -> Result<DateTime<Utc>, ProcedureError> {
    Ok(Utc::now())
}

/// The built-in registry.
pub fn registry() -> Result<Registry, EdgeError> {
    let mut registry = Registry::new();
    registry.register("hello", hello)?;
    registry.register("echo", echo)?;
    registry.register("date", date)?;
    Ok(registry)
}
