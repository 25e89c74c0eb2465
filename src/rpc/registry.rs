//! Procedure registry.
//!
//! # Responsibilities
//! - Map procedure names to uniform callables
//! - Decode inputs and encode outputs once, at the boundary
//!
//! # Design Decisions
//! - Typed registration erases `I`/`O` into `Value -> Result<Value, _>`
//! - Read-only after startup; shared through `Arc`
//! - Duplicate names are a configuration error

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::EdgeError;
use crate::observability::metrics;

/// Failure returned by a procedure body. The message is shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProcedureError(pub String);

impl ProcedureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

type Callable = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, EdgeError>> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    procedures: HashMap<String, Callable>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`. Input `I` is decoded from the call's JSON
    /// input (absent input is `null`, which decodes to `()`).
    pub fn register<I, O, F, Fut>(&mut self, name: &str, f: F) -> Result<(), EdgeError>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ProcedureError>> + Send + 'static,
    {
        if self.procedures.contains_key(name) {
            return Err(EdgeError::Configuration(format!(
                "procedure {name:?} registered twice"
            )));
        }

        let procedure = name.to_string();
        let f = Arc::new(f);
        let callable: Callable = Arc::new(move |input: Value| -> BoxFuture<'static, Result<Value, EdgeError>> {
            let f = Arc::clone(&f);
            let procedure = procedure.clone();
            Box::pin(async move {
                let input: I =
                    serde_json::from_value(input).map_err(|e| EdgeError::InvalidInput {
                        procedure: procedure.clone(),
                        reason: e.to_string(),
                    })?;
                let output = f(input).await.map_err(|e| EdgeError::ProcedureFailure {
                    procedure: procedure.clone(),
                    message: e.0,
                })?;
                serde_json::to_value(output).map_err(|e| {
                    EdgeError::HandlerFault(format!("{procedure}: unencodable result: {e}"))
                })
            })
        });

        self.procedures.insert(name.to_string(), callable);
        tracing::debug!(procedure = name, "Procedure registered");
        Ok(())
    }

    /// Run `name` with `input`. Unknown names execute nothing.
    pub async fn dispatch(&self, name: &str, input: Value) -> Result<Value, EdgeError> {
        let Some(callable) = self.procedures.get(name) else {
            metrics::record_rpc_call("<unknown>", "method_not_found");
            return Err(EdgeError::UnknownProcedure(name.to_string()));
        };

        let result = callable(input).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        metrics::record_rpc_call(name, outcome);
        result
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.procedures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn typed_registration_round_trip() {
        let mut registry = Registry::new();
        registry
            .register("len", |s: String| async move { Ok::<_, ProcedureError>(s.len()) })
            .unwrap();

        assert_eq!(registry.dispatch("len", json!("four")).await.unwrap(), json!(4));
    }

    #[tokio::test]
    async fn duplicate_names_rejected() {
        let mut registry = Registry::new();
        registry
            .register("a", |(): ()| async { Ok::<_, ProcedureError>(1) })
            .unwrap();
        let err = registry
            .register("a", |(): ()| async { Ok::<_, ProcedureError>(2) })
            .unwrap_err();
        assert!(matches!(err, EdgeError::Configuration(_)));
    }

    #[tokio::test]
    async fn unknown_procedure_runs_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        let counter = Arc::clone(&calls);
        registry
            .register("count", move |(): ()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProcedureError>(()) }
            })
            .unwrap();

        let err = registry.dispatch("missing", Value::Null).await.unwrap_err();
        assert!(matches!(err, EdgeError::UnknownProcedure(ref n) if n == "missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_input_is_invalid() {
        let mut registry = Registry::new();
        registry
            .register("echo", |s: String| async move { Ok::<_, ProcedureError>(s) })
            .unwrap();

        let err = registry.dispatch("echo", json!({"not": "a string"})).await.unwrap_err();
        assert!(matches!(err, EdgeError::InvalidInput { .. }));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn procedure_errors_keep_their_message() {
        let mut registry = Registry::new();
        registry
            .register("fail", |(): ()| async {
                Err::<(), _>(ProcedureError::new("quota exceeded"))
            })
            .unwrap();

        let err = registry.dispatch("fail", Value::Null).await.unwrap_err();
        assert_eq!(err.public_message(), "quota exceeded");
    }
}
