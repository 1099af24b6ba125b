use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("transport error: {reason}")]
    Transport { reason: String },
    #[error("conduit error {code}: {message}")]
    Protocol { code: String, message: String },
    #[error("malformed {method} response: {reason}")]
    Malformed { method: String, reason: String },
}

/// A Conduit endpoint. `perform` sends one API call and returns the parsed
/// response document, including its `result` envelope.
pub trait ConduitTransport {
    fn perform(&self, method: &str, params: Value) -> Result<Value, ConduitError>;
}

impl<F> ConduitTransport for F
where
    F: Fn(&str, Value) -> Result<Value, ConduitError>,
{
    fn perform(&self, method: &str, params: Value) -> Result<Value, ConduitError> {
        self(method, params)
    }
}

pub(crate) fn map_malformed<E: std::fmt::Display>(
    method: &'static str,
) -> impl FnOnce(E) -> ConduitError {
    move |err| ConduitError::Malformed {
        method: method.to_string(),
        reason: err.to_string(),
    }
}
