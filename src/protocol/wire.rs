//! Gateway ⇄ persistence adapter wire messages.
//!
//! Request: the client's mapping with a leading `"route"` key,
//! e.g. `{"route":"sum","a":2,"b":3}`.
//! Response: `{"status":"success","body":…}` or
//! `{"status":"failure","error":{"kind":…,"message":…}}`.

use serde::{Deserialize, Serialize};

use crate::payload::{Mapping, Payload};
use crate::protocol::error::ErrorDetail;
use crate::routing::Route;

/// Reserved key carrying the route name.
pub const ROUTE_KEY: &str = "route";

/// Adapter endpoint path.
pub const EXECUTE_PATH: &str = "/v1/execute";

/// A normalized request tagged with its route.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterRequest {
    pub route: Route,
    pub payload: Mapping,
}

impl AdapterRequest {
    /// Build a request from a client payload.
    ///
    /// The payload must be a mapping and must not use the reserved route key.
    pub fn new(route: Route, payload: Payload) -> Result<Self, ErrorDetail> {
        let payload = payload.into_mapping().map_err(|other| {
            ErrorDetail::validation(format!(
                "payload must be a mapping, found {}",
                other.type_name()
            ))
        })?;
        if payload.contains_key(ROUTE_KEY) {
            return Err(ErrorDetail::validation(format!(
                "payload must not contain the reserved key `{}`",
                ROUTE_KEY
            )));
        }
        Ok(Self { route, payload })
    }

    pub fn to_wire(&self) -> Payload {
        let mut wire = Mapping::new();
        wire.insert(ROUTE_KEY, self.route.name());
        for (k, v) in self.payload.iter() {
            wire.insert(k.clone(), v.clone());
        }
        Payload::Mapping(wire)
    }

    pub fn from_wire(wire: Payload) -> Result<Self, ErrorDetail> {
        let mut mapping = wire
            .into_mapping()
            .map_err(|_| ErrorDetail::validation("request must be a mapping"))?;
        let route = match mapping.remove(ROUTE_KEY) {
            Some(Payload::String(name)) => name
                .parse::<Route>()
                .map_err(|e| ErrorDetail::not_found(e.to_string()))?,
            Some(other) => {
                return Err(ErrorDetail::validation(format!(
                    "`{}` must be a string, found {}",
                    ROUTE_KEY,
                    other.type_name()
                )))
            }
            None => {
                return Err(ErrorDetail::validation(format!(
                    "missing `{}` key",
                    ROUTE_KEY
                )))
            }
        };
        Ok(Self {
            route,
            payload: mapping,
        })
    }
}

/// Outcome of one adapter execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AdapterResult {
    Success { body: Payload },
    Failure { error: ErrorDetail },
}

impl AdapterResult {
    pub fn success(body: impl Into<Payload>) -> Self {
        AdapterResult::Success { body: body.into() }
    }

    pub fn failure(error: ErrorDetail) -> Self {
        AdapterResult::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AdapterResult::Success { .. })
    }
}

impl From<Result<Payload, ErrorDetail>> for AdapterResult {
    fn from(r: Result<Payload, ErrorDetail>) -> Self {
        match r {
            Ok(body) => AdapterResult::Success { body },
            Err(error) => AdapterResult::Failure { error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{parse, serialize, Format};
    use crate::protocol::error::ErrorKind;

    #[test]
    fn test_wire_shape_matches_sum_scenario() {
        let payload = parse(br#"{"a": 2, "b": 3}"#, Format::Json).unwrap();
        let req = AdapterRequest::new(Route::Sum, payload).unwrap();
        let bytes = serialize(&req.to_wire(), Format::Json).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"route":"sum","a":2,"b":3}"#);
    }

    #[test]
    fn test_wire_request_round_trip() {
        let payload = parse(b"a: 2\nb: 3\n", Format::Yaml).unwrap();
        let req = AdapterRequest::new(Route::Sum, payload).unwrap();
        let back = AdapterRequest::from_wire(req.to_wire()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_non_mapping_payload_rejected() {
        let err = AdapterRequest::new(Route::Sum, Payload::Sequence(vec![])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_reserved_key_rejected() {
        let payload = parse(br#"{"route": "x", "a": 1}"#, Format::Json).unwrap();
        let err = AdapterRequest::new(Route::Sum, payload).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_from_wire_unknown_route() {
        let wire = parse(br#"{"route": "nope"}"#, Format::Json).unwrap();
        let err = AdapterRequest::from_wire(wire).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_result_wire_format() {
        let ok: AdapterResult =
            serde_json::from_str(r#"{"status":"success","body":{"result":5}}"#).unwrap();
        let mut expected = Mapping::new();
        expected.insert("result", 5i64);
        assert_eq!(ok, AdapterResult::success(expected));

        let failure = AdapterResult::failure(ErrorDetail::backend_unavailable("db down"));
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "failure",
                "error": {"kind": "backendUnavailable", "message": "db down"}
            })
        );
    }
}
