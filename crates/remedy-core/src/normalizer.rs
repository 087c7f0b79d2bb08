//! Incident normalizer
//!
//! Maps heterogeneous monitoring payloads onto [`Incident`]. Three payload
//! shapes are recognised, first match wins:
//!
//! 1. direct `kind` + `name`, where `name` may be `namespace/name`
//! 2. a nested `involvedObject` (Kubernetes event style)
//! 3. anything else: a best-effort incident against an unknown resource
//!
//! Only a payload that is not a map, or an identity field of the wrong type,
//! is an error.

use crate::severity::SeverityRules;
use remedy_model::{AffectedResource, Incident, RawEvent, DEFAULT_NAMESPACE};
use serde_json::{Map, Value};

const UNKNOWN: &str = "Unknown";
const NO_DESCRIPTION: &str = "No description available";

/// Raw event could not be turned into an incident
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    /// Payload is not a JSON object
    #[error("event payload is not a map (got {kind})")]
    NotAMap {
        /// JSON type that was received
        kind: &'static str,
        /// Original payload
        payload: Value,
    },

    /// A field used for identity has an unusable type
    #[error("event field '{field}' must be a string")]
    MalformedField {
        /// Offending field path
        field: String,
        /// Original payload
        payload: Value,
    },
}

impl NormalizationError {
    /// Payload that failed to normalize
    #[must_use]
    pub fn payload(&self) -> &Value {
        match self {
            Self::NotAMap { payload, .. } | Self::MalformedField { payload, .. } => payload,
        }
    }
}

/// Raw event to incident mapper
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    severity: SeverityRules,
}

impl Normalizer {
    /// Create normalizer with the default severity table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create normalizer with a custom severity table
    #[inline]
    #[must_use]
    pub fn with_severity_rules(severity: SeverityRules) -> Self {
        Self { severity }
    }

    /// Severity table in use
    #[inline]
    #[must_use]
    pub fn severity_rules(&self) -> &SeverityRules {
        &self.severity
    }

    /// Normalize a raw event into an open incident that owns the event
    ///
    /// # Errors
    /// [`NormalizationError`] when the payload is not a map or an identity
    /// field is not a string.
    pub fn normalize(&self, event: RawEvent) -> Result<Incident, NormalizationError> {
        let Some(map) = event.payload().as_object() else {
            return Err(NormalizationError::NotAMap {
                kind: json_type(event.payload()),
                payload: event.payload().clone(),
            });
        };

        let extracted = extract(map).map_err(|field| NormalizationError::MalformedField {
            field,
            payload: event.payload().clone(),
        })?;

        let severity = self.severity.classify(&extracted.failure_type);
        let incident = Incident::new(
            extracted.resource,
            extracted.failure_type,
            extracted.description,
            severity,
        )
        .with_event(event);

        tracing::debug!(
            incident_id = %incident.id,
            resource = %incident.affected_resource,
            failure_type = %incident.failure_type,
            severity = %incident.severity,
            "normalized event"
        );
        Ok(incident)
    }
}

struct Extracted {
    resource: AffectedResource,
    failure_type: String,
    description: String,
}

/// Pull identity and detail out of an event map; `Err` names a bad field
fn extract(map: &Map<String, Value>) -> Result<Extracted, String> {
    let failure_type = string_field(map, "reason", "reason")?.unwrap_or(UNKNOWN).to_string();
    let message = string_field(map, "message", "message")?;

    if map.contains_key("kind") && map.contains_key("name") {
        let kind = string_field(map, "kind", "kind")?.unwrap_or(UNKNOWN);
        let raw_name = string_field(map, "name", "name")?.unwrap_or(UNKNOWN);
        let (namespace, name) = match raw_name.split_once('/') {
            Some((ns, name)) => (ns.to_string(), name.to_string()),
            None => {
                let ns = string_field(map, "namespace", "namespace")?.unwrap_or(DEFAULT_NAMESPACE);
                (ns.to_string(), raw_name.to_string())
            }
        };
        let description = message
            .map(str::to_string)
            .or_else(|| first_error_text(map))
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        return Ok(Extracted {
            resource: AffectedResource::new(kind, name, namespace),
            failure_type,
            description,
        });
    }

    let description = message.unwrap_or(NO_DESCRIPTION).to_string();

    if let Some(Value::Object(involved)) = map.get("involvedObject") {
        let kind = string_field(involved, "kind", "involvedObject.kind")?.unwrap_or(UNKNOWN);
        let name = string_field(involved, "name", "involvedObject.name")?.unwrap_or(UNKNOWN);
        let namespace = string_field(involved, "namespace", "involvedObject.namespace")?
            .unwrap_or(DEFAULT_NAMESPACE);
        return Ok(Extracted {
            resource: AffectedResource::new(kind, name, namespace),
            failure_type,
            description,
        });
    }

    Ok(Extracted {
        resource: AffectedResource::unknown(),
        failure_type,
        description,
    })
}

/// String field; absent or null is `None`, any other type is an error
fn string_field<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a str>, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(path.to_string()),
    }
}

/// `Text` of the first record in an `error` list
fn first_error_text(map: &Map<String, Value>) -> Option<String> {
    map.get("error")?
        .as_array()?
        .first()?
        .get("Text")?
        .as_str()
        .map(str::to_string)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use remedy_model::{IncidentStatus, Severity};
    use serde_json::json;

    fn normalize(payload: Value) -> Incident {
        Normalizer::new().normalize(RawEvent::new(payload)).unwrap()
    }

    #[test]
    fn direct_kind_and_name_with_namespace() {
        let incident = normalize(json!({
            "kind": "Pod",
            "name": "prod/bad-pod",
            "reason": "CrashLoopBackOff",
            "message": "boom",
        }));
        assert_eq!(incident.affected_resource, AffectedResource::new("Pod", "bad-pod", "prod"));
        assert_eq!(incident.failure_type, "CrashLoopBackOff");
        assert_eq!(incident.description, "boom");
        assert_eq!(incident.severity, Severity::Critical);
        assert_eq!(incident.status(), IncidentStatus::Open);
        assert_eq!(incident.raw_events().len(), 1);
    }

    #[test]
    fn name_split_on_first_slash_only() {
        let incident = normalize(json!({"kind": "Pod", "name": "ns/a/b"}));
        assert_eq!(incident.affected_resource.namespace, "ns");
        assert_eq!(incident.affected_resource.name, "a/b");
    }

    #[test]
    fn namespace_field_or_default() {
        let incident = normalize(json!({"kind": "Pod", "name": "web"}));
        assert_eq!(incident.affected_resource.namespace, "default");

        let incident = normalize(json!({"kind": "Pod", "name": "web", "namespace": "staging"}));
        assert_eq!(incident.affected_resource.namespace, "staging");
    }

    #[test]
    fn description_falls_back_to_error_list() {
        let incident = normalize(json!({
            "kind": "Deployment",
            "name": "web",
            "error": [{"Text": "probe failed", "Code": 1}, {"Text": "second"}],
        }));
        assert_eq!(incident.description, "probe failed");
        assert_eq!(incident.failure_type, "Unknown");
    }

    #[test]
    fn involved_object_shape() {
        let incident = normalize(json!({
            "involvedObject": {"kind": "Pod", "name": "api-0", "namespace": "payments"},
            "reason": "Unhealthy",
            "message": "Readiness probe failed",
        }));
        assert_eq!(incident.affected_resource, AffectedResource::new("Pod", "api-0", "payments"));
        assert_eq!(incident.severity, Severity::Medium);

        let incident = normalize(json!({"involvedObject": {"kind": "Node"}}));
        assert_eq!(incident.affected_resource, AffectedResource::new("Node", "Unknown", "default"));
    }

    #[test]
    fn unrecognised_shape_is_best_effort() {
        let incident = normalize(json!({"alert": "disk full"}));
        assert_eq!(incident.affected_resource, AffectedResource::unknown());
        assert_eq!(incident.failure_type, "Unknown");
        assert_eq!(incident.description, NO_DESCRIPTION);
        assert_eq!(incident.severity, Severity::Low);
    }

    #[test]
    fn non_map_payload_is_rejected() {
        let err = Normalizer::new()
            .normalize(RawEvent::new(json!(["not", "a", "map"])))
            .unwrap_err();
        assert!(matches!(err, NormalizationError::NotAMap { kind: "array", .. }));
        assert_eq!(err.payload(), &json!(["not", "a", "map"]));
    }

    #[test]
    fn malformed_identity_field_is_rejected() {
        let err = Normalizer::new()
            .normalize(RawEvent::new(json!({"kind": "Pod", "name": 42})))
            .unwrap_err();
        assert_eq!(err.to_string(), "event field 'name' must be a string");

        let err = Normalizer::new()
            .normalize(RawEvent::new(json!({"involvedObject": {"namespace": ["x"]}})))
            .unwrap_err();
        assert!(matches!(err, NormalizationError::MalformedField { ref field, .. } if field == "involvedObject.namespace"));
    }
}
