//! Wire protocol: one newline-terminated JSON request per connection,
//! answered by one newline-terminated JSON response.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Complete,
    Containers,
    Ports,
    Labels,
    FieldValues,
    Status,
    Refresh,
    Watch,
    StopWatch,
    RecordRecent,
    GetRecent,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub request_type: RequestType,

    /// Empty means the current endpoint.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
    /// Empty means "all namespaces" for namespace-scoped resources.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,

    /// containers / ports requests.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_name: String,

    /// field_values requests.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_name: String,

    /// watch / stop_watch requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<String>,

    /// record_recent requests.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_name: String,
}

impl Request {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            request_type,
            context: String::new(),
            namespace: String::new(),
            resource_type: String::new(),
            pod_name: String::new(),
            field_name: String::new(),
            resource_types: Vec::new(),
            resource_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusInfo>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            output: None,
            status: None,
        }
    }

    pub fn with_output(output: String) -> Self {
        Self {
            success: true,
            error: None,
            output: Some(output),
            status: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            output: None,
            status: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub uptime: String,
    pub resource_count: usize,
    pub watched_resources: HashMap<String, Vec<String>>,
    pub resource_stats: HashMap<String, HashMap<String, usize>>,
}

pub fn decode_request(data: &[u8]) -> serde_json::Result<Request> {
    serde_json::from_slice(data)
}

pub fn encode_request(req: &Request) -> serde_json::Result<Vec<u8>> {
    let mut data = serde_json::to_vec(req)?;
    data.push(b'\n');
    Ok(data)
}

pub fn decode_response(data: &[u8]) -> serde_json::Result<Response> {
    serde_json::from_slice(data)
}

pub fn encode_response(resp: &Response) -> serde_json::Result<Vec<u8>> {
    let mut data = serde_json::to_vec(resp)?;
    data.push(b'\n');
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trip() {
        let mut req = Request::new(RequestType::Complete);
        req.context = "prod".to_string();
        req.namespace = "default".to_string();
        req.resource_type = "pods".to_string();

        let encoded = encode_request(&req).unwrap();
        assert_eq!(*encoded.last().unwrap(), b'\n');
        let decoded = decode_request(&encoded).unwrap();
        assert_eq!(decoded.request_type, RequestType::Complete);
        assert_eq!(decoded.context, "prod");
        assert_eq!(decoded.namespace, "default");
        assert_eq!(decoded.resource_type, "pods");
    }

    #[test]
    fn omitted_fields_default_to_empty() {
        let decoded = decode_request(br#"{"type":"status"}"#).unwrap();
        assert_eq!(decoded.request_type, RequestType::Status);
        assert!(decoded.context.is_empty());
        assert!(decoded.resource_types.is_empty());
    }

    #[test]
    fn unknown_type_decodes_to_unknown_variant() {
        let decoded = decode_request(br#"{"type":"frobnicate"}"#).unwrap();
        assert_eq!(decoded.request_type, RequestType::Unknown);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_request(b"not json\n").is_err());
    }

    #[test]
    fn response_round_trip() {
        let resp = Response::with_output("a\nb\n".to_string());
        let encoded = encode_response(&resp).unwrap();
        let decoded = decode_response(&encoded).unwrap();
        assert!(decoded.success);
        assert_eq!(decoded.output.as_deref(), Some("a\nb\n"));
        assert!(decoded.error.is_none());

        let failure = Response::failure("unknown resource type: foo");
        let decoded = decode_response(&encode_response(&failure).unwrap()).unwrap();
        assert!(!decoded.success);
        assert_eq!(decoded.error.as_deref(), Some("unknown resource type: foo"));
    }
}
