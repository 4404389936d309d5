//! Volume plugin wire types.
//!
//! Request and response bodies exchanged with the container runtime over the
//! plugin socket. Field names follow the runtime's PascalCase JSON
//! convention. Missing request fields decode to their defaults, since the
//! runtime sends empty bodies for parameterless calls.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::plugin;

/// `/Plugin.Activate` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

impl Default for ActivateResponse {
    fn default() -> Self {
        Self {
            implements: vec![plugin::IMPLEMENTS.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateRequest {
    pub name: String,
    #[serde(rename = "Opts")]
    pub options: Option<HashMap<String, String>>,
}

/// Request carrying only a volume name (get, path, remove).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NameRequest {
    pub name: String,
}

/// Request carrying a volume name and a mount reference id (mount, unmount).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountRequest {
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
}

/// A volume as reported to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    pub mountpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    pub volume: Volume,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<Volume>,
}

/// Response for mount and path calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountpointResponse {
    pub mountpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capability {
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capability,
}

/// Empty success body (create, unmount, remove).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Failure body. The runtime surfaces `Err` verbatim to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

impl ErrorResponse {
    pub fn new(err: impl ToString) -> Self {
        Self {
            err: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_with_options() {
        let req: CreateRequest =
            serde_json::from_str(r#"{"Name":"data","Opts":{"fs":"xfs"}}"#).unwrap();
        assert_eq!(req.name, "data");
        assert_eq!(
            req.options.unwrap().get("fs").map(String::as_str),
            Some("xfs")
        );
    }

    #[test]
    fn test_create_request_null_options() {
        let req: CreateRequest = serde_json::from_str(r#"{"Name":"data","Opts":null}"#).unwrap();
        assert!(req.options.is_none());
    }

    #[test]
    fn test_mount_request_id_field() {
        let req: MountRequest =
            serde_json::from_str(r#"{"Name":"data","ID":"c0ffee"}"#).unwrap();
        assert_eq!(req.id, "c0ffee");
    }

    #[test]
    fn test_missing_fields_default() {
        let req: NameRequest = serde_json::from_str("{}").unwrap();
        assert!(req.name.is_empty());
    }

    #[test]
    fn test_response_field_names() {
        let json = serde_json::to_value(GetResponse {
            volume: Volume {
                name: "data".into(),
                mountpoint: "/mnt/data".into(),
            },
        })
        .unwrap();
        assert_eq!(json["Volume"]["Mountpoint"], "/mnt/data");

        let json = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "Err": "boom" }));

        let json = serde_json::to_value(ActivateResponse::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "Implements": ["VolumeDriver"] }));
    }
}
