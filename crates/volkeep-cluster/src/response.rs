//! Parsing of cluster REST responses.
//!
//! Every response is a JSON envelope:
//!
//! ```json
//! {"status": "OK", "data": [...]}
//! {"status": "ERROR", "errors": [{"desc": "..."}]}
//! ```

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use volkeep_core::{AccessPolicy, VolumeInstance};

use crate::error::{ClusterError, Result};

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    desc: Option<String>,
}

/// Parse an envelope, returning its `data` member on `status: OK`.
///
/// # Errors
///
/// Returns `ClusterError::Api` for an error status and `ClusterError::Parse`
/// for bodies that are not an envelope.
pub fn parse_envelope(call: &str, body: &str) -> Result<Option<Value>> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ClusterError::Parse(format!("{call}: {e}")))?;

    if envelope.status == "OK" {
        return Ok(envelope.data);
    }

    let descriptions: Vec<String> = envelope
        .errors
        .into_iter()
        .filter_map(|entry| entry.desc)
        .collect();
    let message = if descriptions.is_empty() {
        format!("status {}", envelope.status)
    } else {
        descriptions.join("; ")
    };
    Err(ClusterError::Api {
        call: call.to_string(),
        message,
    })
}

/// Parse a volume list response into observed volumes.
///
/// Entries without a string `volumename` and `mountdir` are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if the envelope is invalid or `data` is not an array.
pub fn parse_volume_list(body: &str) -> Result<Vec<VolumeInstance>> {
    let data = parse_envelope("volume list", body)?;
    let Some(Value::Array(entries)) = data else {
        return Err(ClusterError::Parse(
            "volume list: data is not an array".to_string(),
        ));
    };

    let volumes = entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("volumename").and_then(Value::as_str);
            let mount = entry.get("mountdir").and_then(Value::as_str);
            match (name, mount) {
                (Some(name), Some(mount)) => Some(VolumeInstance::observed(name, mount)),
                _ => {
                    warn!(entry = %entry, "Skipping malformed volume list entry");
                    None
                }
            }
        })
        .collect();

    Ok(volumes)
}

/// Parse a volume info response into the volume's access policy.
///
/// A volume that never had expressions applied answers without a complete
/// `volumeAces` member; that is reported as `None`.
///
/// # Errors
///
/// Returns an error if the envelope is invalid or reports an error status.
pub fn parse_access_policy(body: &str) -> Result<Option<AccessPolicy>> {
    let data = parse_envelope("volume info", body)?;
    let Some(aces) = data
        .as_ref()
        .and_then(|d| d.get(0))
        .and_then(|v| v.get("volumeAces"))
    else {
        debug!("Volume info carries no volumeAces");
        return Ok(None);
    };

    let read = aces.get("readAce").and_then(Value::as_str);
    let write = aces.get("writeAce").and_then(Value::as_str);
    match (read, write) {
        (Some(read), Some(write)) => Ok(Some(AccessPolicy::new(read, write))),
        _ => {
            warn!(aces = %aces, "Ignoring incomplete volumeAces");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope() {
        let data = parse_envelope("x", r#"{"status":"OK","data":[1]}"#).unwrap();
        assert_eq!(data, Some(serde_json::json!([1])));
        assert_eq!(parse_envelope("x", r#"{"status":"OK"}"#).unwrap(), None);
    }

    #[test]
    fn error_envelope_joins_descriptions() {
        let err = parse_envelope(
            "volume create",
            r#"{"status":"ERROR","errors":[{"id":10003,"desc":"Volume exists"},{"desc":"again"}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ClusterError::Api {
                call: "volume create".into(),
                message: "Volume exists; again".into(),
            }
        );
        assert!(!err.requires_failover());
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_envelope("x", "<html>").unwrap_err();
        assert!(matches!(err, ClusterError::Parse(_)));
        assert!(err.requires_failover());
    }

    #[test]
    fn volume_list_skips_malformed_entries() {
        let volumes = parse_volume_list(
            r#"{"status":"OK","total":3,"data":[
                {"volumename":"logs_20240101","mountdir":"/logs/20240101"},
                {"volumename":"orphan"},
                {"volumename":"mapr.cluster.root","mountdir":"/"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].name, "logs_20240101");
        assert_eq!(volumes[0].mount_path, "/logs/20240101");
        assert_eq!(volumes[1].name, "mapr.cluster.root");
    }

    #[test]
    fn volume_list_requires_array() {
        let err = parse_volume_list(r#"{"status":"OK","data":{}}"#).unwrap_err();
        assert!(matches!(err, ClusterError::Parse(_)));
    }

    #[test]
    fn access_policy_from_info() {
        let policy = parse_access_policy(
            r#"{"status":"OK","data":[{"volumename":"v","volumeAces":{"readAce":"u:a","writeAce":"u:a | g:b"}}]}"#,
        )
        .unwrap();
        assert_eq!(policy, Some(AccessPolicy::new("u:a", "u:a | g:b")));
    }

    #[test]
    fn volume_without_aces_has_no_policy() {
        for body in [
            r#"{"status":"OK","data":[{"volumename":"logs_20240105"}]}"#,
            r#"{"status":"OK","data":[{"volumename":"v","volumeAces":{"readAce":"p"}}]}"#,
            r#"{"status":"OK","data":[]}"#,
            r#"{"status":"OK"}"#,
        ] {
            assert_eq!(parse_access_policy(body).unwrap(), None, "{body}");
        }
    }

    #[test]
    fn access_policy_errors_keep_their_class() {
        let err = parse_access_policy(r#"{"status":"ERROR","errors":[{"desc":"No such volume"}]}"#)
            .unwrap_err();
        assert!(!err.requires_failover());

        let err = parse_access_policy("<html>").unwrap_err();
        assert!(err.requires_failover());
    }
}
