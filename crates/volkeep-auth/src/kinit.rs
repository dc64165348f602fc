//! Keytab login through the system `kinit` command.
//!
//! After a successful `kinit` the ticket cache is listed with `klist` so the
//! credential expires when the ticket granting ticket actually does. The
//! KDC may grant a shorter lifetime than requested.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tokio::process::Command;
use tracing::{debug, info, warn};
use volkeep_core::CredentialRef;

use crate::error::{AuthError, Result};
use crate::{AuthProvider, Credential};

/// Date layouts `klist` prints ticket times in under the C locale.
const KLIST_TIME_FORMATS: [&str; 4] = [
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%b %d %H:%M:%S %Y",
];

/// Acquires Kerberos tickets from a keytab by running `kinit`.
///
/// The ticket cache is shared with the REST and filesystem tooling of the
/// host; this provider only tracks when the acquired ticket stops being
/// valid.
#[derive(Debug, Clone)]
pub struct KinitAuthProvider {
    kinit_bin: PathBuf,
    klist_bin: PathBuf,
    ticket_lifetime: Duration,
}

impl KinitAuthProvider {
    /// Create a provider requesting tickets valid for `ticket_lifetime`.
    #[must_use]
    pub fn new(ticket_lifetime: Duration) -> Self {
        Self::with_binaries("kinit", "klist", ticket_lifetime)
    }

    /// Create a provider using specific `kinit` and `klist` executables.
    #[must_use]
    pub fn with_binaries(
        kinit_bin: impl Into<PathBuf>,
        klist_bin: impl Into<PathBuf>,
        ticket_lifetime: Duration,
    ) -> Self {
        Self {
            kinit_bin: kinit_bin.into(),
            klist_bin: klist_bin.into(),
            ticket_lifetime,
        }
    }

    /// List the ticket cache, returning `klist` output on success.
    async fn list_tickets(&self) -> Option<String> {
        let output = match Command::new(&self.klist_bin)
            .env("LC_ALL", "C")
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %self.klist_bin.display(), error = %e, "Unable to run klist");
                return None;
            }
        };

        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "klist failed"
            );
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AuthProvider for KinitAuthProvider {
    async fn login(&self, credential: &CredentialRef) -> Result<Credential> {
        tokio::fs::metadata(&credential.keytab).await.map_err(|e| {
            AuthError::KeytabUnavailable(format!("{}: {e}", credential.keytab.display()))
        })?;

        let lifetime = format!("{}s", self.ticket_lifetime.as_secs());
        debug!(
            principal = %credential.principal,
            keytab = %credential.keytab.display(),
            lifetime = %lifetime,
            "Running kinit"
        );

        let acquired_at = Utc::now();
        let output = Command::new(&self.kinit_bin)
            .arg("-k")
            .arg("-t")
            .arg(&credential.keytab)
            .arg("-l")
            .arg(&lifetime)
            .arg(&credential.principal)
            .output()
            .await
            .map_err(|e| AuthError::CommandFailed(format!("{}: {e}", self.kinit_bin.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AuthError::LoginFailed(if stderr.is_empty() {
                format!("kinit exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let lifetime = chrono::Duration::from_std(self.ticket_lifetime)
            .map_err(|e| AuthError::Internal(format!("ticket lifetime out of range: {e}")))?;
        let requested = acquired_at + lifetime;
        let expires_at = match self.list_tickets().await {
            Some(listing) => ticket_expiry(&listing, requested),
            None => requested,
        };

        let credential = Credential {
            principal: credential.principal.clone(),
            acquired_at,
            expires_at,
        };
        info!(
            principal = %credential.principal,
            expires_at = %credential.expires_at,
            "Acquired service ticket"
        );
        Ok(credential)
    }
}

/// Expiry of the ticket granting ticket in a `klist` listing, capped at
/// `requested`. Falls back to `requested` when the listing has no usable
/// ticket granting ticket.
#[must_use]
pub fn ticket_expiry(listing: &str, requested: DateTime<Utc>) -> DateTime<Utc> {
    let granted = parse_tgt_expiry(listing)
        .and_then(|end| Local.from_local_datetime(&end).earliest())
        .map(|end| end.with_timezone(&Utc));

    match granted {
        Some(end) => end.min(requested),
        None => {
            warn!("No ticket granting ticket in klist output, assuming the requested lifetime");
            requested
        }
    }
}

/// Local expiry time of the first `krbtgt/` ticket in a `klist` listing.
///
/// Handles the MIT layout (`start  end  principal`, dates as `MM/DD/YY`)
/// and the Heimdal layout (`Mon DD HH:MM:SS YYYY`).
fn parse_tgt_expiry(listing: &str) -> Option<NaiveDateTime> {
    listing.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (principal, times) = tokens.split_last()?;
        if !principal.starts_with("krbtgt/") {
            return None;
        }
        let expires = match times.len() {
            4 => times[2..].join(" "),
            8 => times[4..].join(" "),
            _ => return None,
        };
        KLIST_TIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&expires, format).ok())
    })
}
