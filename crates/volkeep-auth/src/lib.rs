//! Service credential acquisition for volkeep.
//!
//! The control loop logs in once, keeps the returned [`Credential`] and
//! logs in again when it expires. Acquisition mechanics stay behind the
//! [`AuthProvider`] trait:
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Control loop   │────▶│   AuthProvider   │
//! │                  │     │   (trait)        │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │ KinitAuthProvider│
//!                          │ (keytab login)   │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use volkeep_auth::{AuthProvider, KinitAuthProvider};
//! use volkeep_core::CredentialRef;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = KinitAuthProvider::new(Duration::from_secs(36_000));
//! let credential = provider
//!     .login(&CredentialRef {
//!         principal: "mapr/host@EXAMPLE.COM".into(),
//!         keytab: "/opt/mapr/conf/mapr.keytab".into(),
//!     })
//!     .await?;
//! println!("valid until {}", credential.expires_at);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod kinit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use volkeep_core::CredentialRef;

pub use error::{AuthError, Result};
pub use kinit::KinitAuthProvider;

/// A logged-in service credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Principal the credential belongs to.
    pub principal: String,
    /// When the credential was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the credential stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// Acquires service credentials.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Log in with the referenced credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be acquired.
    async fn login(&self, credential: &CredentialRef) -> Result<Credential>;

    /// Returns true if `credential` is no longer valid at `now`.
    fn is_expired(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        now >= credential.expires_at
    }
}

/// A scriptable auth provider for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::{async_trait, AuthError, AuthProvider, Credential, CredentialRef, Result};
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Auth provider returning queued outcomes, then succeeding.
    #[derive(Debug)]
    pub struct MockAuthProvider {
        lifetime: Duration,
        failures: Mutex<VecDeque<String>>,
        logins: Mutex<u32>,
    }

    impl MockAuthProvider {
        /// Create a provider issuing credentials valid for `lifetime`.
        #[must_use]
        pub fn new(lifetime: Duration) -> Self {
            Self {
                lifetime,
                failures: Mutex::new(VecDeque::new()),
                logins: Mutex::new(0),
            }
        }

        /// Make the next login attempt fail.
        pub fn fail_next(&self, reason: impl Into<String>) {
            self.failures.lock().push_back(reason.into());
        }

        /// Number of login attempts, successful or not.
        #[must_use]
        pub fn login_count(&self) -> u32 {
            *self.logins.lock()
        }
    }

    #[async_trait]
    impl AuthProvider for MockAuthProvider {
        async fn login(&self, credential: &CredentialRef) -> Result<Credential> {
            *self.logins.lock() += 1;
            if let Some(reason) = self.failures.lock().pop_front() {
                return Err(AuthError::LoginFailed(reason));
            }
            let now = Utc::now();
            Ok(Credential {
                principal: credential.principal.clone(),
                acquired_at: now,
                expires_at: now + self.lifetime,
            })
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockAuthProvider;
