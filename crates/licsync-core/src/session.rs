//! Session context
//!
//! Established once by the entry point and shared read-only with every
//! record for the lifetime of a run.

use crate::error::{LicsyncError, LicsyncResult};
use std::fmt;
use uuid::Uuid;

/// Environment variable consulted for a bearer token
pub const TOKEN_ENV: &str = "LICSYNC_ACCESS_TOKEN";

/// Credential presented to the inventory
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Bearer token obtained by an external sign-in flow
    Bearer(String),
    /// No credential (offline snapshot runs)
    Anonymous,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Authenticated context for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    subscription_id: String,
    credential: Credential,
    run_id: Uuid,
}

impl SessionContext {
    /// Create session
    ///
    /// # Errors
    /// Returns [`LicsyncError::Session`] if the subscription id is blank
    pub fn new(subscription_id: impl Into<String>, credential: Credential) -> LicsyncResult<Self> {
        let subscription_id = subscription_id.into().trim().to_string();
        if subscription_id.is_empty() {
            return Err(LicsyncError::Session("subscription id is empty".into()));
        }
        if let Credential::Bearer(token) = &credential {
            if token.trim().is_empty() {
                return Err(LicsyncError::Session("access token is empty".into()));
            }
        }
        Ok(Self {
            subscription_id,
            credential,
            run_id: Uuid::new_v4(),
        })
    }

    /// Build a bearer session from [`TOKEN_ENV`]
    ///
    /// # Errors
    /// Returns [`LicsyncError::Session`] if the variable is unset or blank
    pub fn from_env(subscription_id: impl Into<String>) -> LicsyncResult<Self> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| LicsyncError::Session(format!("{TOKEN_ENV} is not set")))?;
        Self::new(subscription_id, Credential::Bearer(token))
    }

    /// Offline session without credentials
    ///
    /// # Errors
    /// Returns [`LicsyncError::Session`] if the subscription id is blank
    pub fn anonymous(subscription_id: impl Into<String>) -> LicsyncResult<Self> {
        Self::new(subscription_id, Credential::Anonymous)
    }

    /// Target subscription
    #[inline]
    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Credential
    #[inline]
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Correlation id of this run, used in log fields
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}
