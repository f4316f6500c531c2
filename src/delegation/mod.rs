//! Delegated-execution tier.
//!
//! The delegated tier hands a matched capability to an external execution
//! channel keyed by a credential. When no credential is configured the
//! tier is not constructed at all, and the engine goes straight to the
//! local handler. Failures here are never surfaced to the caller; the
//! engine logs them and falls through.
//!
//! [`CredentialedDelegate`] is the only channel so far. It authenticates
//! with its credential but runs the capability in-process, so its
//! observable behavior matches the local-handler tier.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::capabilities::{Capability, CapabilityArgs, HandlerError};

/// Failures of the delegated-execution channel.
#[derive(Debug, Error)]
pub enum DelegationError {
    /// The delegated run of the capability failed.
    #[error("delegated execution of '{capability}' failed: {source}")]
    Execution {
        capability: String,
        #[source]
        source: HandlerError,
    },

    /// The channel did not answer within the tier timeout.
    #[error("delegated execution timed out after {0:?}")]
    TimedOut(Duration),

    /// The channel panicked while running the capability.
    #[error("delegated execution panicked: {0}")]
    Panicked(String),
}

/// An execution channel able to run a capability on the engine's behalf.
#[async_trait]
pub trait DelegatedExecutor: Send + Sync + fmt::Debug {
    /// Short channel name used in logs.
    fn channel(&self) -> &str;

    async fn execute(
        &self,
        capability: &Capability,
        args: &CapabilityArgs,
    ) -> Result<String, DelegationError>;
}

/// Delegation channel gated on a configured API credential.
pub struct CredentialedDelegate {
    channel: String,
    api_key: String,
}

impl CredentialedDelegate {
    /// Returns `None` for an absent or blank credential, leaving the tier
    /// disabled.
    pub fn from_credential(channel: impl Into<String>, api_key: Option<String>) -> Option<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty())?;
        Some(Self {
            channel: channel.into(),
            api_key,
        })
    }

    fn key_hint(&self) -> String {
        let tail: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{}", tail)
    }
}

impl fmt::Debug for CredentialedDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialedDelegate")
            .field("channel", &self.channel)
            .field("api_key", &self.key_hint())
            .finish()
    }
}

#[async_trait]
impl DelegatedExecutor for CredentialedDelegate {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn execute(
        &self,
        capability: &Capability,
        args: &CapabilityArgs,
    ) -> Result<String, DelegationError> {
        tracing::debug!(
            channel = %self.channel,
            key = %self.key_hint(),
            capability = %capability.name,
            "delegating capability"
        );
        capability
            .run(args)
            .await
            .map_err(|source| DelegationError::Execution {
                capability: capability.name.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credential_disables_tier() {
        assert!(CredentialedDelegate::from_credential("openserv", None).is_none());
        assert!(CredentialedDelegate::from_credential("openserv", Some("".into())).is_none());
        assert!(CredentialedDelegate::from_credential("openserv", Some("  ".into())).is_none());
    }

    #[test]
    fn test_debug_hides_key() {
        let d = CredentialedDelegate::from_credential("openserv", Some("secret-abcd".into())).unwrap();
        let dbg = format!("{:?}", d);
        assert!(dbg.contains("…abcd"));
        assert!(!dbg.contains("secret"));
    }

    #[tokio::test]
    async fn test_execute_runs_capability() {
        let d = CredentialedDelegate::from_credential("openserv", Some("k".into())).unwrap();
        let cap = Capability::from_fn("ok", "ok", |_| async { Ok("done".to_string()) });
        assert_eq!(d.execute(&cap, &CapabilityArgs::new()).await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_execute_wraps_handler_error() {
        let d = CredentialedDelegate::from_credential("openserv", Some("k".into())).unwrap();
        let cap = Capability::from_fn("boom", "fails", |_| async {
            Err(HandlerError::Failed("exploded".into()))
        });
        let err = d.execute(&cap, &CapabilityArgs::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "delegated execution of 'boom' failed: exploded");
    }
}
