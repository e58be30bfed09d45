//! Social-proof gate.
//!
//! The actual verification service is an external collaborator; the hub only
//! models its contract: a yes/no check per principal ahead of every write.

use async_trait::async_trait;

use crate::error::Result;
use crate::principal::Principal;

/// Decides whether a principal has presented enough social proofs to write.
#[async_trait]
pub trait ProofChecker: Send + Sync + 'static {
    /// Fails with [`HubError::NotEnoughProof`] when the principal does not
    /// pass the gate.
    ///
    /// [`HubError::NotEnoughProof`]: crate::error::HubError::NotEnoughProof
    async fn check(&self, principal: &Principal) -> Result<()>;
}

/// The default gate: no proofs required.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllProofs;

#[async_trait]
impl ProofChecker for AllowAllProofs {
    async fn check(&self, _principal: &Principal) -> Result<()> {
        Ok(())
    }
}
