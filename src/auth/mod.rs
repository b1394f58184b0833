//! Credential issuance for Keygate
//!
//! The dependency chain runs TokenIssuer -> SignatureManager ->
//! SecretKeyManager -> CacheStore. Each manager threads its results through
//! the call; nothing is stashed on the managers between calls, so one
//! instance is safe to share across concurrent callers.

pub mod secret;
pub mod signature;
pub mod slots;
pub mod token;

pub use secret::{SecretKeyManager, SecretMetadata};
pub use signature::{SignatureManager, SignatureMetadata};
pub use slots::{RotatedSignatureSlot, SlotRotator};
pub use token::{Claims, RequestContext, TokenIssuer};
