//! Request-processing stages for Keygate
//!
//! The embedding HTTP layer owns routing and response rendering; these stages
//! operate on header maps and report failures through `KeygateError`, whose
//! `status_code()` maps every verification failure to 401 Unauthorized.

pub mod signature;

pub use signature::{RequestSignatureVerifier, HEADER_SIGNATURE, HEADER_TIMESTAMP};
