//! Authentication and authorization.
//!
//! Callers are identified at the transport edge and carried through the
//! service as a [`CallerContext`]:
//!
//! - **API Key**: `Authorization: Bearer <key>` or the X-API-Key header,
//!   checked against a static key or the hashed keys in the database
//! - **Anonymous**: no credentials, granted the configured anonymous
//!   capabilities
//! - **Local operator**: CLI and stdio transport, granted every capability
//!
//! Every enrollment operation then asks an [`AuthorizationChecker`] whether
//! the caller holds the required capability in the course context.

mod authorizer;
mod context;
mod extractor;

pub use authorizer::{AuthorizationChecker, CapabilityChecker};
pub use context::CallerContext;
pub use extractor::{AuthConfig, AuthError, AuthExtractor, generate_api_key, hash_api_key};
