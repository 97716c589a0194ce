//! Resource-server side of Parley's authentication.
//!
//! [`TokenVerifier`] turns an `Authorization: Bearer` header (or, failing
//! that, the session's [`ResourceOwner`](parley_oauth2::ResourceOwner)) into
//! an [`AuthenticatedUser`]. Handlers receive it through the axum extractor
//! or the [`require_user`] middleware.

pub mod error;
pub mod extractor;
pub mod identity;
pub mod verifier;

pub use error::SecurityError;
pub use extractor::{authenticate_parts, require_user};
pub use identity::AuthenticatedUser;
pub use verifier::{extract_bearer_token, TokenVerifier};
