use parley_oauth2::{Scope, Scopes};
use uuid::Uuid;

/// The caller behind a resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub name: String,
    /// Client that obtained the bearer token; `None` for session callers.
    pub client_id: Option<String>,
    /// Scopes granted to the bearer token; `None` means the caller came in
    /// through a session and is not scope-restricted.
    pub scopes: Option<Scopes>,
}

impl AuthenticatedUser {
    /// Whether the caller may act under `scope`.
    pub fn allows(&self, scope: Scope) -> bool {
        match &self.scopes {
            Some(scopes) => scopes.contains(scope),
            None => true,
        }
    }

    pub fn is_bearer(&self) -> bool {
        self.client_id.is_some()
    }
}
