use std::sync::Arc;

use axum::extract::FromRef;
use parley_oauth2::Store;
use parley_security::TokenVerifier;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            verifier: Arc::new(TokenVerifier::new(store.clone())),
            store,
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}
