use std::sync::Arc;

use crate::authorize::AuthorizationRequestValidator;
use crate::discovery::DiscoveryPublisher;
use crate::grant::GrantProcessor;
use crate::store::Store;

/// Shared state for the authorization server handlers.
pub(crate) struct OAuth2State {
    pub store: Arc<dyn Store>,
    pub validator: AuthorizationRequestValidator,
    pub grants: GrantProcessor,
    pub discovery: DiscoveryPublisher,
}
