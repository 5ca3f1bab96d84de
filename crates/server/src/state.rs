use std::sync::Arc;

use service::products::ProductRepository;
use service::users::UserRepository;

/// Shared handles to the resource stores, cloned into every handler.
#[derive(Clone)]
pub struct ServerState {
    pub products: Arc<dyn ProductRepository>,
    pub users: Arc<dyn UserRepository>,
}
