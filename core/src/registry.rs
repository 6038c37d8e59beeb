//! Wires the client, services and facades together once per application.

use std::sync::Arc;

use crate::auth::AuthenticatedClient;
use crate::client::RegistryClient;
use crate::config::RegistryConfig;
use crate::error::ApiError;
use crate::facade::{PetFacade, TutorFacade};
use crate::service::{AuthService, PetService, TutorService};
use crate::session::{FileSessionStore, SessionStore};
use crate::transport::{ReqwestTransport, Transport};

/// Application-wide handles. Construct once and share by reference.
#[derive(Clone)]
pub struct Registry {
    pub client: Arc<AuthenticatedClient>,
    pub auth: AuthService,
    pub pets: Arc<PetFacade>,
    pub tutors: Arc<TutorFacade>,
}

impl Registry {
    /// Build from configuration with the reqwest transport and the file
    /// session store.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        let sessions = FileSessionStore::new(&config.session_file);
        Ok(Self::new(
            &config.api_url,
            Arc::new(transport),
            Arc::new(sessions),
        ))
    }

    pub fn new(
        api_url: &str,
        transport: Arc<dyn Transport>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let client = Arc::new(AuthenticatedClient::new(
            RegistryClient::new(api_url),
            transport,
            sessions,
        ));
        Self {
            auth: AuthService::new(client.clone()),
            pets: Arc::new(PetFacade::new(Arc::new(PetService::new(client.clone())))),
            tutors: Arc::new(TutorFacade::new(Arc::new(TutorService::new(client.clone())))),
            client,
        }
    }
}
