//! Async services pairing the request codec with the authenticated client.
//!
//! The facades talk to the API through `PetBackend` and `TutorBackend` so
//! tests can substitute scripted backends.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::auth::AuthenticatedClient;
use crate::error::ApiError;
use crate::types::{
    Attachment, AuthResponse, Credentials, Page, Pet, PetDetail, PetQuery, PetRequest, Tutor,
    TutorDetail, TutorQuery, TutorRequest, Upload,
};

#[async_trait]
pub trait PetBackend: Send + Sync {
    async fn list(&self, query: &PetQuery) -> Result<Page<Pet>, ApiError>;
    async fn get(&self, id: i64) -> Result<PetDetail, ApiError>;
    async fn create(&self, input: &PetRequest) -> Result<Pet, ApiError>;
    async fn update(&self, id: i64, input: &PetRequest) -> Result<Pet, ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
    async fn upload_photo(&self, id: i64, upload: &Upload) -> Result<Attachment, ApiError>;
}

#[async_trait]
pub trait TutorBackend: Send + Sync {
    async fn list(&self, query: &TutorQuery) -> Result<Page<Tutor>, ApiError>;
    async fn get(&self, id: i64) -> Result<TutorDetail, ApiError>;
    async fn create(&self, input: &TutorRequest) -> Result<Tutor, ApiError>;
    async fn update(&self, id: i64, input: &TutorRequest) -> Result<Tutor, ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
    async fn upload_photo(&self, id: i64, upload: &Upload) -> Result<Attachment, ApiError>;
    async fn link_pet(&self, tutor_id: i64, pet_id: i64) -> Result<(), ApiError>;
    async fn unlink_pet(&self, tutor_id: i64, pet_id: i64) -> Result<(), ApiError>;
}

/// Login and logout.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: Arc<AuthenticatedClient>,
}

impl AuthService {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }

    /// Exchange credentials for a token pair and persist it.
    ///
    /// Login bypasses the refresh handling: a 401 here means bad credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let codec = self.client.codec();
        let request = codec.build_login(&Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let auth = codec.parse_auth(self.client.send_anonymous(request).await?)?;
        if !auth.access_token.is_empty() {
            self.client.establish(&auth)?;
            info!(username, "logged in");
        }
        Ok(auth)
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.client.end_session()?;
        info!("logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.client
            .session()
            .map(|s| s.is_authenticated())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct PetService {
    client: Arc<AuthenticatedClient>,
}

impl PetService {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PetBackend for PetService {
    async fn list(&self, query: &PetQuery) -> Result<Page<Pet>, ApiError> {
        let codec = self.client.codec();
        codec.parse_list_pets(self.client.send(codec.build_list_pets(query)).await?)
    }

    async fn get(&self, id: i64) -> Result<PetDetail, ApiError> {
        let codec = self.client.codec();
        codec.parse_pet_detail(self.client.send(codec.build_get_pet(id)).await?)
    }

    async fn create(&self, input: &PetRequest) -> Result<Pet, ApiError> {
        let codec = self.client.codec();
        codec.parse_pet(self.client.send(codec.build_create_pet(input)?).await?)
    }

    async fn update(&self, id: i64, input: &PetRequest) -> Result<Pet, ApiError> {
        let codec = self.client.codec();
        codec.parse_pet(self.client.send(codec.build_update_pet(id, input)?).await?)
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let codec = self.client.codec();
        codec.parse_empty(self.client.send(codec.build_delete_pet(id)).await?)
    }

    async fn upload_photo(&self, id: i64, upload: &Upload) -> Result<Attachment, ApiError> {
        let codec = self.client.codec();
        let request = codec.build_upload_pet_photo(id, upload);
        codec.parse_attachment(self.client.send(request).await?)
    }
}

#[derive(Debug, Clone)]
pub struct TutorService {
    client: Arc<AuthenticatedClient>,
}

impl TutorService {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TutorBackend for TutorService {
    async fn list(&self, query: &TutorQuery) -> Result<Page<Tutor>, ApiError> {
        let codec = self.client.codec();
        codec.parse_list_tutors(self.client.send(codec.build_list_tutors(query)).await?)
    }

    async fn get(&self, id: i64) -> Result<TutorDetail, ApiError> {
        let codec = self.client.codec();
        codec.parse_tutor_detail(self.client.send(codec.build_get_tutor(id)).await?)
    }

    async fn create(&self, input: &TutorRequest) -> Result<Tutor, ApiError> {
        let codec = self.client.codec();
        codec.parse_tutor(self.client.send(codec.build_create_tutor(input)?).await?)
    }

    async fn update(&self, id: i64, input: &TutorRequest) -> Result<Tutor, ApiError> {
        let codec = self.client.codec();
        codec.parse_tutor(self.client.send(codec.build_update_tutor(id, input)?).await?)
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let codec = self.client.codec();
        codec.parse_empty(self.client.send(codec.build_delete_tutor(id)).await?)
    }

    async fn upload_photo(&self, id: i64, upload: &Upload) -> Result<Attachment, ApiError> {
        let codec = self.client.codec();
        let request = codec.build_upload_tutor_photo(id, upload);
        codec.parse_attachment(self.client.send(request).await?)
    }

    async fn link_pet(&self, tutor_id: i64, pet_id: i64) -> Result<(), ApiError> {
        let codec = self.client.codec();
        codec.parse_empty(self.client.send(codec.build_link_pet(tutor_id, pet_id)).await?)
    }

    async fn unlink_pet(&self, tutor_id: i64, pet_id: i64) -> Result<(), ApiError> {
        let codec = self.client.codec();
        codec.parse_empty(self.client.send(codec.build_unlink_pet(tutor_id, pet_id)).await?)
    }
}
