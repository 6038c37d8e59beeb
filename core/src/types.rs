//! Domain DTOs for the registry API.
//!
//! # Design
//! Field names are English on the Rust side and renamed to the API's wire
//! names with serde. These types mirror the mock-server's schema but are
//! defined independently; integration tests catch any drift between the two
//! crates.

use serde::{Deserialize, Serialize};

/// Stored reference to an uploaded photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub url: String,
}

/// A pet as listed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pet {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "raca", default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(rename = "idade", default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Attachment>,
}

/// A pet together with the tutors linked to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetDetail {
    #[serde(flatten)]
    pub pet: Pet,
    #[serde(rename = "tutores", default)]
    pub tutors: Vec<Tutor>,
}

/// Payload for creating or replacing a pet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetRequest {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "raca", skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(rename = "idade", skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

/// A tutor (pet owner) as listed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tutor {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "telefone", default)]
    pub phone: String,
    #[serde(rename = "endereco", default)]
    pub address: String,
    #[serde(default)]
    pub cpf: u64,
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Attachment>,
}

/// A tutor together with their pets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TutorDetail {
    #[serde(flatten)]
    pub tutor: Tutor,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

/// Payload for creating or replacing a tutor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TutorRequest {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    #[serde(rename = "endereco")]
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<u64>,
}

/// One page of a listing. `page_count == ceil(total / size)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(rename = "pageCount")]
    pub page_count: u32,
    pub content: Vec<T>,
}

/// Query for the pet listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetQuery {
    pub page: u32,
    pub size: u32,
    pub name: Option<String>,
    pub breed: Option<String>,
}

impl PetQuery {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_breed(mut self, breed: impl Into<String>) -> Self {
        self.breed = Some(breed.into());
        self
    }
}

/// Query for the tutor listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TutorQuery {
    pub page: u32,
    pub size: u32,
    pub name: Option<String>,
}

impl TutorQuery {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A photo to upload alongside a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Login credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Token pair returned by login and refresh. Refresh may omit the refresh
/// token, in which case the stored one stays valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_expires_in: u64,
}
