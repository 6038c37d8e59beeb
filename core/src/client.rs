//! Stateless HTTP request builder and response parser for the registry API.
//!
//! # Design
//! `RegistryClient` holds only a `base_url`. Each API operation is split into
//! a `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. Credentials are not attached here; the
//! authenticated client adds them on the way out.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse, MultipartFile, CONTENT_TYPE};
use crate::types::{
    Attachment, AuthResponse, Credentials, Page, Pet, PetDetail, PetQuery, PetRequest, Tutor,
    TutorDetail, TutorQuery, TutorRequest, Upload,
};

const PETS: &str = "v1/pets";
const TUTORS: &str = "v1/tutores";
const PHOTO_FIELD: &str = "foto";

/// Synchronous, stateless codec for the registry API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    // -- authentication ----------------------------------------------------

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Post, self.url("autenticacao/login"), credentials)
    }

    /// The refresh call carries the refresh token as its bearer credential.
    pub fn build_refresh(&self, refresh_token: &str) -> HttpRequest {
        let mut req = HttpRequest::new(HttpMethod::Put, self.url("autenticacao/refresh"));
        req.set_header(CONTENT_TYPE, "application/json".to_string());
        req.body = Some(Body::Json("{}".to_string()));
        req.set_bearer(refresh_token);
        req
    }

    pub fn parse_auth(&self, response: HttpResponse) -> Result<AuthResponse, ApiError> {
        parse_json(response)
    }

    // -- pets ----------------------------------------------------------------

    pub fn build_list_pets(&self, query: &PetQuery) -> HttpRequest {
        let mut req = HttpRequest::new(HttpMethod::Get, self.url(PETS));
        push_paging(&mut req, query.page, query.size);
        push_filter(&mut req, "nome", query.name.as_deref());
        push_filter(&mut req, "raca", query.breed.as_deref());
        req
    }

    pub fn build_get_pet(&self, id: i64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&format!("{PETS}/{id}")))
    }

    pub fn build_create_pet(&self, input: &PetRequest) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Post, self.url(PETS), input)
    }

    pub fn build_update_pet(&self, id: i64, input: &PetRequest) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Put, self.url(&format!("{PETS}/{id}")), input)
    }

    pub fn build_delete_pet(&self, id: i64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.url(&format!("{PETS}/{id}")))
    }

    pub fn build_upload_pet_photo(&self, id: i64, upload: &Upload) -> HttpRequest {
        upload_request(self.url(&format!("{PETS}/{id}/fotos")), upload)
    }

    pub fn parse_list_pets(&self, response: HttpResponse) -> Result<Page<Pet>, ApiError> {
        parse_json(response)
    }

    pub fn parse_pet_detail(&self, response: HttpResponse) -> Result<PetDetail, ApiError> {
        parse_json(response)
    }

    pub fn parse_pet(&self, response: HttpResponse) -> Result<Pet, ApiError> {
        parse_json(response)
    }

    // -- tutors --------------------------------------------------------------

    pub fn build_list_tutors(&self, query: &TutorQuery) -> HttpRequest {
        let mut req = HttpRequest::new(HttpMethod::Get, self.url(TUTORS));
        push_paging(&mut req, query.page, query.size);
        push_filter(&mut req, "nome", query.name.as_deref());
        req
    }

    pub fn build_get_tutor(&self, id: i64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&format!("{TUTORS}/{id}")))
    }

    pub fn build_create_tutor(&self, input: &TutorRequest) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Post, self.url(TUTORS), input)
    }

    pub fn build_update_tutor(
        &self,
        id: i64,
        input: &TutorRequest,
    ) -> Result<HttpRequest, ApiError> {
        json_request(HttpMethod::Put, self.url(&format!("{TUTORS}/{id}")), input)
    }

    pub fn build_delete_tutor(&self, id: i64) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.url(&format!("{TUTORS}/{id}")))
    }

    pub fn build_upload_tutor_photo(&self, id: i64, upload: &Upload) -> HttpRequest {
        upload_request(self.url(&format!("{TUTORS}/{id}/fotos")), upload)
    }

    pub fn build_link_pet(&self, tutor_id: i64, pet_id: i64) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Post,
            self.url(&format!("{TUTORS}/{tutor_id}/pets/{pet_id}")),
        )
    }

    pub fn build_unlink_pet(&self, tutor_id: i64, pet_id: i64) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Delete,
            self.url(&format!("{TUTORS}/{tutor_id}/pets/{pet_id}")),
        )
    }

    pub fn parse_list_tutors(&self, response: HttpResponse) -> Result<Page<Tutor>, ApiError> {
        parse_json(response)
    }

    pub fn parse_tutor_detail(&self, response: HttpResponse) -> Result<TutorDetail, ApiError> {
        parse_json(response)
    }

    pub fn parse_tutor(&self, response: HttpResponse) -> Result<Tutor, ApiError> {
        parse_json(response)
    }

    // -- shared ----------------------------------------------------------------

    pub fn parse_attachment(&self, response: HttpResponse) -> Result<Attachment, ApiError> {
        parse_json(response)
    }

    /// Delete, link and unlink carry no useful body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn json_request<T: Serialize>(
    method: HttpMethod,
    url: String,
    input: &T,
) -> Result<HttpRequest, ApiError> {
    let body =
        serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
    let mut req = HttpRequest::new(method, url);
    req.set_header(CONTENT_TYPE, "application/json".to_string());
    req.body = Some(Body::Json(body));
    Ok(req)
}

fn upload_request(url: String, upload: &Upload) -> HttpRequest {
    let mut req = HttpRequest::new(HttpMethod::Post, url);
    req.body = Some(Body::Multipart(MultipartFile {
        field: PHOTO_FIELD.to_string(),
        file_name: upload.file_name.clone(),
        content_type: upload.content_type.clone(),
        bytes: upload.bytes.clone(),
    }));
    req
}

fn push_paging(req: &mut HttpRequest, page: u32, size: u32) {
    req.query.push(("page".to_string(), page.to_string()));
    req.query.push(("size".to_string(), size.to_string()));
}

/// Blank filters are left out of the query entirely.
fn push_filter(req: &mut HttpRequest, key: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        req.query.push((key.to_string(), value.to_string()));
    }
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    match response.status {
        401 => Err(ApiError::Unauthorized),
        404 => Err(ApiError::NotFound),
        status => Err(ApiError::HttpError {
            status,
            body: response.body.clone(),
        }),
    }
}
