//! In-memory implementation of the registry API for tests and local runs.
//!
//! Login hands out random access/refresh tokens. Every `/v1` route requires a
//! live access token; `expire_access_tokens` invalidates them all so clients
//! have to go through the refresh endpoint.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "admin";
const DEFAULT_PAGE_SIZE: u32 = 10;
const ACCESS_TTL_SECS: u64 = 300;
const REFRESH_TTL_SECS: u64 = 1800;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub nome: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub nome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raca: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idade: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foto: Option<Attachment>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tutor {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub telefone: String,
    pub endereco: String,
    pub cpf: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foto: Option<Attachment>,
}

#[derive(Serialize, Deserialize)]
pub struct PetDetail {
    #[serde(flatten)]
    pub pet: Pet,
    pub tutores: Vec<Tutor>,
}

#[derive(Serialize, Deserialize)]
pub struct TutorDetail {
    #[serde(flatten)]
    pub tutor: Tutor,
    pub pets: Vec<Pet>,
}

#[derive(Deserialize)]
pub struct PetInput {
    pub nome: String,
    pub raca: Option<String>,
    pub idade: Option<u32>,
}

#[derive(Deserialize)]
pub struct TutorInput {
    pub nome: String,
    pub email: String,
    pub telefone: String,
    pub endereco: String,
    pub cpf: Option<u64>,
}

#[derive(Serialize, Deserialize)]
pub struct Paged<T> {
    pub page: u32,
    pub size: u32,
    pub total: u64,
    #[serde(rename = "pageCount")]
    pub page_count: u32,
    pub content: Vec<T>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub nome: Option<String>,
    pub raca: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub refresh_expires_in: u64,
}

/// Everything the fake API remembers.
#[derive(Default)]
pub struct MockState {
    pets: BTreeMap<i64, Pet>,
    tutors: BTreeMap<i64, Tutor>,
    /// (tutor id, pet id)
    links: BTreeSet<(i64, i64)>,
    next_id: i64,
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    refresh_calls: usize,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_tokens(&mut self) -> TokenPair {
        let pair = TokenPair {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_in: ACCESS_TTL_SECS,
            refresh_expires_in: REFRESH_TTL_SECS,
        };
        self.access_tokens.insert(pair.access_token.clone());
        self.refresh_tokens.insert(pair.refresh_token.clone());
        pair
    }

    fn tutors_of(&self, pet_id: i64) -> Vec<Tutor> {
        self.links
            .iter()
            .filter(|(_, p)| *p == pet_id)
            .filter_map(|(t, _)| self.tutors.get(t).cloned())
            .collect()
    }

    fn pets_of(&self, tutor_id: i64) -> Vec<Pet> {
        self.links
            .iter()
            .filter(|(t, _)| *t == tutor_id)
            .filter_map(|(_, p)| self.pets.get(p).cloned())
            .collect()
    }

    /// Invalidate every access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&mut self) {
        self.access_tokens.clear();
    }

    /// Invalidate every refresh token.
    pub fn revoke_refresh_tokens(&mut self) {
        self.refresh_tokens.clear();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls
    }
}

pub type Db = Arc<RwLock<MockState>>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    let api = Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route("/pets/{id}", get(get_pet).put(update_pet).delete(delete_pet))
        .route("/pets/{id}/fotos", post(upload_pet_photo))
        .route("/tutores", get(list_tutors).post(create_tutor))
        .route(
            "/tutores/{id}",
            get(get_tutor).put(update_tutor).delete(delete_tutor),
        )
        .route("/tutores/{id}/fotos", post(upload_tutor_photo))
        .route(
            "/tutores/{id}/pets/{pet_id}",
            post(link_pet).delete(unlink_pet),
        )
        .layer(middleware::from_fn_with_state(db.clone(), require_bearer));

    Router::new()
        .route("/autenticacao/login", post(login))
        .route("/autenticacao/refresh", put(refresh))
        .nest("/v1", api)
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(db)).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn require_bearer(
    State(db): State<Db>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer(request.headers())
        .map(str::to_owned)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if !db.read().await.access_tokens.contains(&token) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}

// --- authentication ---

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginInput>,
) -> Result<Json<TokenPair>, StatusCode> {
    if input.username != USERNAME || input.password != PASSWORD {
        return Err(StatusCode::UNAUTHORIZED);
    }
    info!(username = %input.username, "login");
    Ok(Json(db.write().await.issue_tokens()))
}

async fn refresh(State(db): State<Db>, headers: HeaderMap) -> Result<Json<TokenPair>, StatusCode> {
    let token = bearer(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let mut state = db.write().await;
    state.refresh_calls += 1;
    if !state.refresh_tokens.remove(token) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    info!("refresh");
    Ok(Json(state.issue_tokens()))
}

// --- paging ---

fn paginate<T>(items: Vec<T>, params: &ListParams) -> Paged<T> {
    let page = params.page.unwrap_or(0);
    let size = params.size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE);
    let total = items.len() as u64;
    let page_count = total.div_ceil(u64::from(size)) as u32;
    let content = items
        .into_iter()
        .skip(page as usize * size as usize)
        .take(size as usize)
        .collect();
    Paged {
        page,
        size,
        total,
        page_count,
        content,
    }
}

fn filter_matches(value: Option<&str>, filter: Option<&str>) -> bool {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        None => true,
        Some(filter) => value.is_some_and(|v| v.to_lowercase().contains(&filter.to_lowercase())),
    }
}

async fn read_photo(mut multipart: Multipart, id: i64) -> Result<Attachment, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("foto") {
            continue;
        }
        let nome = field.file_name().unwrap_or("foto").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        if bytes.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        return Ok(Attachment {
            id,
            url: format!("/fotos/{id}/{nome}"),
            nome,
            content_type,
        });
    }
    Err(StatusCode::BAD_REQUEST)
}

// --- pets ---

async fn list_pets(State(db): State<Db>, Query(params): Query<ListParams>) -> Json<Paged<Pet>> {
    let state = db.read().await;
    let pets = state
        .pets
        .values()
        .filter(|p| filter_matches(Some(&p.nome), params.nome.as_deref()))
        .filter(|p| filter_matches(p.raca.as_deref(), params.raca.as_deref()))
        .cloned()
        .collect();
    Json(paginate(pets, &params))
}

async fn get_pet(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<PetDetail>, StatusCode> {
    let state = db.read().await;
    let pet = state.pets.get(&id).cloned().ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(PetDetail {
        tutores: state.tutors_of(id),
        pet,
    }))
}

async fn create_pet(State(db): State<Db>, Json(input): Json<PetInput>) -> (StatusCode, Json<Pet>) {
    let mut state = db.write().await;
    let pet = Pet {
        id: state.next_id(),
        nome: input.nome,
        raca: input.raca,
        idade: input.idade,
        foto: None,
    };
    state.pets.insert(pet.id, pet.clone());
    (StatusCode::CREATED, Json(pet))
}

async fn update_pet(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<PetInput>,
) -> Result<Json<Pet>, StatusCode> {
    let mut state = db.write().await;
    let pet = state.pets.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    pet.nome = input.nome;
    pet.raca = input.raca;
    pet.idade = input.idade;
    Ok(Json(pet.clone()))
}

async fn delete_pet(State(db): State<Db>, Path(id): Path<i64>) -> Result<StatusCode, StatusCode> {
    let mut state = db.write().await;
    state.pets.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
    state.links.retain(|(_, p)| *p != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_pet_photo(
    State(db): State<Db>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), StatusCode> {
    if !db.read().await.pets.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let attachment = read_photo(multipart, id).await?;
    let mut state = db.write().await;
    let pet = state.pets.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    pet.foto = Some(attachment.clone());
    Ok((StatusCode::CREATED, Json(attachment)))
}

// --- tutors ---

async fn list_tutors(
    State(db): State<Db>,
    Query(params): Query<ListParams>,
) -> Json<Paged<Tutor>> {
    let state = db.read().await;
    let tutors = state
        .tutors
        .values()
        .filter(|t| filter_matches(Some(&t.nome), params.nome.as_deref()))
        .cloned()
        .collect();
    Json(paginate(tutors, &params))
}

async fn get_tutor(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<TutorDetail>, StatusCode> {
    let state = db.read().await;
    let tutor = state.tutors.get(&id).cloned().ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(TutorDetail {
        pets: state.pets_of(id),
        tutor,
    }))
}

async fn create_tutor(
    State(db): State<Db>,
    Json(input): Json<TutorInput>,
) -> (StatusCode, Json<Tutor>) {
    let mut state = db.write().await;
    let tutor = Tutor {
        id: state.next_id(),
        nome: input.nome,
        email: input.email,
        telefone: input.telefone,
        endereco: input.endereco,
        cpf: input.cpf.unwrap_or(0),
        foto: None,
    };
    state.tutors.insert(tutor.id, tutor.clone());
    (StatusCode::CREATED, Json(tutor))
}

async fn update_tutor(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<TutorInput>,
) -> Result<Json<Tutor>, StatusCode> {
    let mut state = db.write().await;
    let tutor = state.tutors.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    tutor.nome = input.nome;
    tutor.email = input.email;
    tutor.telefone = input.telefone;
    tutor.endereco = input.endereco;
    if let Some(cpf) = input.cpf {
        tutor.cpf = cpf;
    }
    Ok(Json(tutor.clone()))
}

async fn delete_tutor(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut state = db.write().await;
    state.tutors.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
    state.links.retain(|(t, _)| *t != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_tutor_photo(
    State(db): State<Db>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), StatusCode> {
    if !db.read().await.tutors.contains_key(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let attachment = read_photo(multipart, id).await?;
    let mut state = db.write().await;
    let tutor = state.tutors.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    tutor.foto = Some(attachment.clone());
    Ok((StatusCode::CREATED, Json(attachment)))
}

async fn link_pet(
    State(db): State<Db>,
    Path((id, pet_id)): Path<(i64, i64)>,
) -> Result<StatusCode, StatusCode> {
    let mut state = db.write().await;
    if !state.tutors.contains_key(&id) || !state.pets.contains_key(&pet_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    state.links.insert((id, pet_id));
    Ok(StatusCode::CREATED)
}

async fn unlink_pet(
    State(db): State<Db>,
    Path((id, pet_id)): Path<(i64, i64)>,
) -> Result<StatusCode, StatusCode> {
    let mut state = db.write().await;
    if !state.tutors.contains_key(&id) || !state.pets.contains_key(&pet_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    state.links.remove(&(id, pet_id));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: u32, size: u32) -> ListParams {
        ListParams {
            page: Some(page),
            size: Some(size),
            nome: None,
            raca: None,
        }
    }

    #[test]
    fn paginate_computes_page_count() {
        let page = paginate((0..23).collect::<Vec<_>>(), &params(2, 10));
        assert_eq!(page.total, 23);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.content, vec![20, 21, 22]);
    }

    #[test]
    fn paginate_past_the_end_is_empty() {
        let page = paginate(vec![1, 2], &params(5, 10));
        assert!(page.content.is_empty());
        assert_eq!(page.page_count, 1);
    }

    #[test]
    fn zero_size_uses_default() {
        let page = paginate((0..15).collect::<Vec<_>>(), &params(0, 0));
        assert_eq!(page.size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.content.len(), 10);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        assert!(filter_matches(Some("Rex"), Some("re")));
        assert!(filter_matches(Some("Rex"), Some("  ")));
        assert!(!filter_matches(None, Some("poodle")));
    }

    #[test]
    fn pet_omits_empty_optionals() {
        let pet = Pet {
            id: 1,
            nome: "Rex".to_string(),
            raca: None,
            idade: None,
            foto: None,
        };
        let json = serde_json::to_value(&pet).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "nome": "Rex"}));
    }

    #[test]
    fn refresh_token_is_single_use() {
        let mut state = MockState::default();
        let pair = state.issue_tokens();
        assert!(state.refresh_tokens.remove(&pair.refresh_token));
        assert!(!state.refresh_tokens.remove(&pair.refresh_token));
    }
}
