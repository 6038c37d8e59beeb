use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with_state, Attachment, Db, Paged, Pet, PetDetail, TokenPair, Tutor};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, token: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(body.to_string())
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(String::new())
        .unwrap()
}

async fn login(app: &Router) -> TokenPair {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/autenticacao/login")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"username":"admin","password":"admin"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

async fn create_pet(app: &Router, token: &str, body: &str) -> Pet {
    let resp = app
        .clone()
        .oneshot(json_request("POST", "/v1/pets", token, body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

// --- authentication ---

#[tokio::test]
async fn login_rejects_bad_password() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/autenticacao/login")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"username":"admin","password":"nope"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let resp = app()
        .oneshot(Request::builder().uri("/v1/pets").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_rejected_until_refresh() {
    let db = Db::default();
    let app = app_with_state(db.clone());
    let tokens = login(&app).await;

    db.write().await.expire_access_tokens();
    let resp = app
        .clone()
        .oneshot(authed("GET", "/v1/pets", &tokens.access_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(authed("PUT", "/autenticacao/refresh", &tokens.refresh_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fresh: TokenPair = body_json(resp).await;
    assert_ne!(fresh.refresh_token, tokens.refresh_token);

    let resp = app
        .clone()
        .oneshot(authed("GET", "/v1/pets", &fresh.access_token))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(db.read().await.refresh_calls(), 1);
}

#[tokio::test]
async fn refresh_token_cannot_be_reused() {
    let app = app();
    let tokens = login(&app).await;

    let first = app
        .clone()
        .oneshot(authed("PUT", "/autenticacao/refresh", &tokens.refresh_token))
        .await
        .unwrap();
    let second = app
        .clone()
        .oneshot(authed("PUT", "/autenticacao/refresh", &tokens.refresh_token))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
}

// --- listing ---

#[tokio::test]
async fn list_pets_paginates_and_filters() {
    let app = app();
    let token = login(&app).await.access_token;
    for i in 0..12 {
        create_pet(&app, &token, &format!(r#"{{"nome":"Pet {i}","raca":"Poodle"}}"#)).await;
    }
    create_pet(&app, &token, r#"{"nome":"Rex","raca":"Vira-lata"}"#).await;

    let resp = app
        .clone()
        .oneshot(authed("GET", "/v1/pets?page=1&size=5", &token))
        .await
        .unwrap();
    let page: Paged<Pet> = body_json(resp).await;
    assert_eq!(page.total, 13);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.content.len(), 5);

    let resp = app
        .clone()
        .oneshot(authed("GET", "/v1/pets?page=0&size=10&nome=rex", &token))
        .await
        .unwrap();
    let page: Paged<Pet> = body_json(resp).await;
    assert_eq!(page.total, 1);
    assert_eq!(page.content[0].nome, "Rex");

    let resp = app
        .clone()
        .oneshot(authed("GET", "/v1/pets?raca=poodle", &token))
        .await
        .unwrap();
    let page: Paged<Pet> = body_json(resp).await;
    assert_eq!(page.total, 12);
    assert_eq!(page.size, 10);
}

// --- mutations ---

#[tokio::test]
async fn create_pet_malformed_json_returns_422() {
    let app = app();
    let token = login(&app).await.access_token;
    let resp = app
        .oneshot(json_request("POST", "/v1/pets", &token, r#"{"raca":"x"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_ids_return_404() {
    let app = app();
    let token = login(&app).await.access_token;

    for (method, uri) in [
        ("GET", "/v1/pets/99"),
        ("DELETE", "/v1/pets/99"),
        ("GET", "/v1/tutores/99"),
        ("POST", "/v1/tutores/99/pets/98"),
    ] {
        let resp = app.clone().oneshot(authed(method, uri, &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
    }
}

#[tokio::test]
async fn link_shows_up_on_both_sides_and_unlink_removes_it() {
    let app = app();
    let token = login(&app).await.access_token;
    let pet = create_pet(&app, &token, r#"{"nome":"Mia","idade":3}"#).await;
    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/tutores",
            &token,
            r#"{"nome":"Ana","email":"ana@example.com","telefone":"912345678","endereco":"Rua 1","cpf":12345678901}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let tutor: Tutor = body_json(resp).await;

    let link_uri = format!("/v1/tutores/{}/pets/{}", tutor.id, pet.id);
    let resp = app.clone().oneshot(authed("POST", &link_uri, &token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(authed("GET", &format!("/v1/pets/{}", pet.id), &token))
        .await
        .unwrap();
    let detail: PetDetail = body_json(resp).await;
    assert_eq!(detail.tutores.len(), 1);
    assert_eq!(detail.tutores[0].cpf, 12345678901);

    let resp = app.clone().oneshot(authed("DELETE", &link_uri, &token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = app
        .clone()
        .oneshot(authed("GET", &format!("/v1/pets/{}", pet.id), &token))
        .await
        .unwrap();
    let detail: PetDetail = body_json(resp).await;
    assert!(detail.tutores.is_empty());
}

#[tokio::test]
async fn photo_upload_attaches_to_pet() {
    let app = app();
    let token = login(&app).await.access_token;
    let pet = create_pet(&app, &token, r#"{"nome":"Rex"}"#).await;

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"foto\"; filename=\"rex.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n--{boundary}--\r\n"
    );
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/pets/{}/fotos", pet.id))
                .header(
                    http::header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let attachment: Attachment = body_json(resp).await;
    assert_eq!(attachment.nome, "rex.png");
    assert_eq!(attachment.content_type, "image/png");

    let resp = app
        .clone()
        .oneshot(authed("GET", &format!("/v1/pets/{}", pet.id), &token))
        .await
        .unwrap();
    let detail: PetDetail = body_json(resp).await;
    assert_eq!(detail.pet.foto.unwrap().nome, "rex.png");
}

#[tokio::test]
async fn update_and_delete_pet() {
    let app = app();
    let token = login(&app).await.access_token;
    let pet = create_pet(&app, &token, r#"{"nome":"Thor"}"#).await;
    let uri = format!("/v1/pets/{}", pet.id);

    let resp = app
        .clone()
        .oneshot(json_request("PUT", &uri, &token, r#"{"nome":"Thor","raca":"Labrador","idade":2}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Pet = body_json(resp).await;
    assert_eq!(updated.raca.as_deref(), Some("Labrador"));
    assert_eq!(updated.idade, Some(2));

    let resp = app.clone().oneshot(authed("DELETE", &uri, &token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.clone().oneshot(authed("GET", &uri, &token)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
