use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::services::ServeDir;

use crate::{
    fields::image::MAX_IMAGE_BYTES,
    handlers::{achievement, auth, cat, upload},
    repositories::{CatRepository, UserRepository},
    serializers::{AchievementSerializer, CatSerializer, Persistence},
    storage::MediaStorage,
    utils::jwt::auth_middleware,
};

// Un base64 ocupa ~4/3 del binario; dejamos margen para el resto del JSON
const MAX_BODY_BYTES: usize = MAX_IMAGE_BYTES * 2;

#[derive(Clone)]
pub struct AppState {
    pub persistence: Persistence,
    pub users: Arc<dyn UserRepository>,
    pub serializer: Arc<CatSerializer>,
    pub achievement_serializer: AchievementSerializer,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        cats: Arc<dyn CatRepository>,
        users: Arc<dyn UserRepository>,
        media: MediaStorage,
        jwt_secret: &str,
    ) -> Self {
        let serializer = CatSerializer::new(media.base_url());
        Self {
            persistence: Persistence::new(cats, media),
            users,
            serializer: Arc::new(serializer),
            achievement_serializer: AchievementSerializer::default(),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

pub fn create_routes(state: AppState) -> Router {
    let media_url = state.persistence.media.base_url().to_string();
    let media_root = state.persistence.media.root().to_path_buf();

    // 1. Rutas públicas (todo el mundo)
    let public_routes = Router::new()
        .route("/api/cats", get(cat::list_cats_handler))
        .route("/api/cats/:id", get(cat::get_cat_handler))
        .route("/api/achievements", get(achievement::list_achievements_handler))
        .route("/api/achievements/:id", get(achievement::get_achievement_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler));

    // Si MEDIA_URL apunta a otro host (CDN), no servimos los ficheros nosotros
    let public_routes = if media_url.len() > 1 && media_url.starts_with('/') {
        public_routes.nest_service(&media_url, ServeDir::new(media_root))
    } else {
        public_routes
    };

    // 2. Rutas que escriben - requieren token
    let authenticated_routes = Router::new()
        .route("/api/cats", post(cat::create_cat_handler))
        .route(
            "/api/cats/:id",
            put(cat::replace_cat_handler)
                .patch(cat::patch_cat_handler)
                .delete(cat::delete_cat_handler),
        )
        .route("/api/cats/:id/image", put(upload::upload_cat_image_handler))
        .route("/api/achievements", post(achievement::create_achievement_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Fusionamos todo
    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        fields::image::samples,
        models::user::{NewUser, User},
        repositories::InMemoryRepository,
        utils::jwt::issue_token,
    };

    const SECRET: &str = "test-secret";

    struct TestApp {
        _dir: TempDir,
        repo: Arc<InMemoryRepository>,
        router: Router,
    }

    fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState::new(
            repo.clone(),
            repo.clone(),
            MediaStorage::new(dir.path(), "/uploads"),
            SECRET,
        );
        TestApp {
            _dir: dir,
            repo,
            router: create_routes(state),
        }
    }

    impl TestApp {
        async fn user(&self, username: &str, role: &str) -> (User, String) {
            let user = self
                .repo
                .create_user(NewUser {
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    password_hash: String::new(),
                    role: role.to_string(),
                })
                .await
                .unwrap();
            let token = issue_token(SECRET, &user).unwrap();
            (user, token)
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {token}"));
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header("content-type", "application/json");
                    Body::from(json.to_string())
                }
                None => Body::empty(),
            };
            self.router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn tom() -> Value {
        json!({
            "name": "Tom",
            "color": "#000000",
            "birth_year": 2018,
            "achievements": [{"achievement_name": "hunter"}]
        })
    }

    #[tokio::test]
    async fn creating_requires_a_token() {
        let app = app();

        let response = app.send("POST", "/api/cats", None, Some(tom())).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_returns_the_serialized_cat() {
        let app = app();
        let (user, token) = app.user("ana", "editor").await;

        let response = app.send("POST", "/api/cats", Some(&token), Some(tom())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        assert_eq!(body["name"], "Tom");
        assert_eq!(body["color"], "black");
        assert_eq!(body["owner"], user.id);
        assert_eq!(body["achievements"][0]["achievement_name"], "hunter");
        assert_eq!(body["image"], Value::Null);
        assert!(body["age"].is_i64());
    }

    #[tokio::test]
    async fn unknown_color_is_a_bad_request() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;
        let mut payload = tom();
        payload["color"] = json!("#123456");

        let response = app.send("POST", "/api/cats", Some(&token), Some(payload)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"color": ["no name exists for this color."]})
        );
    }

    #[tokio::test]
    async fn only_the_owner_can_modify_a_cat() {
        let app = app();
        let (_, owner_token) = app.user("ana", "editor").await;
        let (_, other_token) = app.user("bob", "editor").await;
        let created = json_body(app.send("POST", "/api/cats", Some(&owner_token), Some(tom())).await).await;
        let uri = format!("/api/cats/{}", created["id"]);

        let response = app
            .send("PATCH", &uri, Some(&other_token), Some(json!({"name": "Stolen"})))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send("PATCH", &uri, Some(&owner_token), Some(json!({"name": "Tommy"})))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["name"], "Tommy");
        assert_eq!(body["birth_year"], 2018);
        assert_eq!(body["achievements"][0]["achievement_name"], "hunter");
    }

    #[tokio::test]
    async fn admins_can_modify_any_cat() {
        let app = app();
        let (_, owner_token) = app.user("ana", "editor").await;
        let (_, admin_token) = app.user("root", "admin").await;
        let created = json_body(app.send("POST", "/api/cats", Some(&owner_token), Some(tom())).await).await;
        let uri = format!("/api/cats/{}", created["id"]);

        let response = app
            .send("PATCH", &uri, Some(&admin_token), Some(json!({"achievements": []})))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["achievements"], json!([]));
    }

    #[tokio::test]
    async fn put_requires_every_writable_field() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;
        let created = json_body(app.send("POST", "/api/cats", Some(&token), Some(tom())).await).await;
        let uri = format!("/api/cats/{}", created["id"]);

        let response = app.send("PUT", &uri, Some(&token), Some(json!({"name": "Tommy"}))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["color"], json!(["This field is required."]));
        assert_eq!(body["birth_year"], json!(["This field is required."]));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;
        let created = json_body(app.send("POST", "/api/cats", Some(&token), Some(tom())).await).await;
        let uri = format!("/api/cats/{}", created["id"]);

        let response = app.send("DELETE", &uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.send("GET", &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, json!({"detail": "Not found."}));
    }

    #[tokio::test]
    async fn achievements_are_listed_and_reused() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;
        app.send("POST", "/api/cats", Some(&token), Some(tom())).await;

        let response = app
            .send(
                "POST",
                "/api/achievements",
                Some(&token),
                Some(json!({"achievement_name": "hunter"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let list = json_body(app.send("GET", "/api/achievements", None, None).await).await;
        assert_eq!(list, json!([{"id": 1, "achievement_name": "hunter"}]));
    }

    #[tokio::test]
    async fn first_registered_user_is_admin_and_can_log_in() {
        let app = app();
        let register = json!({"username": "ana", "email": "ana@example.com", "password": "miau123"});

        let response = app.send("POST", "/api/auth/register", None, Some(register)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let user = json_body(response).await;
        assert_eq!(user["role"], "admin");
        assert!(user.get("password_hash").is_none());

        let response = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "ana@example.com", "password": "miau123"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let auth = json_body(response).await;
        assert_eq!(auth["token_type"], "Bearer");

        let token = auth["token"].as_str().unwrap();
        let response = app.send("POST", "/api/cats", Some(token), Some(tom())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn later_registrations_need_an_admin_token() {
        let app = app();
        let (_, editor_token) = app.user("ana", "editor").await;
        let register = json!({"username": "bob", "email": "bob@example.com", "password": "x"});

        let response = app
            .send("POST", "/api/auth/register", None, Some(register.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .send("POST", "/api/auth/register", Some(&editor_token), Some(register))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = app();
        let register = json!({"username": "ana", "email": "ana@example.com", "password": "miau123"});
        app.send("POST", "/api/auth/register", None, Some(register)).await;

        let response = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": "ana@example.com", "password": "nope"})),
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn multipart_image(filename: &str, content: &[u8]) -> (String, Vec<u8>) {
        let boundary = "XBOUNDARYX";
        let mut body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    async fn upload(app: &TestApp, token: &str, cat_id: &Value, content: &[u8]) -> Response {
        let (content_type, body) = multipart_image("cat.png", content);
        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/cats/{cat_id}/image"))
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        app.router.clone().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn multipart_upload_stores_the_image() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;
        let created = json_body(app.send("POST", "/api/cats", Some(&token), Some(tom())).await).await;

        let response = upload(&app, &token, &created["id"], &samples::png()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let cat = json_body(response).await;
        let url = cat["image"].as_str().unwrap();
        assert!(url.starts_with("/uploads/cats/images/"));
        assert!(url.ends_with(".png"));
    }

    #[tokio::test]
    async fn multipart_upload_rejects_non_images() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;
        let created = json_body(app.send("POST", "/api/cats", Some(&token), Some(tom())).await).await;

        let response = upload(&app, &token, &created["id"], b"PNGDATA").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"image": ["Upload a valid image. The file you uploaded was either not an image or a corrupted image."]})
        );
    }

    #[tokio::test]
    async fn malformed_json_gets_a_json_error() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/cats")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn missing_content_type_is_unsupported_media_type() {
        let app = app();
        let (_, token) = app.user("ana", "editor").await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/cats")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(tom().to_string()))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(json_body(response).await["detail"].is_string());
    }
}
