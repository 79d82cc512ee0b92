use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use careerlink_api::app::{build_app, AppServices};
use careerlink_auth::{hash_password, AdminProfile, AdminRole, Principal, PrincipalId, Role};
use careerlink_infra::directory::InMemoryUserDirectory;
use careerlink_infra::AppConfig;

const JWT_SECRET: &str = "test-secret";
const PASSWORD: &str = "correct horse battery staple";

// Argon2 is slow in debug builds; hash once per test binary.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

struct TestServer {
    base_url: String,
    services: AppServices,
    directory: Arc<InMemoryUserDirectory>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
    _background: careerlink_infra::BackgroundQueueHandle,
}

impl TestServer {
    async fn spawn() -> Self {
        let config = AppConfig::from_lookup(|key| match key {
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let directory = Arc::new(InMemoryUserDirectory::new());
        let (services, background) =
            AppServices::in_memory(&config, directory.clone()).expect("failed to wire services");

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            services,
            directory,
            client: reqwest::Client::new(),
            handle,
            _background: background,
        }
    }

    fn seed(&self, role: Role, sub_role: Option<AdminRole>, active: bool) -> Principal {
        let id = PrincipalId::new();
        let principal = Principal {
            id,
            username: format!("user-{}", id),
            email: format!("{}@example.com", id),
            role,
            is_active: active,
            avatar: None,
        };
        let admin = sub_role.map(|sub_role| AdminProfile {
            admin_id: Uuid::now_v7(),
            sub_role,
            is_active: true,
        });
        self.directory.insert(principal.clone(), admin, password_hash()).unwrap();
        principal
    }

    fn token_for(&self, principal: &Principal) -> String {
        self.services
            .tokens
            .create_token(&principal.id.to_string(), &principal.email, ChronoDuration::minutes(10))
            .unwrap()
            .token
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(format!("{}{}", self.base_url, path)).json(&body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get_with_header(&self, path: &str, authorization: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn settle(&self) {
        self.services.background.wait_idle().await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn missing_or_malformed_credentials_are_rejected() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/user", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "missing credential" }));

    let (status, body) = srv.get_with_header("/user", "Token abc").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid format");

    let (status, body) = srv.get_with_header("/user", "Bearer").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid format");

    let (status, body) = srv.get("/user", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid or expired token");
}

#[tokio::test]
async fn expired_token_is_rejected_without_directory_access() {
    let srv = TestServer::spawn().await;
    let user = srv.seed(Role::JobSeeker, None, true);

    let issued = srv
        .services
        .tokens
        .create_token_at(
            &user.id.to_string(),
            &user.email,
            ChronoDuration::minutes(5),
            Utc::now() - ChronoDuration::hours(1),
        )
        .unwrap();

    let (status, body) = srv.get("/user", Some(&issued.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid or expired token");
    assert_eq!(srv.directory.id_lookups(), 0);
}

#[tokio::test]
async fn unknown_subject_is_not_found() {
    let srv = TestServer::spawn().await;
    let token = srv
        .services
        .tokens
        .create_token(&PrincipalId::new().to_string(), "ghost@example.com", ChronoDuration::minutes(10))
        .unwrap()
        .token;

    let (status, body) = srv.get("/user", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "principal not found");

    let token = srv
        .services
        .tokens
        .create_token("not-a-uuid", "ghost@example.com", ChronoDuration::minutes(10))
        .unwrap()
        .token;
    let (status, body) = srv.get("/user", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid subject");
}

#[tokio::test]
async fn role_guards_gate_route_groups() {
    let srv = TestServer::spawn().await;
    let seeker = srv.seed(Role::JobSeeker, None, true);
    let token = srv.token_for(&seeker);

    let (status, body) = srv.get("/job-seeker/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], seeker.id.to_string());
    assert_eq!(body["user"]["role"], "job_seeker");

    let (status, body) = srv.get("/company", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "company role required");

    let (status, body) = srv.get(&format!("/admin/users/{}", seeker.id), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "admin role required");
}

#[tokio::test]
async fn super_admin_routes_require_sub_role() {
    let srv = TestServer::spawn().await;
    let viewer = srv.seed(Role::Admin, Some(AdminRole::Viewer), true);
    let root = srv.seed(Role::Admin, Some(AdminRole::Super), true);
    let company = srv.seed(Role::Company, None, true);

    let viewer_token = srv.token_for(&viewer);
    let (status, body) = srv.get(&format!("/admin/users/{}", company.id), Some(&viewer_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], company.email);

    let (status, body) = srv.get("/admin/system/background", Some(&viewer_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "super admin role required");

    let (status, body) = srv.get("/admin/system/background", Some(&srv.token_for(&root))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["submitted"].is_u64());
}

#[tokio::test]
async fn admin_user_lookup_errors() {
    let srv = TestServer::spawn().await;
    let admin = srv.seed(Role::Admin, Some(AdminRole::Admin), true);
    let token = srv.token_for(&admin);

    let (status, body) = srv.get(&format!("/admin/users/{}", PrincipalId::new()), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user not found");

    let (status, body) = srv.get("/admin/users/42", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid user id");
}

#[tokio::test]
async fn repeated_requests_are_served_from_cache() {
    let srv = TestServer::spawn().await;
    let user = srv.seed(Role::Company, None, true);
    let token = srv.token_for(&user);

    let (status, _) = srv.get("/company", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    srv.settle().await;

    for _ in 0..3 {
        let (status, body) = srv.get("/user", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], user.id.to_string());
    }
    assert_eq!(srv.directory.id_lookups(), 1);
}

#[tokio::test]
async fn concurrent_first_requests_all_succeed() {
    let srv = Arc::new(TestServer::spawn().await);
    let user = srv.seed(Role::JobSeeker, None, true);
    let token = srv.token_for(&user);

    let mut set = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let srv = srv.clone();
        let token = token.clone();
        set.spawn(async move { srv.get("/job-seeker/profile", Some(&token)).await.0 });
    }
    while let Some(status) = set.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    srv.settle().await;
    let before = srv.directory.id_lookups();
    let (status, _) = srv.get("/user", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(srv.directory.id_lookups(), before);
}

#[tokio::test]
async fn directory_outage_fails_closed_on_miss_only() {
    let srv = TestServer::spawn().await;
    let cached = srv.seed(Role::JobSeeker, None, true);
    let uncached = srv.seed(Role::JobSeeker, None, true);

    let cached_token = srv.token_for(&cached);
    let (status, _) = srv.get("/user", Some(&cached_token)).await;
    assert_eq!(status, StatusCode::OK);
    srv.settle().await;

    srv.directory.set_offline(true);

    let (status, _) = srv.get("/user", Some(&cached_token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv.get("/user", Some(&srv.token_for(&uncached))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "principal not found");
}

#[tokio::test]
async fn login_issues_a_working_token_and_warms_the_cache() {
    let srv = TestServer::spawn().await;
    let user = srv.seed(Role::Company, None, true);

    let (status, body) = srv
        .post("/login", None, json!({ "email": user.email, "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["expires_at"].is_string());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = srv.get("/company", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], user.username);
    assert_eq!(srv.directory.id_lookups(), 0);

    let (status, _) = srv
        .post("/login", None, json!({ "username": user.username, "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_rejections() {
    let srv = TestServer::spawn().await;
    let active = srv.seed(Role::JobSeeker, None, true);
    let inactive = srv.seed(Role::JobSeeker, None, false);

    let (status, body) = srv
        .post("/login", None, json!({ "email": active.email, "password": "wrong" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid credentials");

    let (status, body) = srv
        .post("/login", None, json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid credentials");

    let (status, body) = srv
        .post("/login", None, json!({ "email": inactive.email, "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "user is not active");

    let (status, body) = srv.post("/login", None, json!({ "password": PASSWORD })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email or username is required");

    let (status, body) = srv.post("/login", None, json!({ "email": active.email })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid request payload");
}

#[tokio::test]
async fn sixth_login_from_one_address_is_throttled() {
    let srv = TestServer::spawn().await;
    let user = srv.seed(Role::JobSeeker, None, true);

    for _ in 0..5 {
        let (status, _) = srv
            .post("/login", None, json!({ "email": user.email, "password": "wrong" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused once the window is spent.
    let (status, body) = srv
        .post("/login", None, json!({ "email": user.email, "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too many authentication attempts, please try again later");

    // Other endpoints are not throttled.
    let (status, _) = srv.get("/user", Some(&srv.token_for(&user))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_outcomes_are_counted() {
    let srv = TestServer::spawn().await;
    let active = srv.seed(Role::JobSeeker, None, true);
    let inactive = srv.seed(Role::JobSeeker, None, false);
    let root = srv.seed(Role::Admin, Some(AdminRole::Super), true);

    for (email, password) in [
        (active.email.as_str(), PASSWORD),
        (active.email.as_str(), "wrong"),
        ("nobody@example.com", PASSWORD),
        (inactive.email.as_str(), PASSWORD),
    ] {
        srv.post("/login", None, json!({ "email": email, "password": password })).await;
    }
    // Malformed payloads are rejected before they count.
    srv.post("/login", None, json!({ "password": PASSWORD })).await;

    let (status, body) = srv.get("/admin/system/logins", Some(&srv.token_for(&root))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": 1, "invalid_credentials": 2, "inactive": 1, "server_error": 0 })
    );
}

#[tokio::test]
async fn unmatched_requests_get_json_errors() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");

    let (status, body) = srv.post("/health", None, json!({})).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "method not allowed");
}

#[tokio::test]
async fn logout_clears_cache_but_token_stays_valid() {
    let srv = TestServer::spawn().await;
    let user = srv.seed(Role::JobSeeker, None, true);
    let token = srv.token_for(&user);

    let (status, _) = srv.get("/user", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    srv.settle().await;
    assert_eq!(srv.directory.id_lookups(), 1);

    let (status, body) = srv.post("/logout", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "logged out");
    srv.settle().await;
    assert!(srv.services.sessions.lookup(user.id).await.is_none());

    // Tokens are stateless: the next request re-resolves from the directory.
    let (status, _) = srv.get("/user", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(srv.directory.id_lookups(), 2);
}

#[tokio::test]
async fn health_reflects_dependencies() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));

    srv.directory.set_offline(true);
    let (status, body) = srv.get("/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "status": "unhealthy" }));
}
