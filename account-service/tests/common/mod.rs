use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use account_service::config::Config;
use account_service::config::RunMode;
use account_service::domain::session::service::SessionService;
use account_service::domain::user::errors::UserError;
use account_service::domain::user::models::EmailAddress;
use account_service::domain::user::models::User;
use account_service::domain::user::models::UserId;
use account_service::domain::user::models::Username;
use account_service::domain::user::ports::UserRepository;
use account_service::domain::user::service::UserService;
use account_service::inbound::http::create_router;
use account_service::inbound::http::AppState;
use account_service::outbound::repositories::InMemoryUserRepository;
use account_service::outbound::sessions::InMemorySessionStore;
use async_trait::async_trait;
use auth::Authenticator;

pub const PASSWORD: &str = "Correct-Horse-42";

/// In-memory repository that counts credential lookups
#[derive(Default)]
pub struct CountingUserRepository {
    inner: InMemoryUserRepository,
    email_lookups: AtomicUsize,
}

impl CountingUserRepository {
    pub fn email_lookups(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for CountingUserRepository {
    async fn create(&self, user: User) -> Result<User, UserError> {
        self.inner.create(user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_email(email).await
    }

    async fn update(&self, user: User) -> Result<User, UserError> {
        self.inner.update(user).await
    }
}

/// Test application that spawns a real server backed by in-memory storage
pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub users: Arc<CountingUserRepository>,
}

impl TestApp {
    /// Spawn the application with development defaults
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn the application after adjusting its configuration
    pub async fn spawn_with(configure: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::for_environment(RunMode::Development);
        config.database.url = "memory://".to_string();
        config.security.secret_key = "test-secret-key-for-session-signing".to_string();
        // Cheap hashing keeps the suite fast
        config.password.hash_memory_kib = 1024;
        config.password.hash_iterations = 1;
        configure(&mut config);
        let config = Arc::new(config.finalize().expect("Invalid test configuration"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let authenticator = Arc::new(
            Authenticator::new(config.security.secret_key.as_bytes())
                .with_password_hasher(config.password.hasher().expect("Invalid hasher params"))
                .with_password_policy(config.password.policy()),
        );

        let users = Arc::new(CountingUserRepository::default());
        let user_service = Arc::new(UserService::new(
            Arc::clone(&users),
            Arc::clone(&authenticator),
        ));
        let sessions = Arc::new(SessionService::new(
            Arc::new(InMemorySessionStore::new()),
            authenticator,
            config.security.session_lifetime(),
            config.security.remember_duration(),
        ));

        let state = AppState::new(config, user_service, sessions);
        let router = create_router(state).expect("Failed to build router");

        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            api_client: Self::client(),
            users,
        }
    }

    /// Browser-like client: keeps cookies, does not follow redirects
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create reqwest client")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(self.url(path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(self.url(path))
    }

    /// Load a form page and return its CSRF token
    pub async fn csrf_token(&self, path: &str) -> String {
        let page = self
            .get(path)
            .send()
            .await
            .expect("Failed to execute request")
            .text()
            .await
            .expect("Failed to read body");
        scrape_csrf_token(&page).unwrap_or_else(|| panic!("No CSRF token on {}", path))
    }

    /// Submit a form the way a browser would: load the page, then post it
    /// with the page's CSRF token
    pub async fn submit(&self, path: &str, fields: &[(&str, &str)]) -> reqwest::Response {
        let token = self.csrf_token(path).await;
        let mut form: Vec<(&str, &str)> = fields.to_vec();
        form.push(("csrf_token", token.as_str()));

        self.post(path)
            .form(&form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> reqwest::Response {
        self.submit(
            "/register",
            &[
                ("username", username),
                ("email", email),
                ("password", password),
                ("confirm_password", password),
            ],
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.submit("/login", &[("email", email), ("password", password)])
            .await
    }

    pub async fn stored_users(&self) -> usize {
        self.users.inner.len().await
    }
}

pub fn scrape_csrf_token(page: &str) -> Option<String> {
    let marker = r#"name="csrf_token" value=""#;
    let start = page.find(marker)? + marker.len();
    let end = page[start..].find('"')?;
    Some(page[start..end + start].to_string())
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("No Location header")
        .to_str()
        .unwrap()
        .to_string()
}
