mod common;

use std::time::Duration;

use account_service::config::RateLimit;
use account_service::config::RunMode;
use common::location;
use common::TestApp;
use common::PASSWORD;
use reqwest::header;
use reqwest::StatusCode;

#[tokio::test]
async fn test_register_success() {
    let app = TestApp::spawn().await;

    let response = app.register("alice", "alice@example.com", PASSWORD).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(app.stored_users().await, 1);

    let page = app.get("/login").send().await.unwrap().text().await.unwrap();
    assert!(page.contains("Your account has been created! You can now log in."));
}

#[tokio::test]
async fn test_register_weak_password() {
    let app = TestApp::spawn().await;

    let response = app.register("alice", "alice@example.com", "short").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.unwrap();
    assert!(page.contains("Password must be at least 12 characters long."));
    assert_eq!(app.stored_users().await, 0);
}

#[tokio::test]
async fn test_register_password_mismatch() {
    let app = TestApp::spawn().await;

    let response = app
        .submit(
            "/register",
            &[
                ("username", "alice"),
                ("email", "alice@example.com"),
                ("password", PASSWORD),
                ("confirm_password", "Correct-Horse-43"),
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().await.unwrap().contains("Passwords must match."));
}

#[tokio::test]
async fn test_register_invalid_fields_echo_values() {
    let app = TestApp::spawn().await;

    let response = app.register("a", "not-an-email", PASSWORD).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let page = response.text().await.unwrap();
    assert!(page.contains("Invalid email address."));
    assert!(page.contains(r#"value="not-an-email""#));
    assert!(!page.contains(PASSWORD));
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let app = TestApp::spawn().await;

    app.register("alice", "alice@example.com", PASSWORD).await;

    // Email comparison ignores case
    let response = app.register("bob", "ALICE@example.com", PASSWORD).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("That email is already registered. Please choose a different one."));
    assert_eq!(app.stored_users().await, 1);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = TestApp::spawn().await;

    app.register("alice", "alice@example.com", PASSWORD).await;
    let response = app.register("alice", "other@example.com", PASSWORD).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("That username is already taken. Please choose a different one."));
}

#[tokio::test]
async fn test_concurrent_registrations_store_one_account() {
    let app = TestApp::spawn_with(|config| {
        config.rate_limit.register = RateLimit::new(100, Duration::from_secs(3600));
    })
    .await;

    let token = app.csrf_token("/register").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = app.api_client.clone();
        let url = app.url("/register");
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            let username = format!("user{}", i);
            client
                .post(url)
                .form(&[
                    ("username", username.as_str()),
                    ("email", "same@example.com"),
                    ("password", PASSWORD),
                    ("confirm_password", PASSWORD),
                    ("csrf_token", token.as_str()),
                ])
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    let created = statuses
        .iter()
        .filter(|status| **status == StatusCode::SEE_OTHER)
        .count();
    let rejected = statuses
        .iter()
        .filter(|status| **status == StatusCode::UNPROCESSABLE_ENTITY)
        .count();

    assert_eq!(created, 1);
    assert_eq!(rejected, 7);
    assert_eq!(app.stored_users().await, 1);
}

#[tokio::test]
async fn test_login_failure_is_indistinguishable() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;

    let unknown = app.login("nobody@example.com", PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::OK);
    let unknown_page = unknown.text().await.unwrap();

    let wrong = app.login("alice@example.com", "Wrong-Password-1").await;
    assert_eq!(wrong.status(), StatusCode::OK);
    let wrong_page = wrong.text().await.unwrap();

    let message = "Login unsuccessful. Please check email and password.";
    assert!(unknown_page.contains(message));
    assert!(wrong_page.contains(message));

    // Still anonymous
    let response = app.get("/dashboard").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;

    let response = app.login("alice@example.com", PASSWORD).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let response = app.get("/dashboard").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("Hello, alice!"));
    assert!(page.contains("Login successful!"));
}

#[tokio::test]
async fn test_login_missing_fields() {
    let app = TestApp::spawn().await;

    let response = app
        .submit("/login", &[("email", ""), ("password", "")])
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("This field is required."));
}

#[tokio::test]
async fn test_login_follows_local_next() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;

    let response = app
        .submit(
            "/login?next=/profile",
            &[("email", "alice@example.com"), ("password", PASSWORD)],
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");
}

#[tokio::test]
async fn test_login_ignores_external_next() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;

    for next in ["https://evil.example.com/", "//evil.example.com/"] {
        let response = app
            .submit(
                &format!("/login?next={}", next),
                &[("email", "alice@example.com"), ("password", PASSWORD)],
            )
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");

        app.get("/logout").send().await.unwrap();
    }
}

#[tokio::test]
async fn test_authenticated_visitor_redirected_from_forms() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;
    app.login("alice@example.com", PASSWORD).await;

    for path in ["/login", "/register"] {
        let response = app.get(path).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard");
    }
}

#[tokio::test]
async fn test_logout_then_protected_route_redirects_to_login() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;
    app.login("alice@example.com", PASSWORD).await;

    let response = app.get("/logout").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = app.get("/dashboard").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=/dashboard");

    let page = app.get("/login").send().await.unwrap().text().await.unwrap();
    assert!(page.contains("You have been logged out."));
    assert!(page.contains("Please log in to access this page."));
}

#[tokio::test]
async fn test_anonymous_redirect_keeps_query() {
    let app = TestApp::spawn().await;

    let response = app.get("/profile?tab=1").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=/profile%3Ftab%3D1");
}

#[tokio::test]
async fn test_profile_update_with_blank_password_keeps_password() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;
    app.login("alice@example.com", PASSWORD).await;

    let page = app.get("/profile").send().await.unwrap().text().await.unwrap();
    assert!(page.contains(r#"value="alice@example.com""#));

    let response = app
        .submit(
            "/profile",
            &[
                ("username", "alice2"),
                ("email", "alice@example.com"),
                ("password", ""),
                ("confirm_password", ""),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile");

    let page = app.get("/profile").send().await.unwrap().text().await.unwrap();
    assert!(page.contains("Your profile has been updated!"));
    assert!(page.contains(r#"value="alice2""#));

    app.get("/logout").send().await.unwrap();
    let response = app.login("alice@example.com", PASSWORD).await;
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_profile_password_change() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;
    app.login("alice@example.com", PASSWORD).await;

    let new_password = "Brand-New-Secret-7";
    let response = app
        .submit(
            "/profile",
            &[
                ("username", "alice"),
                ("email", "alice@example.com"),
                ("password", new_password),
                ("confirm_password", new_password),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    app.get("/logout").send().await.unwrap();

    let response = app.login("alice@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.login("alice@example.com", new_password).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_profile_rejects_username_of_another_user() {
    let app = TestApp::spawn().await;
    app.register("alice", "alice@example.com", PASSWORD).await;
    app.register("bob", "bob@example.com", PASSWORD).await;
    app.login("bob@example.com", PASSWORD).await;

    let response = app
        .submit(
            "/profile",
            &[
                ("username", "alice"),
                ("email", "bob@example.com"),
                ("password", ""),
                ("confirm_password", ""),
            ],
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("That username is already taken. Please choose a different one."));
}

#[tokio::test]
async fn test_sixth_login_attempt_is_rate_limited() {
    let app = TestApp::spawn().await;
    let token = app.csrf_token("/login").await;

    let attempt = || {
        app.post("/login")
            .form(&[
                ("email", "alice@example.com"),
                ("password", "Wrong-Password-1"),
                ("csrf_token", token.as_str()),
            ])
            .send()
    };

    for _ in 0..5 {
        let response = attempt().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(app.users.email_lookups(), 5);

    let response = attempt().await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // Rejected before credentials are looked up
    assert_eq!(app.users.email_lookups(), 5);

    // Reading the form is not limited by the login quota
    let response = app.get("/login").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_without_csrf_token_rejected() {
    let app = TestApp::spawn().await;

    // Session exists but the token is missing
    app.get("/register").send().await.unwrap();
    let response = app
        .post("/register")
        .form(&[
            ("username", "alice"),
            ("email", "alice@example.com"),
            ("password", PASSWORD),
            ("confirm_password", PASSWORD),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.stored_users().await, 0);

    // Token from another session
    let other = TestApp::client();
    let page = other
        .get(app.url("/register"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let foreign_token = common::scrape_csrf_token(&page).unwrap();

    let response = app
        .post("/register")
        .form(&[
            ("username", "alice"),
            ("email", "alice@example.com"),
            ("password", PASSWORD),
            ("confirm_password", PASSWORD),
            ("csrf_token", foreign_token.as_str()),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::spawn().await;

    let response = app.get("/").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let app = TestApp::spawn().await;

    let response = app.get("/").send().await.unwrap();
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("Max-Age"));

    app.register("alice", "alice@example.com", PASSWORD).await;
    let response = app
        .submit(
            "/login",
            &[
                ("email", "alice@example.com"),
                ("password", PASSWORD),
                ("remember", "y"),
            ],
        )
        .await;
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.contains("Max-Age="));
}

#[tokio::test]
async fn test_cors_mirrors_origin_with_credentials() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/")
        .header(header::ORIGIN, "http://localhost:3000")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_production_redirects_plain_http() {
    let app = TestApp::spawn_with(|config| {
        config.environment = RunMode::Production;
        config.cors.allowed_origins = vec!["https://accounts.example.com".to_string()];
    })
    .await;

    let response = app.get("/dashboard?x=1").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert!(location(&response).starts_with("https://127.0.0.1:"));
    assert!(location(&response).ends_with("/dashboard?x=1"));
    assert!(response
        .headers()
        .contains_key(header::STRICT_TRANSPORT_SECURITY));

    let response = app
        .get("/")
        .header("x-forwarded-proto", "https")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Secure"));

    let response = app.get("/health").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
