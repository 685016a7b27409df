use legacygen::config::Config;
use legacygen::events::EventBus;
use legacygen::state::AppState;
use legacygen::{app, db};
use tempfile::TempDir;

/// A server running against its own throwaway data directory.
pub struct TestServer {
    pub base_url: String,
    _data_dir: TempDir,
}

pub async fn spawn() -> TestServer {
    let data_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.database.path = Some(data_dir.path().join("test.db"));
    config.storage.path = Some(data_dir.path().join("uploads"));
    std::fs::create_dir_all(config.uploads_path()).unwrap();

    let pool = db::create_pool(config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let state = AppState {
        db: pool,
        config,
        events: EventBus::default(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        _data_dir: data_dir,
    }
}

/// A client with its own cookie jar, i.e. its own login.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap()
}

pub async fn signup(
    client: &reqwest::Client,
    base_url: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/auth/signup", base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
}

pub async fn signup_senior(client: &reqwest::Client, base_url: &str, email: &str) {
    let resp = signup(
        client,
        base_url,
        serde_json::json!({
            "email": email,
            "password": "secret123",
            "full_name": "Asha Kumari",
            "age": 68,
            "mobile_number": "9876543210",
            "role": "senior",
            "interests": ["Cooking", "Organic Farming"],
        }),
    )
    .await;
    assert_eq!(resp.status(), 201, "senior signup failed: {:?}", resp.text().await);
}

pub async fn signup_student(client: &reqwest::Client, base_url: &str, email: &str) {
    let resp = signup(
        client,
        base_url,
        serde_json::json!({
            "email": email,
            "password": "secret123",
            "full_name": "Ravi Kumar",
            "age": 15,
            "mobile_number": "9000000001",
            "role": "student",
        }),
    )
    .await;
    assert_eq!(resp.status(), 201, "student signup failed: {:?}", resp.text().await);
}

pub async fn signup_school(client: &reqwest::Client, base_url: &str, email: &str) {
    let resp = signup(
        client,
        base_url,
        serde_json::json!({
            "email": email,
            "password": "secret123",
            "full_name": "Green Valley High",
            "age": 1,
            "mobile_number": "040-1234567",
            "role": "school",
            "school_name": "Green Valley High",
            "school_email": "office@gvh.edu",
        }),
    )
    .await;
    assert_eq!(resp.status(), 201, "school signup failed: {:?}", resp.text().await);
}
