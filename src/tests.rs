//! Integration tests for the roster backend.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, StorageBackend, SyncConfig};
use crate::service::RosterService;
use crate::store::open_store;
use crate::sync::tests::{sync_config, FakeRemote};
use crate::sync::RemoteSync;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    data_dir: PathBuf,
    _temp_dir: TempDir,
}

fn test_config(temp_dir: &TempDir, psk: Option<&str>, sqlite: bool) -> Config {
    let storage = if sqlite {
        StorageBackend::Sqlite {
            db_path: temp_dir.path().join("roster.sqlite"),
        }
    } else {
        StorageBackend::Csv {
            data_dir: temp_dir.path().join("data"),
        }
    };

    Config {
        api_psk: psk.map(str::to_string),
        storage,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        log_json: false,
        sync: None,
    }
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(&temp_dir, Some("test-api-key"), false);
        Self::with_config(config, temp_dir).await
    }

    async fn with_config(config: Config, temp_dir: TempDir) -> Self {
        let store = open_store(&config.storage).await.expect("Failed to open store");
        let sync = config
            .sync
            .clone()
            .map(|c| Arc::new(RemoteSync::new(c).expect("Failed to build sync client")));
        let roster = Arc::new(
            RosterService::open(store, sync)
                .await
                .expect("Failed to load roster"),
        );

        let psk = config.api_psk.clone();
        let state = AppState {
            roster,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            data_dir: temp_dir.path().join("data"),
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit a form action and return (status, body).
    async fn act(&self, action: &str, player_id: &str, name: &str) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/api/actions"))
            .json(&json!({ "action": action, "playerId": player_id, "name": name }))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn roster(&self) -> Value {
        let resp = self
            .client
            .get(self.url("/api/roster"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

fn player_ids(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|p| p["playerId"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_required() {
    let fixture = TestFixture::new().await;
    let client = Client::new();

    // No key
    let resp = client.get(fixture.url("/api/roster")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // Wrong key
    let resp = client
        .get(fixture.url("/api/roster"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Bearer token
    let resp = client
        .get(fixture.url("/api/roster"))
        .header("authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_auth_disabled_without_psk() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir, None, false);
    let fixture = TestFixture::with_config(config, temp_dir).await;

    let resp = Client::new()
        .get(fixture.url("/api/roster"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_player_lifecycle() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.act("add", "001", "Alice").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["revisionId"], 1);
    assert_eq!(body["data"]["message"], "Alice (001) added to active players");
    assert_eq!(body["data"]["transition"]["to"], "active");
    assert_eq!(player_ids(&body["data"]["roster"]["active"]), vec!["001"]);

    let (status, body) = fixture.act("ban", "001", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["transition"]["from"], "active");
    assert_eq!(player_ids(&body["data"]["roster"]["banned"]), vec!["001"]);
    assert!(player_ids(&body["data"]["roster"]["active"]).is_empty());

    let (status, body) = fixture.act("restore", "001", "").await;
    assert_eq!(status, 200);
    assert_eq!(player_ids(&body["data"]["roster"]["active"]), vec!["001"]);
    assert!(player_ids(&body["data"]["roster"]["banned"]).is_empty());

    let (status, body) = fixture.act("remove", "001", "").await;
    assert_eq!(status, 200);
    assert_eq!(body["revisionId"], 4);

    let roster = fixture.roster().await;
    assert!(player_ids(&roster["active"]).is_empty());
    assert_eq!(player_ids(&roster["former"]), vec!["001"]);
    assert_eq!(roster["former"][0]["name"], "Alice");
    assert!(roster["former"][0]["displayTimestamp"].is_string());
}

#[tokio::test]
async fn test_duplicate_add_rejected() {
    let fixture = TestFixture::new().await;

    fixture.act("add", "002", "Bob").await;
    let before = fixture.roster().await;

    let (status, body) = fixture.act("add", "002", "Bob").await;
    assert_eq!(status, 409);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "REJECTED");
    assert_eq!(body["error"]["details"]["reason"], "already_active");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already active"));
    assert_eq!(body["revisionId"], 1);

    assert_eq!(fixture.roster().await, before);
}

#[tokio::test]
async fn test_validation_rejections() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.act("add", "003", "").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["details"]["reason"], "missing_field");

    fixture.act("add", "003", "Carol").await;
    let (status, body) = fixture.act("restore", "003", "").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["details"]["reason"], "not_banned");

    fixture.act("ban", "004", "Dave").await;
    let (status, body) = fixture.act("add", "004", "Dave").await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["details"]["reason"], "currently_banned");

    let (status, body) = fixture.act("remove", "nobody", "").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["details"]["reason"], "not_found");
}

#[tokio::test]
async fn test_clear_collection() {
    let fixture = TestFixture::new().await;
    fixture.act("add", "010", "Active One").await;
    fixture.act("ban", "011", "Banned One").await;
    fixture.act("ban", "012", "Banned Two").await;
    fixture.act("add", "013", "Former One").await;
    fixture.act("remove", "013", "").await;

    let resp = fixture
        .client
        .delete(fixture.url("/api/roster/banned"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["removed"], 2);

    let roster = fixture.roster().await;
    assert!(player_ids(&roster["banned"]).is_empty());
    assert_eq!(player_ids(&roster["active"]), vec!["010"]);
    assert_eq!(player_ids(&roster["former"]), vec!["013"]);
}

#[tokio::test]
async fn test_collection_and_player_lookup() {
    let fixture = TestFixture::new().await;
    fixture.act("ban", "020", "Spammer").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/roster/banned"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["collection"], "banned");
    assert_eq!(player_ids(&body["data"]["players"]), vec!["020"]);

    let resp = fixture
        .client
        .get(fixture.url("/api/roster/kicked"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .get(fixture.url("/api/players/020"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["collection"], "banned");
    assert_eq!(body["data"]["player"]["name"], "Spammer");

    let resp = fixture
        .client
        .get(fixture.url("/api/players/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_search() {
    let fixture = TestFixture::new().await;
    fixture.act("add", "100", "IronFist").await;
    fixture.act("ban", "101", "Iron Maiden").await;
    fixture.act("add", "102", "Copper").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/search?q=iron"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 2);
    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results[0]["collection"], "active");
    assert_eq!(results[1]["collection"], "banned");

    let resp = fixture
        .client
        .get(fixture.url("/api/search?q=iron&limit=1&offset=1"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["results"][0]["player"]["playerId"], "101");
}

#[tokio::test]
async fn test_csv_files_written_and_reloaded() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir, None, false);
    let data_dir = temp_dir.path().join("data");

    {
        let fixture = TestFixture::with_config(config.clone(), TempDir::new().unwrap()).await;
        fixture.act("add", "200", "Keeper").await;
        fixture.act("ban", "201", "Cheater").await;
    }

    let banned = std::fs::read_to_string(data_dir.join("banned_players.csv")).unwrap();
    assert!(banned.starts_with("Name,ID,Banned On\nCheater,201,"));
    assert!(data_dir.join("former_players.csv").exists());

    // A fresh process sees the same roster
    let store = open_store(&config.storage).await.unwrap();
    let service = RosterService::open(store, None).await.unwrap();
    let (location, _) = service.locate("200").await;
    assert_eq!(location.unwrap().collection, crate::models::Collection::Active);
}

#[tokio::test]
async fn test_sqlite_backend() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir, None, true);
    let fixture = TestFixture::with_config(config, temp_dir).await;

    let (status, _) = fixture.act("add", "300", "Lancer").await;
    assert_eq!(status, 200);
    let (status, _) = fixture.act("remove", "300", "").await;
    assert_eq!(status, 200);

    let roster = fixture.roster().await;
    assert_eq!(player_ids(&roster["former"]), vec!["300"]);
}

#[tokio::test]
async fn test_persistence_failure_is_fatal_and_leaves_roster() {
    let fixture = TestFixture::new().await;
    fixture.act("add", "400", "Scout").await;

    // Replace the data directory with a plain file so the next write fails
    std::fs::remove_dir_all(&fixture.data_dir).unwrap();
    std::fs::write(&fixture.data_dir, "not a directory").unwrap();

    let (status, body) = fixture.act("ban", "400", "").await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");
    assert_eq!(body["revisionId"], 1);

    let roster = fixture.roster().await;
    assert_eq!(player_ids(&roster["active"]), vec!["400"]);
    assert!(player_ids(&roster["banned"]).is_empty());
}

#[tokio::test]
async fn test_partial_write_leaves_files_intact() {
    let fixture = TestFixture::new().await;
    fixture.act("add", "401", "Ranger").await;

    // Active stages fine, banned cannot be written
    std::fs::create_dir(fixture.data_dir.join("banned_players.csv.tmp")).unwrap();

    let (status, body) = fixture.act("ban", "401", "").await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");

    let store = open_store(&StorageBackend::Csv {
        data_dir: fixture.data_dir.clone(),
    })
    .await
    .unwrap();
    let reloaded = store.load().await.unwrap();
    assert_eq!(
        reloaded.locate("401").map(|(collection, _)| collection),
        Some(crate::models::Collection::Active)
    );
}

#[tokio::test]
async fn test_sync_not_configured() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_manual_sync_pushes_files() {
    let remote = FakeRemote::new("gh-token");
    let remote_url = remote.clone().serve().await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir, Some("test-api-key"), false);
    config.sync = Some(SyncConfig {
        on_save: false,
        ..sync_config(&remote_url, "gh-token")
    });
    let fixture = TestFixture::with_config(config, temp_dir).await;

    let (_, body) = fixture.act("ban", "500", "Botter").await;
    assert!(body["data"].get("sync").is_none());
    assert!(remote.files.lock().unwrap().is_empty());

    let resp = fixture
        .client
        .post(fixture.url("/api/sync"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let outcomes = body["data"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o["success"] == true));
    assert!(remote
        .file_text("banned_players.csv")
        .unwrap()
        .contains("Botter,500,"));
}
