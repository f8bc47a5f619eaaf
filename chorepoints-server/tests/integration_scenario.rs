use axum::http::StatusCode;
use chorepoints_server::{server, storage};
use chorepoints_shared::api::{BulkAction, endpoints};
use chorepoints_shared::domain::{Child, Chore, MapTheme, Reward};
use reqwest::Client;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;

const PARENT: &str = "mom";
const PARENT_PWD: &str = "secret123";
const OTHER_PARENT: &str = "dad";
const OTHER_PWD: &str = "hunter22";
const KID_PIN: &str = "1234";

struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let (addr, handle) = match start_server(&db_path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            _tempdir: dir,
        })
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let body = self
            .request_expect(
                "POST",
                &endpoints::auth_login(&self.base),
                None,
                Some(json!({"username": username, "password": password})),
                StatusCode::OK,
            )
            .await;
        token_of(&body)
    }

    async fn kid_login(&self, child_id: i64, pin: &str) -> String {
        let body = self
            .request_expect(
                "POST",
                &endpoints::auth_kid_login(&self.base),
                None,
                Some(json!({"child_id": child_id, "pin": pin})),
                StatusCode::OK,
            )
            .await;
        assert_eq!(body["child_id"].as_i64(), Some(child_id));
        token_of(&body)
    }

    async fn request(
        &self,
        method: &str,
        url: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = match method {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        url: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, url, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {url} returned {status:?} with body {value:?}",
        );
        value
    }

    /// Id of the named child as seen by `token`'s parent.
    async fn child_id(&self, token: &str, name: &str) -> i64 {
        let list = self
            .request_expect(
                "GET",
                &endpoints::children(&self.base),
                Some(token),
                None,
                StatusCode::OK,
            )
            .await;
        list.as_array()
            .unwrap()
            .iter()
            .find(|c| c["display_name"] == name)
            .and_then(|c| c["id"].as_i64())
            .unwrap_or_else(|| panic!("child {name} not listed"))
    }

    async fn id_by_title(&self, token: &str, url: &str, title: &str) -> i64 {
        let list = self
            .request_expect("GET", url, Some(token), None, StatusCode::OK)
            .await;
        list.as_array()
            .unwrap()
            .iter()
            .find(|c| c["title"] == title)
            .and_then(|c| c["id"].as_i64())
            .unwrap_or_else(|| panic!("{title} not listed"))
    }

    async fn chore_id(&self, token: &str, title: &str) -> i64 {
        self.id_by_title(token, &endpoints::chores(&self.base), title)
            .await
    }

    async fn reward_id(&self, token: &str, title: &str) -> i64 {
        self.id_by_title(token, &endpoints::rewards(&self.base), title)
            .await
    }

    async fn complete(&self, kid: &str, child: i64, chore: i64) -> (StatusCode, Value) {
        self.request(
            "POST",
            &endpoints::complete_chore(&self.base, child as i32, chore as i32),
            Some(kid),
            None,
        )
        .await
    }

    async fn redeem(&self, kid: &str, child: i64, reward: i64) -> (StatusCode, Value) {
        self.request(
            "POST",
            &endpoints::redeem_reward(&self.base, child as i32, reward as i32),
            Some(kid),
            None,
        )
        .await
    }

    async fn decide_chore(&self, parent: &str, log_id: i64, action: BulkAction) -> Value {
        self.request_expect(
            "POST",
            &endpoints::chore_decision(&self.base, log_id as i32, action),
            Some(parent),
            None,
            StatusCode::OK,
        )
        .await
    }

    async fn decide_redemption(&self, parent: &str, id: i64, action: BulkAction) -> Value {
        self.request_expect(
            "POST",
            &endpoints::redemption_decision(&self.base, id as i32, action),
            Some(parent),
            None,
            StatusCode::OK,
        )
        .await
    }

    async fn child_detail(&self, token: &str, child: i64) -> Value {
        self.request_expect(
            "GET",
            &endpoints::child(&self.base, child as i32),
            Some(token),
            None,
            StatusCode::OK,
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn token_of(body: &Value) -> String {
    body.get("token")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .expect("token missing from auth response")
}

fn record_id(body: &Value) -> i64 {
    body["record"]["id"].as_i64().expect("record id")
}

async fn start_server(
    tmp_db: &Path,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    // Low cost keeps the suite fast; verify() reads the cost from the hash.
    let hash = |s: &str| bcrypt::hash(s, 4).unwrap();
    let pin_hash = hash(KID_PIN);
    let kid = |name: &str, parent: &str| Child {
        display_name: name.into(),
        parent: parent.into(),
        pin_hash: pin_hash.clone(),
        avatar_emoji: None,
        map_theme: MapTheme::Island,
    };
    let config = server::AppConfig {
        jwt_secret: "testsecret".into(),
        users: vec![
            server::UserConfig {
                username: PARENT.into(),
                password_hash: hash(PARENT_PWD),
            },
            server::UserConfig {
                username: OTHER_PARENT.into(),
                password_hash: hash(OTHER_PWD),
            },
        ],
        children: vec![
            kid("Ema", PARENT),
            kid("Luka", PARENT),
            kid("Nina", OTHER_PARENT),
        ],
        chores: vec![
            Chore {
                parent: PARENT.into(),
                title: "Dishes".into(),
                points: 10,
                icon_emoji: Some("🍽️".into()),
            },
            Chore {
                parent: PARENT.into(),
                title: "Make bed".into(),
                points: 5,
                icon_emoji: None,
            },
        ],
        rewards: vec![
            Reward {
                parent: PARENT.into(),
                title: "Sticker".into(),
                cost_points: 5,
                icon_emoji: None,
            },
            Reward {
                parent: PARENT.into(),
                title: "Cinema".into(),
                cost_points: 100,
                icon_emoji: Some("🎬".into()),
            },
        ],
        milestones: None,
        dev_cors_origin: None,
        listen_port: None,
    };

    let store = storage::Store::connect_sqlite(tmp_db.to_str().unwrap())
        .await
        .expect("db");
    store
        .seed_from_config(&config.children, &config.chores, &config.rewards)
        .await
        .expect("seed");

    let state = server::AppState::new(config, store);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

#[tokio::test]
async fn public_endpoints_and_auth_failures() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };

    let (status, body) = srv
        .request("GET", &format!("{}/healthz", srv.base), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["raw"], "ok");

    let version = srv
        .request_expect(
            "GET",
            &endpoints::version(&srv.base),
            None,
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));

    srv.request_expect(
        "GET",
        &endpoints::children(&srv.base),
        None,
        None,
        StatusCode::UNAUTHORIZED,
    )
    .await;
    srv.request_expect(
        "GET",
        &endpoints::children(&srv.base),
        Some("not-a-jwt"),
        None,
        StatusCode::UNAUTHORIZED,
    )
    .await;
    srv.request_expect(
        "POST",
        &endpoints::auth_login(&srv.base),
        None,
        Some(json!({"username": PARENT, "password": "wrong"})),
        StatusCode::UNAUTHORIZED,
    )
    .await;

    let parent = srv.login(PARENT, PARENT_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;
    let err = srv
        .request_expect(
            "POST",
            &endpoints::auth_kid_login(&srv.base),
            None,
            Some(json!({"child_id": ema, "pin": "9999"})),
            StatusCode::UNAUTHORIZED,
        )
        .await;
    assert!(err.get("error").is_some());
}

#[tokio::test]
async fn worked_example_over_http() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;
    let kid = srv.kid_login(ema, KID_PIN).await;
    let dishes = srv.chore_id(&parent, "Dishes").await;
    let sticker = srv.reward_id(&parent, "Sticker").await;

    let adj = srv
        .request_expect(
            "POST",
            &endpoints::child_adjustments(&srv.base, ema as i32),
            Some(&parent),
            Some(json!({"points": 50, "reason": "welcome"})),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(adj["account"]["points_balance"], 60);
    assert_eq!(adj["account"]["map_position"], 60);
    assert_eq!(adj["milestones"][0]["name"], "Bronze Badge");
    assert_eq!(adj["adjustment"]["parent"], PARENT);

    for _ in 0..2 {
        let (status, body) = srv.redeem(&kid, ema, sticker).await;
        assert_eq!(status, StatusCode::CREATED);
        let decision = srv
            .decide_redemption(&parent, record_id(&body), BulkAction::Approve)
            .await;
        assert_eq!(decision["outcome"], "approved");
    }

    for _ in 0..3 {
        let (status, body) = srv.complete(&kid, ema, dishes).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["record"]["status"], "PENDING");
        assert_eq!(body["record"]["points_awarded"], 10);
        let decision = srv
            .decide_chore(&parent, record_id(&body), BulkAction::Approve)
            .await;
        assert_eq!(decision["applied"], true);
    }

    let detail = srv.child_detail(&kid, ema).await;
    assert_eq!(detail["child"]["points_balance"], 80);
    assert_eq!(detail["child"]["map_position"], 90);
    assert_eq!(detail["child"]["highest_milestone"], 50);
    assert_eq!(detail["progress"]["next_milestone"]["position"], 100);
    assert_eq!(detail["progress"]["points_needed"], 10);
    assert_eq!(detail["progress"]["progress_percentage"], 80);

    let history = srv
        .request_expect(
            "GET",
            &format!(
                "{}?status=APPROVED",
                endpoints::chore_approvals(&srv.base)
            ),
            Some(&parent),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(history.as_array().unwrap().len(), 3);
    assert_eq!(history[0]["chore_title"], "Dishes");
}

#[tokio::test]
async fn decision_outcomes() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;
    let kid = srv.kid_login(ema, KID_PIN).await;
    let cinema = srv.reward_id(&parent, "Cinema").await;
    let bed = srv.chore_id(&parent, "Make bed").await;

    let (status, first) = srv.redeem(&kid, ema, cinema).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, again) = srv.redeem(&kid, ema, cinema).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["created"], false);
    assert_eq!(record_id(&again), record_id(&first));

    let refused = srv
        .decide_redemption(&parent, record_id(&first), BulkAction::Approve)
        .await;
    assert_eq!(refused["outcome"], "insufficient_balance");
    assert_eq!(refused["applied"], false);
    let counts = srv
        .request_expect(
            "GET",
            &endpoints::approvals_count(&srv.base),
            Some(&parent),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(counts["redemptions"], 1);
    assert_eq!(counts["chores"], 0);

    let rejected = srv
        .decide_redemption(&parent, record_id(&first), BulkAction::Reject)
        .await;
    assert_eq!(rejected["outcome"], "rejected");
    let twice = srv
        .decide_redemption(&parent, record_id(&first), BulkAction::Approve)
        .await;
    assert_eq!(twice["outcome"], "not_pending");

    let (_, log) = srv.complete(&kid, ema, bed).await;
    srv.request_expect(
        "POST",
        &endpoints::chore_decision(&srv.base, 9999, BulkAction::Approve),
        Some(&parent),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    srv.request_expect(
        "POST",
        &format!(
            "{}/api/v1/approvals/chores/{}/maybe",
            srv.base,
            record_id(&log)
        ),
        Some(&parent),
        None,
        StatusCode::FORBIDDEN,
    )
    .await;

    let other = srv.login(OTHER_PARENT, OTHER_PWD).await;
    srv.request_expect(
        "POST",
        &endpoints::chore_decision(&srv.base, record_id(&log) as i32, BulkAction::Approve),
        Some(&other),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    let detail = srv.child_detail(&parent, ema).await;
    assert_eq!(detail["child"]["points_balance"], 0);
}

#[tokio::test]
async fn children_are_isolated() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    let other = srv.login(OTHER_PARENT, OTHER_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;
    let luka = srv.child_id(&parent, "Luka").await;
    let nina = srv.child_id(&other, "Nina").await;
    let kid = srv.kid_login(ema, KID_PIN).await;

    // A child token only reaches its own routes.
    srv.request_expect(
        "GET",
        &endpoints::child(&srv.base, luka as i32),
        Some(&kid),
        None,
        StatusCode::FORBIDDEN,
    )
    .await;
    srv.request_expect(
        "GET",
        &endpoints::children(&srv.base),
        Some(&kid),
        None,
        StatusCode::FORBIDDEN,
    )
    .await;
    srv.request_expect(
        "GET",
        &endpoints::approvals_count(&srv.base),
        Some(&kid),
        None,
        StatusCode::FORBIDDEN,
    )
    .await;
    srv.request_expect(
        "POST",
        &endpoints::child_adjustments(&srv.base, ema as i32),
        Some(&kid),
        Some(json!({"points": 1000})),
        StatusCode::FORBIDDEN,
    )
    .await;

    // Another parent's children do not exist as far as this parent knows.
    srv.request_expect(
        "GET",
        &endpoints::child(&srv.base, nina as i32),
        Some(&parent),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    srv.request_expect(
        "POST",
        &endpoints::child_adjustments(&srv.base, nina as i32),
        Some(&parent),
        Some(json!({"points": 5})),
        StatusCode::NOT_FOUND,
    )
    .await;

    // Chores of another parent cannot be completed.
    let dishes = srv.chore_id(&parent, "Dishes").await;
    let nina_kid = srv.kid_login(nina, KID_PIN).await;
    let (status, _) = srv.complete(&nina_kid, nina, dishes).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let listed = srv
        .request_expect(
            "GET",
            &endpoints::chores(&srv.base),
            Some(&other),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn kid_home_dashboard() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;
    let kid = srv.kid_login(ema, KID_PIN).await;
    let dishes = srv.chore_id(&parent, "Dishes").await;
    let bed = srv.chore_id(&parent, "Make bed").await;
    let sticker = srv.reward_id(&parent, "Sticker").await;

    let before = chrono::Utc::now() - chrono::Duration::minutes(5);
    let (_, dishes_log) = srv.complete(&kid, ema, dishes).await;
    srv.decide_chore(&parent, record_id(&dishes_log), BulkAction::Approve)
        .await;
    srv.complete(&kid, ema, bed).await;
    srv.redeem(&kid, ema, sticker).await;

    let since = before.to_rfc3339();
    let home = srv
        .request_expect(
            "GET",
            &endpoints::child_home(&srv.base, ema as i32, Some(&since)),
            Some(&kid),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(home["child"]["points_balance"], 10);
    assert_eq!(home["chores"].as_array().unwrap().len(), 2);
    assert_eq!(home["pending_chore_ids"], json!([bed]));
    assert_eq!(home["pending_reward_ids"], json!([sticker]));
    assert_eq!(home["approved_chores"][0]["chore_title"], "Dishes");
    assert_eq!(home["has_new_approvals"], true);
    // Sticker (5) is affordable; Cinema (100) is the next target.
    assert_eq!(home["next_reward"]["reward"]["title"], "Cinema");
    assert_eq!(home["next_reward"]["progress_percentage"], 10);
    assert_eq!(home["next_reward"]["affordable"], false);
    assert_eq!(home["progress"]["current_position"], 10);

    let later = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    let home = srv
        .request_expect(
            "GET",
            &endpoints::child_home(&srv.base, ema as i32, Some(&later)),
            Some(&kid),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(home["has_new_approvals"], false);

    srv.request_expect(
        "GET",
        &endpoints::child_home(&srv.base, ema as i32, Some("yesterday")),
        Some(&kid),
        None,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn bulk_approval_counts_applied_records() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;
    let luka = srv.child_id(&parent, "Luka").await;
    let dishes = srv.chore_id(&parent, "Dishes").await;
    let ema_kid = srv.kid_login(ema, KID_PIN).await;
    let luka_kid = srv.kid_login(luka, KID_PIN).await;

    let (_, a) = srv.complete(&ema_kid, ema, dishes).await;
    let (_, b) = srv.complete(&luka_kid, luka, dishes).await;
    let pending = srv
        .request_expect(
            "GET",
            &endpoints::chore_approvals(&srv.base),
            Some(&parent),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(pending.as_array().unwrap().len(), 2);

    let resp = srv
        .request_expect(
            "POST",
            &endpoints::chore_bulk(&srv.base),
            Some(&parent),
            Some(json!({
                "ids": [record_id(&a), record_id(&b), record_id(&a), 424242],
                "action": "approve",
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(resp["requested"], 4);
    assert_eq!(resp["applied"], 2);

    for child in [ema, luka] {
        let detail = srv.child_detail(&parent, child).await;
        assert_eq!(detail["child"]["points_balance"], 10);
    }
}

#[tokio::test]
async fn parent_manages_children_and_definitions() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;

    let created = srv
        .request_expect(
            "POST",
            &endpoints::children(&srv.base),
            Some(&parent),
            Some(json!({"display_name": "Tara", "pin": "4321", "map_theme": "SPACE"})),
            StatusCode::CREATED,
        )
        .await;
    let tara = created["id"].as_i64().unwrap();
    assert_eq!(created["points_balance"], 0);
    assert_eq!(created["display_letter"], "T");
    assert_eq!(created["map_theme"], "SPACE");
    srv.request_expect(
        "POST",
        &endpoints::children(&srv.base),
        Some(&parent),
        Some(json!({"display_name": "Tara", "pin": "4321"})),
        StatusCode::CONFLICT,
    )
    .await;
    srv.request_expect(
        "POST",
        &endpoints::children(&srv.base),
        Some(&parent),
        Some(json!({"display_name": "Vid", "pin": "12"})),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let kid = srv.kid_login(tara, "4321").await;
    srv.request_expect(
        "POST",
        &endpoints::child_pin(&srv.base, tara as i32),
        Some(&kid),
        Some(json!({"pin": "8765"})),
        StatusCode::NO_CONTENT,
    )
    .await;
    srv.kid_login(tara, "8765").await;

    let chore = srv
        .request_expect(
            "POST",
            &endpoints::chores(&srv.base),
            Some(&parent),
            Some(json!({"title": "Water plants", "points": 3})),
            StatusCode::CREATED,
        )
        .await;
    let chore_id = chore["id"].as_i64().unwrap();
    assert_eq!(chore["active"], true);
    srv.request_expect(
        "POST",
        &endpoints::chores(&srv.base),
        Some(&parent),
        Some(json!({"title": "Negative", "points": -3})),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let updated = srv
        .request_expect(
            "POST",
            &endpoints::chore(&srv.base, chore_id as i32),
            Some(&parent),
            Some(json!({"active": false})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["active"], false);
    let (status, _) = srv.complete(&kid, tara, chore_id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let reward = srv
        .request_expect(
            "POST",
            &endpoints::rewards(&srv.base),
            Some(&parent),
            Some(json!({"title": "Ice cream", "cost_points": 30})),
            StatusCode::CREATED,
        )
        .await;
    let updated = srv
        .request_expect(
            "POST",
            &endpoints::reward(&srv.base, reward["id"].as_i64().unwrap() as i32),
            Some(&parent),
            Some(json!({"cost_points": 25})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["cost_points"], 25);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    srv.request_expect(
        "POST",
        &endpoints::auth_logout(&srv.base),
        Some(&parent),
        None,
        StatusCode::NO_CONTENT,
    )
    .await;
    srv.request_expect(
        "GET",
        &endpoints::children(&srv.base),
        Some(&parent),
        None,
        StatusCode::UNAUTHORIZED,
    )
    .await;
}

#[tokio::test]
async fn oversized_points_answer_bad_request() {
    let Some(srv) = TestServer::spawn().await else {
        return;
    };
    let parent = srv.login(PARENT, PARENT_PWD).await;
    let ema = srv.child_id(&parent, "Ema").await;

    let err = srv
        .request_expect(
            "POST",
            &endpoints::child_adjustments(&srv.base, ema as i32),
            Some(&parent),
            Some(json!({"points": i32::MAX - 10, "reason": "big"})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    assert!(err["error"].as_str().unwrap().contains("points"));
    srv.request_expect(
        "POST",
        &endpoints::chores(&srv.base),
        Some(&parent),
        Some(json!({"title": "Huge", "points": i32::MAX})),
        StatusCode::BAD_REQUEST,
    )
    .await;

    let detail = srv.child_detail(&parent, ema).await;
    assert_eq!(detail["child"]["points_balance"], 0);
    assert_eq!(detail["child"]["map_position"], 0);
}
