// tests/api_tests.rs

use std::collections::HashMap;
use std::net::SocketAddr;

use onethink_backend::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Helper to spawn the app on a random port for testing.
/// Returns None (test skipped) when DATABASE_URL is not set.
async fn spawn_app() -> Option<(String, PgPool)> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        // Disable the leaderboard cache so tests always see fresh rows.
        leaderboard_cache_ttl: 0,
    };

    let state = AppState::new(pool.clone(), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Some((address, pool))
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers a user, returning (username, token).
async fn register_and_login(client: &reqwest::Client, address: &str) -> (String, String) {
    let username = unique_name("u");
    let password = "password123";

    let resp = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(resp.status().as_u16(), 201);

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login["token"].as_str().expect("Token not found").to_string();
    (username, token)
}

/// Registers a user, promotes it to admin directly in the store, and logs in
/// again so the token carries the admin role.
async fn admin_token(client: &reqwest::Client, address: &str, pool: &PgPool) -> String {
    let username = unique_name("adm");
    let password = "password123";

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");

    sqlx::query("UPDATE users SET role = 'admin' WHERE username = $1")
        .bind(&username)
        .execute(pool)
        .await
        .expect("Failed to promote admin");

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

/// Creates an active quiz with `n` two-option questions.
/// Returns (quiz_id, question_ids).
async fn seed_active_quiz(
    client: &reqwest::Client,
    address: &str,
    admin: &str,
    n: usize,
) -> (i64, Vec<i64>) {
    let quiz: serde_json::Value = client
        .post(format!("{}/api/admin/quizzes", address))
        .bearer_auth(admin)
        .json(&serde_json::json!({ "title": unique_name("quiz") }))
        .send()
        .await
        .expect("Create quiz failed")
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let mut question_ids = Vec::new();
    for i in 0..n {
        let q: serde_json::Value = client
            .post(format!("{}/api/admin/questions", address))
            .bearer_auth(admin)
            .json(&serde_json::json!({
                "quiz_id": quiz_id,
                "content": format!("Will outcome {} happen?", i),
                "options": ["Yes", "No"]
            }))
            .send()
            .await
            .expect("Create question failed")
            .json()
            .await
            .unwrap();
        question_ids.push(q["id"].as_i64().unwrap());
    }

    let resp = client
        .put(format!("{}/api/admin/quizzes/{}", address, quiz_id))
        .bearer_auth(admin)
        .json(&serde_json::json!({ "status": "active" }))
        .send()
        .await
        .expect("Activate quiz failed");
    assert_eq!(resp.status().as_u16(), 200);

    (quiz_id, question_ids)
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    quiz_id: i64,
    answers: &HashMap<i64, i32>,
) -> reqwest::Response {
    client
        .post(format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .bearer_auth(token)
        .json(&serde_json::json!({ "answers": answers }))
        .send()
        .await
        .expect("Submit failed")
}

async fn my_points(client: &reqwest::Client, address: &str, token: &str) -> i64 {
    let me: serde_json::Value = client
        .get(format!("{}/api/profile/me", address))
        .bearer_auth(token)
        .send()
        .await
        .expect("Profile failed")
        .json()
        .await
        .unwrap();
    me["points"].as_i64().unwrap()
}

#[tokio::test]
async fn health_check_404() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn submit_requires_every_question_answered() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &address, &pool).await;
    let (quiz_id, qids) = seed_active_quiz(&client, &address, &admin, 3).await;
    let (_user, token) = register_and_login(&client, &address).await;

    // Leave the last question unanswered.
    let mut answers = HashMap::new();
    answers.insert(qids[0], 0);
    answers.insert(qids[1], 1);

    let resp = submit(&client, &address, &token, quiz_id, &answers).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    let detail = body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 1);
    assert_eq!(detail[0].as_str().unwrap(), qids[2].to_string());
}

#[tokio::test]
async fn evaluation_and_allocation_flow() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &address, &pool).await;
    let (quiz_id, qids) = seed_active_quiz(&client, &address, &admin, 2).await;

    // Two players: one will get both answers right, one gets one right.
    let (_u1, t1) = register_and_login(&client, &address).await;
    let (_u2, t2) = register_and_login(&client, &address).await;

    let perfect: HashMap<i64, i32> = qids.iter().map(|&id| (id, 0)).collect();
    let mut half = perfect.clone();
    half.insert(qids[1], 1);

    assert_eq!(submit(&client, &address, &t1, quiz_id, &perfect).await.status(), 200);
    assert_eq!(submit(&client, &address, &t2, quiz_id, &half).await.status(), 200);

    // A second full submission is rejected: the questions are already answered.
    let resp = submit(&client, &address, &t1, quiz_id, &perfect).await;
    assert_eq!(resp.status().as_u16(), 400);

    // Incomplete answer key: fails naming the missing id, no writes.
    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/evaluation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "answers": { qids[0].to_string(): 0 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["detail"][0].as_str().unwrap(), qids[1].to_string());

    let attempt: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .bearer_auth(&t1)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["evaluated"], false, "failed evaluation must not write");
    assert_eq!(attempt["score"], 0);

    // Full key: option 0 is correct for both questions.
    let key: HashMap<String, i32> = qids.iter().map(|id| (id.to_string(), 0)).collect();
    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/evaluation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "answers": key }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["evaluated_attempts"], 2);

    let attempt: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .bearer_auth(&t1)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["evaluated"], true);
    assert_eq!(attempt["score"], 100);

    let attempt2: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .bearer_auth(&t2)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt2["score"], 50);

    // Allocate to the top half: only the perfect scorer wins.
    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/allocation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "points_per_winner": 25, "top_percent": 50.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["winners"].as_array().unwrap().len(), 1);

    assert_eq!(my_points(&client, &address, &t1).await, 25);
    assert_eq!(my_points(&client, &address, &t2).await, 0);

    // Second allocator run is gated, not double-credited.
    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/allocation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    assert_eq!(my_points(&client, &address, &t1).await, 25);

    // Leaderboard ranks the perfect score first.
    let board: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/leaderboard", address, quiz_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = board.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["score"], 100);
    assert_eq!(rows[1]["score"], 50);
}

#[tokio::test]
async fn allocation_without_evaluated_attempts_is_404() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &address, &pool).await;
    let (quiz_id, _qids) = seed_active_quiz(&client, &address, &admin, 1).await;

    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/allocation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn all_zero_scores_mean_no_eligible_winners() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &address, &pool).await;
    let (quiz_id, qids) = seed_active_quiz(&client, &address, &admin, 1).await;
    let (_user, token) = register_and_login(&client, &address).await;

    // Player picks option 1, key says option 0.
    let answers: HashMap<i64, i32> = qids.iter().map(|&id| (id, 1)).collect();
    assert_eq!(submit(&client, &address, &token, quiz_id, &answers).await.status(), 200);

    let key: HashMap<String, i32> = qids.iter().map(|id| (id.to_string(), 0)).collect();
    client
        .post(format!("{}/api/admin/quizzes/{}/evaluation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "answers": key }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/allocation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    // Attempts exist, but the whole cohort scored zero.
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(my_points(&client, &address, &token).await, 0);
}

#[tokio::test]
async fn reattempt_only_covers_new_questions() {
    let Some((address, pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let admin = admin_token(&client, &address, &pool).await;
    let (quiz_id, qids) = seed_active_quiz(&client, &address, &admin, 1).await;
    let (_user, token) = register_and_login(&client, &address).await;

    let answers: HashMap<i64, i32> = qids.iter().map(|&id| (id, 0)).collect();
    assert_eq!(submit(&client, &address, &token, quiz_id, &answers).await.status(), 200);

    // Admin adds a question after the first submission.
    let q: serde_json::Value = client
        .post(format!("{}/api/admin/questions", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "quiz_id": quiz_id,
            "content": "Late-breaking question?",
            "options": ["Yes", "No"]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let new_qid = q["id"].as_i64().unwrap();

    // Resubmitting an already-answered question is rejected, naming it.
    let mut bad = HashMap::new();
    bad.insert(qids[0], 1);
    bad.insert(new_qid, 0);
    let resp = submit(&client, &address, &token, quiz_id, &bad).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["detail"][0].as_str().unwrap(), qids[0].to_string());

    // Answering only the new question reuses the attempt row.
    let mut good = HashMap::new();
    good.insert(new_qid, 0);
    let resp = submit(&client, &address, &token, quiz_id, &good).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["reattempt"], true);

    let attempt: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempt["evaluated"], false, "reattempt re-opens evaluation");

    // Evaluation now scores over both questions.
    let key = serde_json::json!({
        "answers": { qids[0].to_string(): 0, new_qid.to_string(): 1 }
    });
    let resp = client
        .post(format!("{}/api/admin/quizzes/{}/evaluation", address, quiz_id))
        .bearer_auth(&admin)
        .json(&key)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let attempt: serde_json::Value = client
        .get(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // One of two correct.
    assert_eq!(attempt["score"], 50);
}

#[tokio::test]
async fn admin_routes_reject_plain_users() {
    let Some((address, _pool)) = spawn_app().await else {
        return;
    };
    let client = reqwest::Client::new();
    let (_user, token) = register_and_login(&client, &address).await;

    let resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = client
        .post(format!("{}/api/admin/quizzes", address))
        .json(&serde_json::json!({ "title": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}
