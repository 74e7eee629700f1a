use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use futures::future::{BoxFuture, join_all};
use serde_json::{Value, json};
use tower::ServiceExt;

use techquiz_back::{
    config::AppConfig,
    dao::quiz_store::{MemoryQuizStore, QuizStore},
    routes,
    services::mailer::{MailerError, OtpMailer},
    state::{AppState, SharedState, game::Round},
};

const ADMIN_TOKEN: &str = "instructor-token";

#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingMailer {
    fn last_code_for(&self, email: &str) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to.eq_ignore_ascii_case(email))
            .map(|(_, code)| code.clone())
            .expect("no code sent")
    }
}

impl OtpMailer for CapturingMailer {
    fn send_otp(
        &self,
        email: String,
        _team_name: String,
        code: String,
    ) -> BoxFuture<'static, Result<(), MailerError>> {
        self.sent.lock().unwrap().push((email, code));
        Box::pin(async { Ok(()) })
    }
}

struct TestApp {
    router: Router,
    state: SharedState,
    store: Arc<MemoryQuizStore>,
    mailer: Arc<CapturingMailer>,
}

async fn app() -> TestApp {
    let mailer = Arc::new(CapturingMailer::default());
    let state = AppState::new(AppConfig::default(), mailer.clone());
    let store = Arc::new(MemoryQuizStore::new());
    state.set_quiz_store(store.clone()).await;
    *state.admin_token().lock().await = Some(ADMIN_TOKEN.to_owned());
    TestApp {
        router: routes::router(state.clone()),
        state,
        store,
        mailer,
    }
}

enum Auth<'a> {
    None,
    Admin,
    Team(&'a str),
}

async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    auth: Auth<'_>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = match auth {
        Auth::None => builder,
        Auth::Admin => builder.header("x-admin-token", ADMIN_TOKEN),
        Auth::Team(token) => builder.header("x-session-token", token),
    };
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn team_json(name: &str, email: &str) -> Value {
    json!({
        "team_name": name,
        "department": "Computer",
        "year": "TE",
        "primary_member": {"name": format!("{name} lead"), "email": email},
        "supporting_member": {"name": format!("{name} second"), "email": format!("second.{email}")}
    })
}

async fn register_and_login(app: &TestApp, names: &[&str]) -> Vec<String> {
    let teams: Vec<Value> = names
        .iter()
        .map(|name| team_json(name, &format!("{}@quiz.dev", name.to_lowercase())))
        .collect();
    let (status, _) = call(
        &app.router,
        "POST",
        "/admin/teams",
        Auth::Admin,
        Some(json!({ "teams": teams })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut tokens = Vec::with_capacity(names.len());
    for name in names {
        let email = format!("{}@quiz.dev", name.to_lowercase());
        let (status, _) = call(
            &app.router,
            "POST",
            "/auth/otp",
            Auth::None,
            Some(json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let code = app.mailer.last_code_for(&email);
        let (status, session) = call(
            &app.router,
            "POST",
            "/auth/verify",
            Auth::None,
            Some(json!({ "email": email, "otp": code })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        tokens.push(session["token"].as_str().unwrap().to_owned());
    }
    tokens
}

async fn open_round_three_question(app: &TestApp, activate: bool) -> String {
    let (status, _) = call(
        &app.router,
        "PUT",
        "/admin/game/state",
        Auth::Admin,
        Some(json!({"active_round": 3, "round_status": "ONGOING"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, question) = call(
        &app.router,
        "POST",
        "/admin/round3/questions",
        Auth::Admin,
        Some(json!({"text": "Name the async runtime"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = question["id"].as_str().unwrap().to_owned();
    let action = if activate { "activate" } else { "select" };
    let (status, _) = call(
        &app.router,
        "POST",
        &format!("/admin/round3/questions/{id}/{action}"),
        Auth::Admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}

#[tokio::test]
async fn unknown_email_cannot_request_otp() {
    let app = app().await;
    let (status, body) = call(
        &app.router,
        "POST",
        "/auth/otp",
        Auth::None,
        Some(json!({"email": "nobody@quiz.dev"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Email not registered as Primary Member.");
}

#[tokio::test]
async fn admin_routes_require_token() {
    let app = app().await;
    let (status, _) = call(&app.router, "GET", "/admin/dashboard", Auth::None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn round_one_flow_scores_on_the_server() {
    let app = app().await;
    let tokens = register_and_login(&app, &["Alpha"]).await;
    let token = tokens[0].as_str();

    let rows = json!({"rows": [
        ["Question", "A", "B", "C", "D", "Correct"],
        ["Ownership model?", "Rust", "Java", "Python", "Ruby", "A"],
        ["Green threads?", "C", "Go", "Perl", "Lua", "2"]
    ]});
    let (status, imported) =
        call(&app.router, "PUT", "/admin/questions/1", Auth::Admin, Some(rows)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(imported["imported"], 2);

    let (status, _) = call(&app.router, "POST", "/admin/game/start", Auth::Admin, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, questions) =
        call(&app.router, "GET", "/quiz/questions", Auth::Team(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(questions["questions"].as_array().unwrap().len(), 2);
    assert!(questions["questions"][0].get("correct").is_none());

    let answers = json!({"round": 1, "answers": [
        {"question_id": 1, "selected_option": 0},
        {"question_id": "2", "selected_option": "0"}
    ]});
    let (status, result) = call(
        &app.router,
        "POST",
        "/quiz/submit_round",
        Auth::Team(token),
        Some(answers.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["score"], 10);
    assert_eq!(result["success"], true);

    let (status, _) = call(
        &app.router,
        "POST",
        "/quiz/submit_round",
        Auth::Team(token),
        Some(answers),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, board) = call(&app.router, "GET", "/leaderboard", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["leaderboard"][0]["team_name"], "Alpha");
    assert_eq!(board["leaderboard"][0]["score"], 10);

    let (_, status_body) =
        call(&app.router, "GET", "/game/status", Auth::Team(token), None).await;
    assert_eq!(status_body["is_submitted"], true);
    assert_eq!(status_body["total_score"], 20);

    assert_eq!(app.store.list_scores(Round::One).await.unwrap().len(), 1);
}

#[tokio::test]
async fn submission_requires_an_ongoing_round() {
    let app = app().await;
    let tokens = register_and_login(&app, &["Alpha"]).await;
    let (status, _) = call(
        &app.router,
        "POST",
        "/quiz/submit_round",
        Auth::Team(&tokens[0]),
        Some(json!({"round": 1, "answers": []})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn berserk_requires_round_three_and_session() {
    let app = app().await;
    let tokens = register_and_login(&app, &["Alpha"]).await;

    let (status, _) = call(&app.router, "POST", "/quiz/berserk", Auth::None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        call(&app.router, "POST", "/quiz/berserk", Auth::Team(&tokens[0]), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Round 3 not active");
}

#[tokio::test]
async fn round_three_leaderboard_follows_arrival_order() {
    let app = app().await;
    let tokens = register_and_login(&app, &["Alpha", "Beta"]).await;
    open_round_three_question(&app, true).await;

    for token in tokens.iter().rev() {
        let (status, body) =
            call(&app.router, "POST", "/quiz/berserk", Auth::Team(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Berserk Recorded!");
    }
    let (_, again) =
        call(&app.router, "POST", "/quiz/berserk", Auth::Team(&tokens[0]), None).await;
    assert_eq!(again["message"], "Already logged!");

    let (_, board) = call(&app.router, "GET", "/leaderboard", Auth::None, None).await;
    let names: Vec<&str> = board["leaderboard"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["team_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Beta", "Alpha"]);
    assert_eq!(board["leaderboard"][0]["score"], "LOGGED");
    assert_eq!(board["is_unlocked"], true);

    let (_, hits) = call(&app.router, "GET", "/admin/round3/hits", Auth::Admin, None).await;
    assert_eq!(hits["hits"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_hits_log_one_legal_entry_per_team() {
    let app = app().await;
    let names: Vec<String> = (0..12).map(|index| format!("Team{index}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tokens = register_and_login(&app, &name_refs).await;
    let question_id = open_round_three_question(&app, true).await;

    let shared = &app.router;
    let presses = tokens.iter().flat_map(|token| {
        (0..5).map(move |_| {
            let router = shared.clone();
            let token = token.clone();
            tokio::spawn(async move {
                call(&router, "POST", "/quiz/berserk", Auth::Team(&token), None).await
            })
        })
    });
    let results = join_all(presses).await;

    let mut recorded = 0;
    for result in results {
        let (status, body) = result.unwrap();
        assert_eq!(status, StatusCode::OK);
        if body["message"] == "Berserk Recorded!" {
            recorded += 1;
        }
    }
    assert_eq!(recorded, tokens.len());

    let question = question_id.parse().unwrap();
    assert_eq!(app.state.ledger().leaderboard(question).len(), tokens.len());
    assert_eq!(app.store.list_berserk_logs().await.unwrap().len(), tokens.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_false_starts_penalise_exactly_once_per_strike() {
    let app = app().await;
    let tokens = register_and_login(&app, &["Alpha"]).await;
    open_round_three_question(&app, false).await;

    let presses = (0..9).map(|_| {
        let router = app.router.clone();
        let token = tokens[0].clone();
        tokio::spawn(async move {
            call(&router, "POST", "/quiz/berserk", Auth::Team(&token), None).await
        })
    });
    let mut counts: Vec<u64> = join_all(presses)
        .await
        .into_iter()
        .map(|result| {
            let (status, body) = result.unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "illegal");
            body["illegal_count"].as_u64().unwrap()
        })
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=9).collect::<Vec<_>>());

    let team_id = app.state.team_by_primary_email("alpha@quiz.dev").unwrap().id;
    assert_eq!(app.state.scores().get(Round::Three, team_id).unwrap().score, -30);
    let stored = app.store.list_scores(Round::Three).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].score, -30);
    assert_eq!(app.store.list_berserk_logs().await.unwrap().len(), 9);
}
