//! HTTP tests for the public API.
//!
//! Every test runs the real route table against the in-memory repository, a
//! fixed clock and a notifier that records instead of sending.

use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use repair_appointments::config::Settings;
use repair_appointments::notify::RecordingNotifier;
use repair_appointments::schedule::{BlackoutBlock, BookedInterval, FixedClock, OpeningWindow, PromoRule, TimeWindow};
use repair_appointments::store::{
    Appointment, CancelGrant, InMemoryRepository, NewAppointment, NewReview, Quote, RepairPrice, RepositoryError,
    RepositoryResult, Review, ReviewStatus, ShopData, ShopRepository,
};
use repair_appointments::web::{configure_routes, AppState};

const PEER: &str = "203.0.113.9:40000";

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap().and_hms_opt(hour, minute, 0).unwrap()
}

fn clock_time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn repair(model: &str, problem: &str, price: f64, duration: u32) -> RepairPrice {
    RepairPrice {
        category: "Smartphone".to_string(),
        brand: "Apple".to_string(),
        model: model.to_string(),
        problem: problem.to_string(),
        price,
        duration: Some(duration),
        updated_at: Some(at(1, 10, 0)),
    }
}

/// Monday 09:00-12:00 every 30 minutes, 10% off between 09:00 and 10:00
fn shop_data() -> ShopData {
    ShopData {
        opening_hours: vec![OpeningWindow {
            weekday: 1,
            morning: Some(TimeWindow::new(clock_time(9, 0), clock_time(12, 0))),
            afternoon: None,
            step_min: 30,
        }],
        promo_rules: vec![PromoRule {
            weekday: 1,
            window: TimeWindow::new(clock_time(9, 0), clock_time(10, 0)),
            discount_pct: 10,
        }],
        repairs: vec![repair("iPhone 12", "Ecran", 129.9, 60), repair("iPhone 12", "Batterie", 69.0, 30)],
        ..Default::default()
    }
}

struct Harness {
    repo: Arc<InMemoryRepository>,
    notifier: Arc<RecordingNotifier>,
    state: web::Data<AppState>,
    _cache: tempfile::TempDir,
}

fn harness_with(data: ShopData, settings: Settings) -> Harness {
    let cache = tempfile::tempdir().unwrap();
    let repo = Arc::new(InMemoryRepository::new(data));
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = Settings { cache_dir: cache.path().to_path_buf(), ..settings };
    let state = web::Data::new(AppState::new(
        repo.clone(),
        Arc::new(FixedClock(at(7, 8, 0))),
        notifier.clone(),
        settings,
    ));
    Harness { repo, notifier, state, _cache: cache }
}

fn harness() -> Harness {
    harness_with(
        shop_data(),
        Settings {
            cancel_token_secret: Some("test-secret".to_string()),
            options_cache_token: Some("bump-me".to_string()),
            ..Settings::default()
        },
    )
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(configure_routes)).await
    };
}

async fn parts<B: MessageBody>(resp: ServiceResponse<B>) -> (StatusCode, Value) {
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

macro_rules! call_json {
    ($app:expr, $req:expr) => {
        parts(test::call_service(&$app, $req).await).await
    };
}

fn booking_form(start: &str) -> Vec<(&'static str, String)> {
    vec![
        ("service_label", "Ecran iPhone 12".to_string()),
        ("duration_min", "60".to_string()),
        ("start_datetime", start.to_string()),
        ("name", "Camille Durand".to_string()),
        ("email", "camille@example.com".to_string()),
        ("phone", "06 12 34 56 78".to_string()),
        ("price", "129.90".to_string()),
        ("discount", "10".to_string()),
    ]
}

fn slot_times(body: &Value) -> Vec<String> {
    body["data"][0]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["time"].as_str().unwrap().to_string())
        .collect()
}

#[actix_web::test]
async fn slots_follow_opening_hours_and_promos() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri("/api/slots?start=2025-03-10&days=2&duration_min=60&lead_min=0")
        .to_request();
    let (status, body) = call_json!(app, req);

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(slot_times(&body), vec!["09:00", "09:30", "10:00", "10:30", "11:00"]);

    let first = &body["data"][0]["slots"][0];
    assert_eq!(first["start"], "2025-03-10 09:00:00");
    assert_eq!(first["end"], "2025-03-10 10:00:00");
    assert_eq!(first["discount"], 10);
    assert_eq!(body["data"][0]["slots"][1]["discount"], 0);

    // Tuesday has no opening record
    assert_eq!(body["data"][1]["date"], "2025-03-11");
    assert_eq!(body["data"][1]["slots"], Value::Array(Vec::new()));
}

#[actix_web::test]
async fn slots_need_a_duration_or_a_quote_tag() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/api/slots?start=2025-03-10").to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_duration");

    let tag = h.repo.insert_quote(&repair("iPhone 12", "Batterie", 69.0, 90)).unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("/api/slots?start=2025-03-10&days=1&lead_min=0&tag={}", tag))
        .to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot_times(&body), vec!["09:00", "09:30", "10:00", "10:30"]);
}

#[actix_web::test]
async fn slots_reject_a_bad_start_date() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/api/slots?start=10/03/2025&duration_min=30").to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_params");
}

#[actix_web::test]
async fn toggle_block_removes_a_single_slot() {
    let mut data = shop_data();
    data.blocks.push(BlackoutBlock::new(at(10, 9, 0), at(10, 9, 30), "closed", Some("slot_toggle")));
    data.blocks.push(BlackoutBlock::new(at(10, 11, 0), at(10, 12, 0), "open", None));
    let h = harness_with(data, Settings::default());
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri("/api/slots?start=2025-03-10&days=1&duration_min=60&lead_min=0")
        .to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(slot_times(&body), vec!["09:30", "10:00", "10:30", "11:00"]);
}

#[actix_web::test]
async fn booking_blocks_the_slot_and_returns_a_cancel_link() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::post().uri("/api/book").set_form(booking_form("2025-03-10 10:00")).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let token = body["cancel_token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert_eq!(body["cancel_url"], format!("https://ripair.shop/api/cancel?token={}", token));
    assert_eq!(body["cancel_token_expires_at"], "2025-03-09T08:00:00+01:00");

    let req = test::TestRequest::get()
        .uri("/api/slots?start=2025-03-10&days=1&duration_min=60&lead_min=0")
        .to_request();
    let (_, slots) = call_json!(app, req);
    assert_eq!(slot_times(&slots), vec!["09:00", "11:00"]);

    let req = test::TestRequest::post().uri("/api/book").set_form(booking_form("2025-03-10T10:30")).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "slot_taken");

    let sent = h.notifier.sms();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Date : 10/03/2025 10h00"));

    let mails = h.notifier.mails();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, vec!["camille@example.com"]);
    assert_eq!(mails[0].subject, "Rendez-vous confirmé - RIPAIR");
    assert!(mails[0].text_body.contains("Date : 10/03/2025 à 10h00"));
    assert!(mails[0].text_body.contains("Total : 116,91 €"));
    assert!(mails[0].text_body.contains(&format!("token={}", token)));
}

#[actix_web::test]
async fn oversized_durations_and_lead_times_do_not_break_requests() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get()
        .uri("/api/slots?start=2025-03-10&duration_min=1000000000000&lead_min=0")
        .to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_params");

    let req = test::TestRequest::get()
        .uri("/api/slots?start=2025-03-10&days=1&duration_min=60&lead_min=4611686018427387903")
        .to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["slots"], Value::Array(Vec::new()));

    let req = test::TestRequest::get().uri("/api/slots?start=262143-12-20&duration_min=60").to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_params");

    let mut form = booking_form("2025-03-10 10:00");
    form.retain(|(k, _)| *k != "duration_min");
    form.push(("duration_min", "9000000000000000".to_string()));
    let req = test::TestRequest::post().uri("/api/book").set_form(form).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_params");
    assert!(h.notifier.sms().is_empty());
}

#[actix_web::test]
async fn booking_reports_missing_fields_and_secret() {
    let h = harness();
    let app = app!(h.state);

    let mut form = booking_form("2025-03-10 10:00");
    form.retain(|(k, _)| *k != "email" && *k != "service_label");
    let req = test::TestRequest::post().uri("/api/book").set_form(form).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_fields");
    assert_eq!(body["missing"], serde_json::json!(["service_label", "email"]));

    let req = test::TestRequest::post().uri("/api/book").set_form(booking_form("demain 10h")).to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["error"], "invalid_start_datetime");

    let unconfigured = harness_with(shop_data(), Settings::default());
    let app = app!(unconfigured.state);
    let req = test::TestRequest::post().uri("/api/book").set_form(booking_form("2025-03-10 10:00")).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "cancel_secret_missing");
}

#[actix_web::test]
async fn cancel_link_works_once() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::post().uri("/api/book").set_form(booking_form("2025-03-10 10:00")).to_request();
    let (_, body) = call_json!(app, req);
    let token = body["cancel_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get().uri(&format!("/api/cancel?token={}", token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("Rendez-vous annulé"));

    let req = test::TestRequest::get().uri(&format!("/api/cancel?token={}", token)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/cancel").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    // booking confirmation then cancellation
    assert_eq!(h.notifier.sms().len(), 2);
}

#[actix_web::test]
async fn cancel_lists_guards_once_the_part_is_ordered() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::post().uri("/api/book").set_form(booking_form("2025-03-10 10:00")).to_request();
    let (_, body) = call_json!(app, req);
    let token = body["cancel_token"].as_str().unwrap().to_string();

    let booked = h.repo.appointment_by_cancel_token(&token).unwrap().unwrap();
    h.repo.mark_part_ordered(booked.id, at(7, 9, 0)).unwrap();

    let req = test::TestRequest::get().uri(&format!("/api/cancel?token={}", token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("<li>La pièce a déjà été commandée pour cette intervention.</li>"));
}

#[actix_web::test]
async fn catalog_options_devis_and_quote() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/api/options?category=Smartphone&brand=Apple&model=iPhone%2012").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["data"], serde_json::json!(["Batterie", "Ecran"]));

    let req = test::TestRequest::get().uri("/api/options?brand=Apple").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["error"], "bad_params");

    let req = test::TestRequest::get().uri("/api/options/full").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["count"], 2);
    assert_eq!(body["last_update"], "2025-03-01 10:00:00");
    assert_eq!(body["data"][0]["problem"], "Batterie");

    let form = [("category", "Smartphone"), ("brand", "Apple"), ("model", "iPhone 12"), ("problem", "Ecran")];
    let req = test::TestRequest::post().uri("/api/devis").set_form(form).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], 129.9);
    let tag = body["tag"].as_u64().unwrap();

    let req = test::TestRequest::get().uri(&format!("/api/quote?tag={}", tag)).to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["data"]["problem"], "Ecran");
    assert_eq!(body["data"]["duration"], 60);

    let req = test::TestRequest::get().uri("/api/quote?tag=999").to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let req = test::TestRequest::get().uri("/api/quote").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["error"], "missing_tag");
}

#[actix_web::test]
async fn options_version_bump_requires_the_token() {
    let h = harness();
    let app = app!(h.state);

    let req = test::TestRequest::get().uri("/api/options/version").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["version"], 1);

    let req = test::TestRequest::post().uri("/api/options/version/bump?token=nope").to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "invalid_token");

    let req = test::TestRequest::post()
        .uri("/api/options/version/bump")
        .set_form([("token", "bump-me")])
        .to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);

    let req = test::TestRequest::get().uri("/api/options/version").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["version"], 2);
}

#[actix_web::test]
async fn reviews_are_moderated_and_rate_limited() {
    let h = harness();
    let app = app!(h.state);

    let payload = serde_json::json!({
        "rating": 5,
        "message": "Super accueil, réparation en 30 minutes.",
        "firstName": "Léa",
        "lastName": "Martin",
        "showName": true
    });
    let req = test::TestRequest::post()
        .uri("/api/reviews")
        .peer_addr(PEER.parse().unwrap())
        .insert_header(("User-Agent", "integration-test"))
        .set_json(&payload)
        .to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    let id = body["id"].as_u64().unwrap();

    let req = test::TestRequest::post()
        .uri("/api/reviews")
        .peer_addr(PEER.parse().unwrap())
        .set_json(&payload)
        .to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too_many_requests");

    let req = test::TestRequest::get().uri("/api/reviews").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["meta"]["count"], 0);

    h.repo.set_review_status(id, ReviewStatus::Approved).unwrap();
    let req = test::TestRequest::get().uri("/api/reviews?limit=5").to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["reviews"][0]["author_name"], "Léa Martin");
    assert_eq!(body["reviews"][0]["source"], "ripair");
    assert_eq!(body["meta"]["rating"], 5.0);

    let req = test::TestRequest::post()
        .uri("/api/reviews")
        .set_payload("not json")
        .insert_header(("Content-Type", "application/json"))
        .to_request();
    let (_, body) = call_json!(app, req);
    assert_eq!(body["error"], "invalid_rating");
}

#[actix_web::test]
async fn contact_form_checks_honeypot_and_rate() {
    let h = harness();
    let app = app!(h.state);

    let bot = [("name", "x"), ("email", "x@example.com"), ("message", "hi"), ("website", "spam")];
    let req = test::TestRequest::post().uri("/api/contact").peer_addr(PEER.parse().unwrap()).set_form(bot).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bot_detected");

    let form = [("name", "Léa"), ("email", "lea@example.com"), ("message", "Mon écran est fissuré")];
    let req = test::TestRequest::post().uri("/api/contact").peer_addr(PEER.parse().unwrap()).set_form(form).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.notifier.mails().len(), 1);

    let req = test::TestRequest::post().uri("/api/contact").peer_addr(PEER.parse().unwrap()).set_form(form).to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["remaining"], 30);
}

/// Repository whose every call fails
struct BrokenRepository;

fn down<T>() -> RepositoryResult<T> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ShopRepository for BrokenRepository {
    fn opening_hours(&self) -> RepositoryResult<Vec<OpeningWindow>> {
        down()
    }
    fn promo_rules(&self) -> RepositoryResult<Vec<PromoRule>> {
        down()
    }
    fn booked_between(
        &self,
        _: NaiveDateTime,
        _: NaiveDateTime,
    ) -> RepositoryResult<Vec<BookedInterval>> {
        down()
    }
    fn blocks_between(&self, _: NaiveDateTime, _: NaiveDateTime) -> RepositoryResult<Vec<BlackoutBlock>> {
        down()
    }
    fn repairs(&self) -> RepositoryResult<Vec<RepairPrice>> {
        down()
    }
    fn find_repair(&self, _: &str, _: &str, _: &str, _: &str) -> RepositoryResult<Option<RepairPrice>> {
        down()
    }
    fn insert_quote(&self, _: &RepairPrice) -> RepositoryResult<u64> {
        down()
    }
    fn quote(&self, _: u64) -> RepositoryResult<Option<Quote>> {
        down()
    }
    fn book(&self, _: NewAppointment, _: &dyn Fn(u64) -> CancelGrant) -> RepositoryResult<Option<Appointment>> {
        down()
    }
    fn appointment_by_cancel_token(&self, _: &str) -> RepositoryResult<Option<Appointment>> {
        down()
    }
    fn mark_cancelled(&self, _: u64, _: NaiveDateTime) -> RepositoryResult<bool> {
        down()
    }
    fn insert_review(&self, _: NewReview) -> RepositoryResult<u64> {
        down()
    }
    fn reviews_since(&self, _: &str, _: NaiveDateTime) -> RepositoryResult<usize> {
        down()
    }
    fn approved_reviews(&self, _: usize) -> RepositoryResult<Vec<Review>> {
        down()
    }
    fn setting(&self, _: &str) -> RepositoryResult<Option<String>> {
        down()
    }
}

#[actix_web::test]
async fn storage_failures_become_server_errors_without_partial_data() {
    let state = web::Data::new(AppState::new(
        Arc::new(BrokenRepository),
        Arc::new(FixedClock(at(7, 8, 0))),
        Arc::new(RecordingNotifier::default()),
        Settings::default(),
    ));
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/slots?start=2025-03-10&duration_min=30").to_request();
    let (status, body) = call_json!(app, req);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "server_error");
    assert!(body.get("data").is_none());
    assert_eq!(body["debug_id"].as_str().unwrap().len(), 12);

    let req = test::TestRequest::get().uri("/api/cancel?token=abc").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
