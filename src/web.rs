use actix_web::{web, App, HttpServer, HttpResponse, HttpRequest, middleware};
use actix_files::Files;
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::booking::{book_appointment, cancel_by_token, CancelOutcome};
use crate::cache_version::OptionsVersion;
use crate::catalog::{create_quote, find_quote, full_catalog, option_values, parse_tag, DevisForm, OptionsQuery};
use crate::config::Settings;
use crate::contact::{send_contact_message, RateLimiter};
use crate::error::{debug_id, ShopError};
use crate::form::{escape_html, BookingForm, ContactForm, ReviewForm};
use crate::notify::Notifier;
use crate::reviews::{list_reviews, submit_review, THANK_YOU};
use crate::schedule::generator::DEFAULT_DAYS;
use crate::schedule::{
    format_clock, format_datetime, generate_availability, AvailabilityQuery, Clock, DaySlots, ScheduleInputs,
};
use crate::store::ShopRepository;

/// Shared state handed to every worker
pub struct AppState {
    pub repo: Arc<dyn ShopRepository>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Settings,
    pub options_version: OptionsVersion,
    pub contact_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn ShopRepository>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            options_version: OptionsVersion::new(&settings.cache_dir),
            contact_limiter: RateLimiter::default(),
            repo,
            clock,
            notifier,
            settings,
        }
    }
}

type Handler = Result<HttpResponse, ShopError>;

/// Integer parameter the way loose query strings carry it; garbage reads as absent
fn int_param(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info().peer_addr().map(str::to_string)
}

#[derive(Deserialize)]
pub struct SlotsQuery {
    start: Option<String>,
    days: Option<String>,
    duration_min: Option<String>,
    tag: Option<String>,
    lead_min: Option<String>,
}

#[derive(Serialize)]
pub struct SlotResponse {
    time: String,
    start: String,
    end: String,
    discount: u8,
}

#[derive(Serialize)]
pub struct DayResponse {
    date: String,
    slots: Vec<SlotResponse>,
}

impl From<&DaySlots> for DayResponse {
    fn from(day: &DaySlots) -> Self {
        DayResponse {
            date: day.date.format("%Y-%m-%d").to_string(),
            slots: day
                .slots
                .iter()
                .map(|slot| SlotResponse {
                    time: format_clock(slot.start),
                    start: format_datetime(slot.start),
                    end: format_datetime(slot.end),
                    discount: slot.discount_pct,
                })
                .collect(),
        }
    }
}

// Availability endpoint
async fn get_slots(query: web::Query<SlotsQuery>, state: web::Data<AppState>) -> Handler {
    let now = state.clock.now();
    let start_date = match query.start.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ShopError::BadParams(format!("invalid start date: {}", raw)))?,
        None => now.date(),
    };

    // A quote tag supplies the duration when none is given
    let mut duration = int_param(&query.duration_min).unwrap_or(0);
    if duration == 0 {
        if let Some(tag) = int_param(&query.tag).filter(|t| *t > 0) {
            if let Some(minutes) = state.repo.quote(tag as u64)?.and_then(|q| q.duration) {
                duration = i64::from(minutes);
            }
        }
    }

    let availability = AvailabilityQuery::new(
        start_date,
        int_param(&query.days).unwrap_or(DEFAULT_DAYS as i64),
        Some(duration),
        int_param(&query.lead_min).unwrap_or(state.settings.default_lead_min),
    )?;

    let (from, to) = availability.range();
    let opening = state.repo.opening_hours()?;
    let promos = state.repo.promo_rules()?;
    let booked = state.repo.booked_between(from, to)?;
    let blocks = state.repo.blocks_between(from, to)?;

    let inputs = ScheduleInputs { opening: &opening, promos: &promos, booked: &booked, blocks: &blocks };
    let days = generate_availability(&availability, &inputs, now);
    let data: Vec<DayResponse> = days.iter().map(DayResponse::from).collect();

    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

// Booking endpoint
async fn book(form: web::Form<BookingForm>, state: web::Data<AppState>) -> Handler {
    let receipt = book_appointment(
        state.repo.as_ref(),
        state.notifier.as_ref(),
        state.clock.as_ref(),
        &state.settings,
        &form,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "cancel_token": receipt.cancel_token,
        "cancel_token_expires_at": receipt.cancel_token_expires_at.to_rfc3339(),
        "cancel_url": receipt.cancel_url,
    })))
}

#[derive(Deserialize)]
pub struct TokenParam {
    token: Option<String>,
}

struct CancelPage<'a> {
    tone: &'a str,
    title: &'a str,
    message: &'a str,
    note: &'a str,
    reasons: Vec<&'a str>,
}

fn render_cancel_page(page: CancelPage<'_>) -> String {
    let reasons = if page.reasons.is_empty() {
        String::new()
    } else {
        let items: String = page.reasons.iter().map(|r| format!("<li>{}</li>", escape_html(r))).collect();
        format!("<ul class=\"reason-list\">{}</ul>", items)
    };

    include_str!("../templates/cancel.html")
        .replace("{{tone}}", page.tone)
        .replace("{{title}}", &escape_html(page.title))
        .replace("{{message}}", &escape_html(page.message))
        .replace("{{note}}", &escape_html(page.note))
        .replace("{{reasons}}", &reasons)
}

fn html(status: actix_web::http::StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status).content_type("text/html; charset=utf-8").body(body)
}

// Cancellation link target; always answers with a page, never JSON
async fn cancel(query: web::Query<TokenParam>, state: web::Data<AppState>) -> HttpResponse {
    use actix_web::http::StatusCode;

    let token = query.token.as_deref().unwrap_or_default();
    let outcome = cancel_by_token(state.repo.as_ref(), state.notifier.as_ref(), state.clock.as_ref(), token);

    match outcome {
        Ok(CancelOutcome::Cancelled(_)) => html(
            StatusCode::OK,
            render_cancel_page(CancelPage {
                tone: "success",
                title: "Rendez-vous annulé",
                message: "Votre rendez-vous a bien été annulé. Nous espérons vous revoir bientôt.",
                note: "Un SMS de confirmation vient de vous être envoyé. Merci pour votre confiance.",
                reasons: Vec::new(),
            }),
        ),
        Ok(CancelOutcome::InvalidLink) => html(
            StatusCode::BAD_REQUEST,
            render_cancel_page(CancelPage {
                tone: "error",
                title: "Lien invalide",
                message: "Le lien d'annulation est manquant ou incomplet.",
                note: "",
                reasons: Vec::new(),
            }),
        ),
        Ok(CancelOutcome::UnknownToken) => html(
            StatusCode::NOT_FOUND,
            render_cancel_page(CancelPage {
                tone: "error",
                title: "Annulation impossible",
                message: "Ce lien n'est plus valide ou a déjà été utilisé.",
                note: "Si vous pensez qu'il s'agit d'une erreur, contactez le support RIPAIR.",
                reasons: Vec::new(),
            }),
        ),
        Ok(CancelOutcome::Refused(reasons)) => html(
            StatusCode::FORBIDDEN,
            render_cancel_page(CancelPage {
                tone: "error",
                title: "Annulation impossible",
                message: "Ce rendez-vous ne peut plus être annulé en ligne.",
                note: "Merci de contacter directement RIPAIR pour toute assistance supplémentaire.",
                reasons: reasons.iter().map(|r| r.message()).collect(),
            }),
        ),
        Err(e) => {
            let id = debug_id();
            error!("[{}] cancellation failed: {}", id, e);
            html(
                StatusCode::INTERNAL_SERVER_ERROR,
                render_cancel_page(CancelPage {
                    tone: "error",
                    title: "Erreur serveur",
                    message: "Une erreur est survenue lors de l'annulation de votre rendez-vous.",
                    note: "Veuillez réessayer plus tard ou contacter notre support.",
                    reasons: Vec::new(),
                }),
            )
        }
    }
}

// Catalog endpoints
async fn get_options(query: web::Query<OptionsQuery>, state: web::Data<AppState>) -> Handler {
    let data = option_values(state.repo.as_ref(), &query)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
}

async fn get_options_full(state: web::Data<AppState>) -> Handler {
    let snapshot = full_catalog(state.repo.as_ref(), Utc::now())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": snapshot.rows.len(),
        "generated_at": snapshot.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        "last_update": snapshot.last_update,
        "data": snapshot.rows,
    })))
}

async fn devis(form: web::Form<DevisForm>, state: web::Data<AppState>) -> Handler {
    let (row, tag) = create_quote(state.repo.as_ref(), &form)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": row, "tag": tag })))
}

#[derive(Deserialize)]
pub struct TagParam {
    tag: Option<String>,
}

async fn get_quote(query: web::Query<TagParam>, state: web::Data<AppState>) -> Handler {
    let tag = parse_tag(query.tag.as_deref())?;
    let quote = find_quote(state.repo.as_ref(), tag)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": quote })))
}

// Options cache version
async fn options_version(state: web::Data<AppState>) -> Handler {
    let info = state.options_version.current(Utc::now());
    Ok(HttpResponse::Ok().json(json!({ "success": true, "version": info.version, "updated_at": info.updated_at })))
}

async fn bump_options_version(
    query: web::Query<TokenParam>,
    form: Option<web::Form<TokenParam>>,
    state: web::Data<AppState>,
) -> Handler {
    let provided = form
        .and_then(|f| f.into_inner().token)
        .or_else(|| query.token.clone())
        .unwrap_or_default();
    let info = state
        .options_version
        .bump(state.settings.options_cache_token.as_deref(), &provided, Utc::now())?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "version": info.version, "updated_at": info.updated_at })))
}

// Reviews
async fn post_review(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> Handler {
    // Unparseable bodies validate as an empty review
    let form: ReviewForm = serde_json::from_slice(&body).unwrap_or_default();
    let user_agent = req.headers().get("User-Agent").and_then(|v| v.to_str().ok());

    let id = submit_review(
        state.repo.as_ref(),
        state.clock.as_ref(),
        &state.settings,
        &form,
        client_ip(&req).as_deref(),
        user_agent,
    )?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": id, "status": "pending", "message": THANK_YOU })))
}

#[derive(Deserialize)]
pub struct LimitParam {
    limit: Option<String>,
}

async fn get_reviews(query: web::Query<LimitParam>, state: web::Data<AppState>) -> Handler {
    let feed = list_reviews(state.repo.as_ref(), int_param(&query.limit))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "meta": { "rating": feed.rating, "count": feed.count },
        "reviews": feed.reviews,
    })))
}

// Contact form
async fn contact(req: HttpRequest, form: web::Form<ContactForm>, state: web::Data<AppState>) -> Handler {
    let ip = client_ip(&req).unwrap_or_else(|| "unknown".to_string());
    send_contact_message(&state.contact_limiter, state.notifier.as_ref(), state.clock.as_ref(), &form, &ip)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Every API route; shared by the server and the integration tests
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/slots", web::get().to(get_slots))
        .route("/api/book", web::post().to(book))
        .route("/api/cancel", web::get().to(cancel))
        .route("/api/options", web::get().to(get_options))
        .route("/api/options/full", web::get().to(get_options_full))
        .route("/api/options/version", web::get().to(options_version))
        .route("/api/options/version/bump", web::post().to(bump_options_version))
        .route("/api/devis", web::post().to(devis))
        .route("/api/quote", web::get().to(get_quote))
        .route("/api/reviews", web::post().to(post_review))
        .route("/api/reviews", web::get().to(get_reviews))
        .route("/api/contact", web::post().to(contact));
}

pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let host = state.settings.host.clone();
    let port = state.settings.port;
    let static_dir = state.settings.static_dir.clone();
    let app_state = web::Data::new(state);

    if static_dir.is_dir() {
        info!("Serving static files from {}", static_dir.display());
    } else {
        warn!("Static directory {} not found, serving the API only", static_dir.display());
    }

    HttpServer::new(move || {
        let app = App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes);

        if static_dir.is_dir() {
            app.service(Files::new("/", static_dir.clone()).index_file("index.html"))
        } else {
            app
        }
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
