use chrono::Duration;
use log::info;
use serde::Serialize;

use crate::config::Settings;
use crate::crypto::{sha256_hex, Signer};
use crate::error::ShopError;
use crate::form::review::truncate_user_agent;
use crate::form::{validate_review, ReviewForm};
use crate::schedule::clock::to_shop_time;
use crate::schedule::Clock;
use crate::store::{NewReview, Review, ShopRepository};

pub const REVIEW_INTERVAL_SECS: i64 = 60;
pub const DEFAULT_REVIEW_LIMIT: usize = 60;
pub const MAX_REVIEW_LIMIT: usize = 200;
pub const THANK_YOU: &str = "Merci ! Votre avis a bien été envoyé et sera publié après validation.";
const ANONYMOUS_AUTHOR: &str = "Client RIPAIR";

/// A review as shown on the public site
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicReview {
    pub id: u64,
    pub author_name: String,
    pub rating: u8,
    pub text: String,
    pub time: i64,
    pub source: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewFeed {
    pub rating: Option<f64>,
    pub count: usize,
    pub reviews: Vec<PublicReview>,
}

/// Keyed hash of the client address; plain SHA-256 when no secret is set
pub fn ip_hash(ip: &str, secret: Option<&str>) -> Option<String> {
    if ip.is_empty() {
        return None;
    }
    let keyed = secret.filter(|s| !s.is_empty()).and_then(|s| Signer::new(s.as_bytes()).ok());
    Some(match keyed {
        Some(signer) => signer.sign_hex(ip.as_bytes()),
        None => sha256_hex(ip.as_bytes()),
    })
}

/// Validates and stores a review as pending; returns its id
pub fn submit_review(
    repo: &dyn ShopRepository,
    clock: &dyn Clock,
    settings: &Settings,
    form: &ReviewForm,
    client_ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<u64, ShopError> {
    let review = validate_review(form)?;
    let now = clock.now();

    let hash = client_ip.and_then(|ip| ip_hash(ip, settings.reviews_ip_hash_secret.as_deref()));
    if let Some(hash) = &hash {
        let since = now - Duration::seconds(REVIEW_INTERVAL_SECS);
        if repo.reviews_since(hash, since)? > 0 {
            return Err(ShopError::TooManyRequests { remaining_secs: None });
        }
    }

    let id = repo.insert_review(NewReview {
        rating: review.rating,
        comment: review.comment,
        first_name: review.first_name,
        last_name: review.last_name,
        show_name: review.show_name,
        ip_hash: hash,
        user_agent: user_agent.and_then(truncate_user_agent),
        source_page: review.source_page,
        created_at: now,
    })?;
    info!("Review {} received ({} stars), pending moderation", id, review.rating);
    Ok(id)
}

pub fn clamp_limit(raw: Option<i64>) -> usize {
    match raw {
        Some(limit) => limit.clamp(1, MAX_REVIEW_LIMIT as i64) as usize,
        None => DEFAULT_REVIEW_LIMIT,
    }
}

fn author_name(review: &Review) -> String {
    if review.show_name {
        let name = format!(
            "{} {}",
            review.first_name.as_deref().unwrap_or_default(),
            review.last_name.as_deref().unwrap_or_default()
        );
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    ANONYMOUS_AUTHOR.to_string()
}

pub fn public_review(review: &Review) -> PublicReview {
    PublicReview {
        id: review.id,
        author_name: author_name(review),
        rating: review.rating,
        text: review.comment.clone(),
        time: to_shop_time(review.created_at).timestamp(),
        source: "ripair",
    }
}

/// Approved reviews newest first, with their average rating rounded to two decimals
pub fn list_reviews(repo: &dyn ShopRepository, limit: Option<i64>) -> Result<ReviewFeed, ShopError> {
    let reviews: Vec<PublicReview> = repo.approved_reviews(clamp_limit(limit))?.iter().map(public_review).collect();

    let count = reviews.len();
    let rating = (count > 0).then(|| {
        let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
        (f64::from(sum) / count as f64 * 100.0).round() / 100.0
    });
    Ok(ReviewFeed { rating, count, reviews })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::FixedClock;
    use crate::store::{InMemoryRepository, ReviewStatus};
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn at(minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap().and_hms_opt(10, minute, second).unwrap()
    }

    fn form(rating: u8, show_name: bool) -> ReviewForm {
        serde_json::from_value(json!({
            "rating": rating,
            "comment": "Ecran changé en une heure, parfait.",
            "first_name": "Léa",
            "last_name": "Martin",
            "show_name": show_name,
        }))
        .unwrap()
    }

    #[test]
    fn ip_hash_prefers_keyed_digest() {
        let keyed = ip_hash("203.0.113.9", Some("secret")).unwrap();
        let plain = ip_hash("203.0.113.9", None).unwrap();
        assert_eq!(plain, sha256_hex(b"203.0.113.9"));
        assert_ne!(keyed, plain);
        assert_eq!(ip_hash("", Some("secret")), None);
    }

    #[test]
    fn one_review_per_minute_per_address() {
        let repo = InMemoryRepository::default();
        let settings = Settings::default();
        let ip = Some("203.0.113.9");

        submit_review(&repo, &FixedClock(at(0, 0)), &settings, &form(5, true), ip, Some("Mozilla")).unwrap();
        let err = submit_review(&repo, &FixedClock(at(0, 59)), &settings, &form(4, true), ip, None).unwrap_err();
        assert!(matches!(err, ShopError::TooManyRequests { remaining_secs: None }));

        submit_review(&repo, &FixedClock(at(0, 30)), &settings, &form(4, true), Some("198.51.100.1"), None).unwrap();
        submit_review(&repo, &FixedClock(at(1, 1)), &settings, &form(4, true), ip, None).unwrap();
    }

    #[test]
    fn feed_shows_only_approved_with_author_rules() {
        let repo = InMemoryRepository::default();
        let settings = Settings::default();
        let first = submit_review(&repo, &FixedClock(at(0, 0)), &settings, &form(5, true), None, None).unwrap();
        let second = submit_review(&repo, &FixedClock(at(5, 0)), &settings, &form(4, false), None, None).unwrap();
        submit_review(&repo, &FixedClock(at(9, 0)), &settings, &form(1, true), None, None).unwrap();

        repo.set_review_status(first, ReviewStatus::Approved).unwrap();
        repo.set_review_status(second, ReviewStatus::Approved).unwrap();

        let feed = list_reviews(&repo, None).unwrap();
        assert_eq!(feed.count, 2);
        assert_eq!(feed.rating, Some(4.5));
        assert_eq!(feed.reviews[0].author_name, "Client RIPAIR");
        assert_eq!(feed.reviews[1].author_name, "Léa Martin");
        assert_eq!(feed.reviews[1].time, 1741597200);
        assert_eq!(feed.reviews[1].source, "ripair");

        assert_eq!(list_reviews(&repo, Some(1)).unwrap().count, 1);
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 60);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 200);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
