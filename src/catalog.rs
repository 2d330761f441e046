use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ShopError;
use crate::form::trimmed;
use crate::schedule::format_datetime;
use crate::store::{Quote, RepairPrice, ShopRepository};

#[derive(Debug, Default, Deserialize)]
pub struct OptionsQuery {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DevisForm {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub problem: Option<String>,
}

/// Whole catalog with freshness metadata
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub rows: Vec<RepairPrice>,
    pub generated_at: DateTime<Utc>,
    pub last_update: Option<String>,
}

/// Next level of the category > brand > model > problem picker.
/// Only a prefix of the three filters may be set.
pub fn option_values(repo: &dyn ShopRepository, query: &OptionsQuery) -> Result<Vec<String>, ShopError> {
    let category = trimmed(&query.category);
    let brand = trimmed(&query.brand);
    let model = trimmed(&query.model);

    let level: fn(&RepairPrice) -> &str = match (category.is_empty(), brand.is_empty(), model.is_empty()) {
        (true, true, true) => |r| r.category.as_str(),
        (false, true, true) => |r| r.brand.as_str(),
        (false, false, true) => |r| r.model.as_str(),
        (false, false, false) => |r| r.problem.as_str(),
        _ => return Err(ShopError::BadParams("filters must be given in order: category, brand, model".into())),
    };

    let values: BTreeSet<String> = repo
        .repairs()?
        .iter()
        .filter(|r| category.is_empty() || r.category == category)
        .filter(|r| brand.is_empty() || r.brand == brand)
        .filter(|r| model.is_empty() || r.model == model)
        .map(|r| level(r).to_string())
        .collect();
    Ok(values.into_iter().collect())
}

pub fn full_catalog(repo: &dyn ShopRepository, generated_at: DateTime<Utc>) -> Result<CatalogSnapshot, ShopError> {
    let mut rows = repo.repairs()?;
    rows.sort_by(|a, b| {
        (&a.category, &a.brand, &a.model, &a.problem).cmp(&(&b.category, &b.brand, &b.model, &b.problem))
    });
    let last_update = rows.iter().filter_map(|r| r.updated_at).max().map(format_datetime);

    Ok(CatalogSnapshot { rows, generated_at, last_update })
}

/// Looks up the exact repair and records it as a new quote
pub fn create_quote(repo: &dyn ShopRepository, form: &DevisForm) -> Result<(RepairPrice, u64), ShopError> {
    let fields = [
        ("category", trimmed(&form.category)),
        ("brand", trimmed(&form.brand)),
        ("model", trimmed(&form.model)),
        ("problem", trimmed(&form.problem)),
    ];
    let missing: Vec<&'static str> = fields.iter().filter(|(_, v)| v.is_empty()).map(|(k, _)| *k).collect();
    if !missing.is_empty() {
        return Err(ShopError::MissingFields(missing));
    }

    let [(_, category), (_, brand), (_, model), (_, problem)] = &fields;
    let repair = repo.find_repair(category, brand, model, problem)?.ok_or(ShopError::NoMatch)?;
    let tag = repo.insert_quote(&repair)?;
    Ok((repair, tag))
}

/// Parses a raw tag parameter; absent, garbage and non-positive values are all missing
pub fn parse_tag(raw: Option<&str>) -> Result<u64, ShopError> {
    raw.and_then(|t| t.trim().parse::<i64>().ok())
        .filter(|t| *t > 0)
        .map(|t| t as u64)
        .ok_or(ShopError::MissingTag)
}

pub fn find_quote(repo: &dyn ShopRepository, tag: u64) -> Result<Quote, ShopError> {
    repo.quote(tag)?.ok_or(ShopError::NotFound)
}
