use std::sync::Arc;

use log::info;

use repair_appointments::config::Settings;
use repair_appointments::display::{print_availability, write_availability_to_file};
use repair_appointments::notify::LogNotifier;
use repair_appointments::parser::load_seed;
use repair_appointments::schedule::generator::DEFAULT_DAYS;
use repair_appointments::schedule::{generate_availability, AvailabilityQuery, Clock, ScheduleInputs, SystemClock};
use repair_appointments::store::{InMemoryRepository, ShopRepository};
use repair_appointments::web::{self, AppState};

const DEFAULT_CLI_DURATION: i64 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut settings = Settings::from_env();

    // Check if we should run in web mode
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "web" {
        if let Some(port) = args.get(2).and_then(|p| p.parse::<u16>().ok()) {
            settings.port = port;
        }
        if settings.cancel_token_secret.is_none() {
            log::warn!("CANCEL_TOKEN_SECRET is not set, bookings will be refused");
        }

        let data = load_seed(&settings.data_dir)?;
        let state = AppState::new(
            Arc::new(InMemoryRepository::new(data)),
            Arc::new(SystemClock),
            Arc::new(LogNotifier { default_country_code: settings.sms_default_country_code.clone() }),
            settings,
        );

        info!("Starting web server on {}:{}", state.settings.host, state.settings.port);
        web::start_server(state).await?;
        return Ok(());
    }

    // CLI mode: availability for the coming days
    let duration = args.get(1).and_then(|d| d.parse::<i64>().ok()).unwrap_or(DEFAULT_CLI_DURATION);
    let days = args.get(2).and_then(|d| d.parse::<i64>().ok()).unwrap_or(DEFAULT_DAYS as i64);

    println!("Loading shop data from {}...", settings.data_dir.display());
    let repo = InMemoryRepository::new(load_seed(&settings.data_dir)?);

    let now = SystemClock.now();
    let query = AvailabilityQuery::new(now.date(), days, Some(duration), settings.default_lead_min)?;
    let (from, to) = query.range();
    let opening = repo.opening_hours()?;
    let promos = repo.promo_rules()?;
    let booked = repo.booked_between(from, to)?;
    let blocks = repo.blocks_between(from, to)?;
    let inputs = ScheduleInputs { opening: &opening, promos: &promos, booked: &booked, blocks: &blocks };

    let availability = generate_availability(&query, &inputs, now);
    print_availability(query.duration_min, &availability);

    write_availability_to_file(&availability, "availability.txt")?;
    println!("\nAvailability saved to availability.txt");

    Ok(())
}
