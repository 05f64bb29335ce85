use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boxoffice::config::Config;
use boxoffice::db::{self, queries, AppState};
use boxoffice::error::Result;
use boxoffice::handlers;
use boxoffice::models::{CreateEvent, CreatePromoCode, CreateTicketType, CreateUser, DiscountType};
use boxoffice::notify::{spawn_notification, NotifyEvent};
use boxoffice::payments::paystack::PaystackClient;

/// How often the reminder drain wakes up.
const REMINDER_DRAIN_INTERVAL: Duration = Duration::from_secs(60);
const REMINDER_BATCH_SIZE: i64 = 100;

#[derive(Parser)]
#[command(name = "boxoffice", about = "Event ticketing backend")]
struct Cli {
    /// Seed the database with a demo organizer, event, and promo code
    /// (dev mode only)
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = pool.get().expect("Failed to get database connection");
        db::init_db(&conn).expect("Failed to initialize database");
    }

    if cli.seed {
        if !config.dev_mode {
            eprintln!("--seed is only available when BOXOFFICE_ENV=dev");
            std::process::exit(1);
        }
        let conn = pool.get().expect("Failed to get database connection");
        seed_dev_data(&conn).expect("Failed to seed dev data");
        return;
    }

    let state = AppState {
        db: pool,
        base_url: config.base_url.clone(),
        gateway: Arc::new(PaystackClient::new(config.gateway_secret_key.clone())),
        scan_key: config.scan_key.clone(),
        cache: Default::default(),
        notify_webhook_url: config.notify_webhook_url.clone(),
    };

    spawn_reminder_drain(state.clone());

    let app = handlers::public_router()
        .merge(handlers::authed_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutting down");
}

/// Periodically drain due event reminders and dispatch them as notifications.
///
/// Each reminder is marked sent before its notification is spawned, so a
/// delivery failure drops the reminder rather than repeating it.
fn spawn_reminder_drain(state: AppState) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(REMINDER_DRAIN_INTERVAL).await;

            let due = match state.db.get() {
                Ok(conn) => queries::due_reminders(&conn, queries::now(), REMINDER_BATCH_SIZE),
                Err(e) => {
                    tracing::warn!("Reminder drain could not get a connection: {}", e);
                    continue;
                }
            };

            match due {
                Ok(reminders) => {
                    for reminder in reminders {
                        let marked = state
                            .db
                            .get()
                            .map_err(boxoffice::error::AppError::from)
                            .and_then(|conn| queries::mark_reminder_sent(&conn, &reminder.id));
                        match marked {
                            Ok(true) => {
                                spawn_notification(
                                    state.notify_webhook_url.clone(),
                                    NotifyEvent::new(
                                        "event_reminder",
                                        &reminder.buyer_id,
                                        &reminder.event_id,
                                        Some(&reminder.ticket_id),
                                    ),
                                );
                            }
                            Ok(false) => {} // another drain already sent it
                            Err(e) => {
                                tracing::warn!("Failed to mark reminder {}: {}", reminder.id, e)
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("Reminder drain query failed: {}", e),
            }
        }
    });
}

/// Seed a demo organizer, buyer, event with two tiers, and a promo code,
/// printing the API keys so requests can be made immediately.
fn seed_dev_data(conn: &rusqlite::Connection) -> Result<()> {
    let (organizer, organizer_key) = queries::create_user(
        conn,
        &CreateUser {
            email: "organizer@example.com".to_string(),
            name: "Demo Organizer".to_string(),
        },
    )?;
    let (buyer, buyer_key) = queries::create_user(
        conn,
        &CreateUser {
            email: "buyer@example.com".to_string(),
            name: "Demo Buyer".to_string(),
        },
    )?;

    let event = queries::create_event(
        conn,
        &organizer.id,
        &CreateEvent {
            title: "Warehouse Sessions Vol. 3".to_string(),
            price_cents: 5000,
            capacity: 200,
            reminder_offset_mins: Some(120),
            starts_at: queries::now() + 30 * 24 * 3600,
        },
    )?;
    queries::create_ticket_type(
        conn,
        &event.id,
        &CreateTicketType {
            name: "General Admission".to_string(),
            price_cents: 5000,
            capacity: 180,
            sort_order: 0,
        },
    )?;
    queries::create_ticket_type(
        conn,
        &event.id,
        &CreateTicketType {
            name: "VIP".to_string(),
            price_cents: 15000,
            capacity: 20,
            sort_order: 1,
        },
    )?;

    let promo = queries::create_promo_code(
        conn,
        &organizer.id,
        &CreatePromoCode {
            code: "EARLYBIRD".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 20,
            event_id: Some(event.id.clone()),
            max_uses: Some(50),
            expires_at: None,
        },
    )?;

    println!("Seeded demo data:");
    println!("  organizer: {} (API key: {})", organizer.email, organizer_key);
    println!("  buyer:     {} (API key: {})", buyer.email, buyer_key);
    println!("  event:     {} ({})", event.title, event.id);
    println!("  promo:     {} ({}% off)", promo.code, promo.discount_value);
    Ok(())
}
