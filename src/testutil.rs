use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::{Actor, Credentials, SqliteCredentials},
    db,
    events::{self, Event, NewEvent},
    exhibitors::ExhibitorApplication,
    model::{EventType, Role},
    users::{self, NewUser},
    venues::{self, NewVenue},
};

/// Fresh in-memory database with the schema applied. A single connection that
/// never expires keeps the database alive for the whole test.
pub async fn pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON").execute(&db_pool).await.unwrap();
    db::migrate(&db_pool).await.unwrap();
    db_pool
}

pub fn credentials(db_pool: &SqlitePool) -> SqliteCredentials {
    SqliteCredentials::new(db_pool.clone(), Duration::hours(1))
}

pub async fn user(db_pool: &SqlitePool, role: Role) -> Actor {
    let credentials = credentials(db_pool);
    let id = Uuid::now_v7();
    let user = users::create(
        db_pool,
        &credentials as &dyn Credentials,
        NewUser {
            name: format!("{role} {}", &id.simple().to_string()[24..]),
            email: format!("{}@example.com", id.simple()),
            password: "correct horse".into(),
            role,
        },
    )
    .await
    .unwrap();
    Actor { id: user.id, role: user.role }
}

pub async fn venue(db_pool: &SqlitePool, owner: &Actor) -> Uuid {
    let venue = venues::create(
        db_pool,
        owner,
        NewVenue {
            name: "Convention Center".into(),
            address: "500 Harbor Way".into(),
            city: "Portside".into(),
            capacity: 1000,
            amenities: vec!["wifi".into()],
        },
    )
    .await
    .unwrap();
    venue.id
}

pub fn new_event(venue_id: Uuid, max_capacity: i64, ticket_price: f64) -> NewEvent {
    let start_date = OffsetDateTime::now_utc() + Duration::days(30);
    NewEvent {
        title: "RustConf".into(),
        description: "Talks and workshops".into(),
        image: None,
        event_type: EventType::Conference,
        start_date,
        end_date: start_date + Duration::hours(8),
        venue_id,
        max_capacity,
        ticket_price,
    }
}

/// A draft event at a new venue, organized by `organizer`.
pub async fn event(db_pool: &SqlitePool, organizer: &Actor, max_capacity: i64, ticket_price: f64) -> Event {
    let venue_id = venue(db_pool, organizer).await;
    events::create(db_pool, organizer, new_event(venue_id, max_capacity, ticket_price))
        .await
        .unwrap()
}

pub fn booth_application() -> ExhibitorApplication {
    ExhibitorApplication {
        company_name: Some("Widgets Ltd".into()),
        booth_size: "3x3".into(),
        description: Some("Widgets of all sizes".into()),
        logo_url: None,
    }
}
