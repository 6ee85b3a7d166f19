#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::DatabaseFairing;
use crate::logging::LoggerFairing;
use crate::realtime::Notifier;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod lottery;
pub mod model;
pub mod realtime;

/// Build the server. The database connection is made when it ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(DatabaseFairing)
        .manage(Notifier::new())
}

/// Build the server on top of an existing database connection.
#[cfg(test)]
async fn rocket_for_db(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = db_client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .manage(db_client)
        .manage(db)
        .manage(Notifier::new())
}

/// Connect to the database named by `db_uri` in the Rocket config.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database with `db_uri` {db_uri}: {e}"))
}

/// A fresh database name, so that concurrently running tests don't collide.
#[cfg(test)]
fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_manages_a_notifier() {
        assert!(build().state::<Notifier>().is_some());
    }
}
