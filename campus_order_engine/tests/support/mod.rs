#![allow(dead_code)]
pub mod prepare_env;

use campus_order_engine::{events::EventProducers, OrderFlowApi, OrderStoreDatabase, SqliteDatabase};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::prepare_env::{prepare_test_env, random_db_path};

pub async fn setup() -> OrderFlowApi<SqliteDatabase> {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    OrderFlowApi::new(db, producers)
}

pub async fn tear_down(mut api: OrderFlowApi<SqliteDatabase>) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    drop(api);
    Sqlite::drop_database(&url).await.unwrap();
}
