//! SQLite order store backend for the campus order engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
