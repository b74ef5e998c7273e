//! Sweepwatch: Los Angeles street sweeping schedules and reminders.
//!
//! The core is the sweep calendar and projector: given a street's posted
//! weekday and week-of-month code, they say which dates are sweep days
//! under the city's posted-week calendar and holiday exemptions. Around it
//! sit the subscription store, the daily reminder dispatcher, ArcGIS
//! lookups, the Telegram bot, and the HTTP lookup endpoints.

pub mod app;
pub mod bot;
pub mod calendar;
pub mod config;
pub mod db;
pub mod format;
pub mod logging;
pub mod lookup;
pub mod notify;
pub mod projector;
pub mod schedule;
pub mod web;

pub use app::App;
pub use config::Config;
