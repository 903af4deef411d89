// Library for tests to access modules

pub mod announcer;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod poller;
pub mod preferences;
pub mod report_hub;
pub mod routes;
pub mod volume_source;
pub mod warning;
