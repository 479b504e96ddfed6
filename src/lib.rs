// Library for tests to access modules

pub mod alert;
pub mod config;
pub mod cycle;
pub mod diff;
pub mod maintenance_worker;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod plugin;
pub mod report;
pub mod rollup;
pub mod routes;
pub mod source;
pub mod store;
pub mod version;
pub mod worker;
