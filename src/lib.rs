// Library for tests to access modules

pub mod config;
pub mod error;
pub mod mapper;
pub mod models;
pub mod probe_repo;
pub mod routes;
pub mod scheduler;
pub mod store;
