pub mod api;
pub mod auth;
pub mod domain;
pub mod jwt;
pub mod ledger;
pub mod milestones;
pub mod progress;
