//! HTTP controllers.

pub mod dashboard_controller;
pub mod status_controller;
