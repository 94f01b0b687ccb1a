// ABOUTME: Library crate for the Elisa chat client exposing the session engine for the binary and tests

pub mod config;
pub mod i18n;
pub mod models;
pub mod quiz;
pub mod session;
pub mod transport;
