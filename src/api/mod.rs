//! HTTP query API

pub mod clustering;
pub mod error;
pub mod health;
pub mod openapi;
pub mod overview;
