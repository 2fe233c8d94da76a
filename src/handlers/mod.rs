// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod evaluation;
pub mod prize;
pub mod profile;
pub mod quiz;
