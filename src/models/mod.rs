// src/models/mod.rs

pub mod attempt;
pub mod prize;
pub mod question;
pub mod quiz;
pub mod redemption;
pub mod user;
