pub mod cache;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod ranking;
pub mod tx;
