//! Tradepost - a marketplace admin backend
//!
//! Products with manual payment approval, a customer library, ads,
//! affiliate programs, blogs, newsletters, service listings, job postings
//! and sponsored posts, served as a JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod storage;
