//! Blogroll - A blog platform backend
//!
//! Users register and confirm their account by e-mail, authenticate with a
//! JWT, and publish blog posts, comments and images according to a
//! hierarchical role set.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
