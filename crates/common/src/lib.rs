//! Contact Cards Common Library
//!
//! Data model shared by the grader and its test doubles: the contact card
//! record, a per-owner scoped SQLite store, and image encoding helpers.

pub mod contact;
pub mod db;
pub mod error;
pub mod image;

// Re-export commonly used types
pub use contact::{ContactField, ContactRecord, Owner};
pub use db::ContactStore;
pub use error::{Error, Result};
pub use image::image_to_data_url;
