//! # Placard
//!
//! A minimal admin panel for template-based static sites, usable both as a
//! standalone binary and as a library.
//!
//! One administrator account, a handful of site-wide settings, and a catalog
//! of static HTML templates. The admin API is a small JSON surface; the
//! public entry point renders the selected template with the site settings
//! substituted in.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use placard::config::ServerConfig;
//! use placard::server::{AppState, create_router};
//! use placard::store::FileStore;
//!
//! let config = ServerConfig::default();
//! let store = Arc::new(FileStore::new(config.store_path()));
//! let state = Arc::new(AppState::new(store, &config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod render;
pub mod server;
pub mod store;
pub mod templates;
pub mod types;
