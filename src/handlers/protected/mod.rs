// handlers/protected/mod.rs - Protected handlers (session required)
//
// Route Prefix: /api/*
// Middleware: session resolution + require(Policy::SIGNED_IN)
//
// Each handler takes the caller's `Session`; provider tokens come from it,
// never from the request body.

pub mod account;  // POST /api/auth/unlink/facebook
pub mod ads;      // POST /api/facebook-ads/sync, GET /api/facebook-ads/archive
pub mod facebook; // GET /api/facebook/insights
pub mod powerbi;  // GET /api/powerbi/embed-token

pub use account::unlink_facebook_post;
pub use ads::{ads_archive_get, ads_sync_post};
pub use facebook::insights_get;
pub use powerbi::embed_token_get;
