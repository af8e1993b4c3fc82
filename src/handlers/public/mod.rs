// handlers/public/mod.rs - Public handlers (no session required)
//
// Session acquisition and release: credentials, OAuth redirects and callbacks.
// Route Prefix: /auth/*
// Middleware: session resolution only (never rejects)

pub mod auth;
