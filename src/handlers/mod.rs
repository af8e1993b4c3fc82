// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no session) → Protected (session required) → Elevated (ADMIN session required)
//
// Tiers differ only in the `Policy` the router attaches with `require`;
// handlers never re-check roles themselves.
pub mod public;    // Tier 1: /auth/*
pub mod protected; // Tier 2: /api/* (session)
pub mod elevated;  // Tier 3: /api/admin/* (ADMIN)
