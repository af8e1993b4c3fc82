// handlers/elevated/mod.rs - Elevated handlers (ADMIN session required)
//
// Route Prefix: /api/admin/*
// Middleware: session resolution + require(Policy::ADMIN), and
// require(Policy::ADMIN_NOT_SELF) on routes that destroy the `:id` identity.

pub mod admin;

/*
ADMIN OPERATIONS:

- GET    /api/admin/users                    newest first, never a password hash
- DELETE /api/admin/users/:id                cascades accounts and sessions in one
                                             transaction; never your own id
- PUT    /api/admin/users/:id/toggle-status  email verified ⇄ unverified
- POST   /api/admin/make-admin               { "email": "..." } → role ADMIN

Role changes take effect on the target's next request: the session layer
re-reads the role from the identity every time.
*/
