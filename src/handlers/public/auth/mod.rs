// handlers/public/auth/mod.rs - Session acquisition endpoints

pub mod oauth;    // GET /auth/signin/:provider, GET /auth/callback/:provider
pub mod register; // POST /auth/register
pub mod session;  // GET /auth/session
pub mod signin;   // POST /auth/signin
pub mod signout;  // POST /auth/signout
pub mod utils;

pub use oauth::{oauth_callback, oauth_signin};
pub use register::register_post;
pub use session::session_get;
pub use signin::signin_post;
pub use signout::signout_post;

/*
SESSION LIFECYCLE:

1. **Credentials**: POST /auth/signin
   - Input: { "email": "string", "password": "string" }
   - Any failure answers 401 "Invalid email or password"
   - Issues a session with no provider tokens

2. **OAuth**: GET /auth/signin/:provider → provider → GET /auth/callback/:provider
   - `state` is a short-lived signed token bound to the provider
   - Facebook sign-in embeds the Facebook token (Graph API access)
   - Azure AD sign-in embeds the Azure token as the Power BI token
   - Finds or creates the identity by email and upserts the linked account

3. **Every request**: the session middleware verifies the token, checks the
   server-side session record, and re-signs the token with the same expiry

4. **Sign-out**: POST /auth/signout deletes the record, so the token is dead
   even before it expires
*/
