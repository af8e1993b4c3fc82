pub mod authorize;
pub mod response;
pub mod session;

pub use authorize::{authorize, authorize_target, require, Decision, Denial, Policy};
pub use response::{ApiResponse, ApiResult};
pub use session::{clear_session_cookie, extract_session_token, session_cookie, session_middleware, SESSION_COOKIE};
