pub mod account;
pub mod identity;
pub mod session;

pub use account::{LinkedAccount, NewLinkedAccount, Provider};
pub use identity::{Identity, NewIdentity, Role};
pub use session::SessionRecord;
