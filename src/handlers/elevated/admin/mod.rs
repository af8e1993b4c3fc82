pub mod make_admin;
pub mod users;

pub use make_admin::make_admin_post;
pub use users::{user_delete, user_toggle_status, users_list};
