pub mod admin;
pub mod password;
pub mod serve;
