// handlers/user/mod.rs - Self-service user endpoints under /api/v1/user
pub mod change_password;
pub mod info;
pub mod login;
pub mod refresh;

pub use change_password::change_password;
pub use info::info;
pub use login::{login, TokenResponse};
pub use refresh::refresh;
