// handlers/admin/mod.rs - Admin handlers under /api/v1/admin
//
// Every route here sits behind the api key, the access token and a
// per-route permission guard (see app.rs).
pub mod api_key;
pub mod permission;
pub mod role;
pub mod setting;
pub mod user;
