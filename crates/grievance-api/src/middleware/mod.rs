//! Request middleware.

mod admin_guard;

pub use admin_guard::admin_guard;
