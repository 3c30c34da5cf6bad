pub use entity::{insights, sessions, snippets, users, Id};

pub mod error;
pub mod insight;
pub mod session;
pub mod snippet;
pub mod user;
