//! Cover letter requests from buttons and links

mod reference;
mod resolver;

pub use reference::{ActionKind, ActionRef};
pub use resolver::{ActionResolver, Delivery, Documents, PendingLetter, Rejection, Resolution};
