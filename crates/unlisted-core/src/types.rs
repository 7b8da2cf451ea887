//! Core types for Unlisted

mod contact;
mod file;

pub use contact::{Contact, ContactId, SendAddress};
pub use file::{ContentAddress, File, FileList};
