pub mod achievement;
pub mod entry;
pub mod reminder;
pub mod user;
