pub mod client;
pub mod lead;
pub mod phone;
pub mod session;
