pub mod notify;
pub mod pdf;
