pub mod access;
pub mod dashboard;
