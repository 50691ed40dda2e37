pub mod payment;
pub mod profile;
pub mod resume;
