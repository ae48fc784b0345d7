pub mod audit;
pub mod clip;
pub mod job;
pub mod montage;
pub mod user;
