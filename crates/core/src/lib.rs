pub mod audit;
pub mod error;
pub mod events;
pub mod ffmpeg;
pub mod limits;
pub mod media;
pub mod naming;
pub mod payload;
pub mod scheduling;
pub mod status;
pub mod types;
