pub mod access;
pub mod activity;
pub mod background;
pub mod feed;
pub mod mapper;
pub mod realtime;
pub mod recurrence;
pub mod subscription;
pub mod types;
