pub mod aspect;
pub mod domain;
pub mod error;
pub mod job;
