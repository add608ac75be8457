pub mod config;
pub mod content;
pub mod error;
pub mod io;
pub mod job;
pub mod paths;
pub mod playbook;
pub mod repo;
pub mod types;

pub use error::{PlaysError, Result};
