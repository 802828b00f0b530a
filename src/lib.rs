//! A small job-control shell: pipelines of external programs, input and
//! output redirection, and a polled table of the processes it spawned.

pub mod builtin;
pub mod config;
pub mod error;
pub mod eval;
pub mod global;
pub mod job;
pub mod launch;
pub mod logger;
pub mod parser;
pub mod pipe;
pub mod types;
