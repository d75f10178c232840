pub mod backends;
pub mod config;
pub mod convert;
pub mod domain;
pub mod engine;
pub mod error;
pub mod http;
pub mod input;
pub mod mapping;
pub mod output;
pub mod policy;
pub mod retry;
pub mod symbol_chain;
pub mod timer;
