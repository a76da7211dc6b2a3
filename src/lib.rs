pub mod address;
pub mod collector;
pub mod config;
pub mod dry_run;
pub mod error;
pub mod events;
pub mod metadata;
pub mod repository;
pub mod rollup;
pub mod rpc;
pub mod scanner;
