//! Application services: catalog, cache, write-behind persistence and the
//! coordinator that ties them together.

pub mod cache;
pub mod catalog;
pub mod coordinator;
pub mod query_handlers;
pub mod write_behind;
