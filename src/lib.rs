//! Walk a directory tree of photos one at a time, staging renames, moves and
//! deletions that are applied in a single commit pass.

pub mod app;
pub mod config;
pub mod coordinator;
pub mod edits;
pub mod image_loader;
pub mod models;
pub mod prefetch;
pub mod recent;
pub mod scanner;
pub mod viewer;
