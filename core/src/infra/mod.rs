//! Infrastructure layer - storage and sync engine

pub mod db;
pub mod sync;
