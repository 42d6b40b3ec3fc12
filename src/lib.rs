//! taalsync: offline-first sync engine for Dutch study projects.
//!
//! Reconciles a local SQLite study database against a cloud document
//! store where each project lives in its own folder as a JSON manifest
//! plus optional audio. Study progress merges monotonically, so work
//! done on any device is never lost.

pub mod cli;
pub mod config;
pub mod db;
pub mod download;
pub mod manifest;
pub mod merge;
pub mod remote;
pub mod sync;

#[cfg(test)]
mod merge_test;
