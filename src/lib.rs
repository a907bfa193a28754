//
// lib.rs
// Dicom-Deface
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - October 2026

// Core transforms.
pub mod mask;
pub mod plane;

// Per-file pipeline and batch plumbing.
pub mod anonymize;
pub mod batch;
pub mod cli;
pub mod dicom_access;
pub mod image;
pub mod layout;
pub mod metadata;
pub mod models;
pub mod pixels;
pub mod progress;
pub mod slice;
pub mod web;

pub use cli::{run as run_cli, Cli, Commands};
pub use mask::{apply_mask, generate_mask, MaskError, MaskMatrix};
pub use plane::{classify_orientation, classify_plane, ImageOrientation, PlaneLabel, Unclassifiable};
