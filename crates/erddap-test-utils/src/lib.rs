//! Shared test fixtures for the erddap-deploy workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`fragments`] builds datasets.xml documents and fragment directories
//! - [`git`] creates real upstream repositories to clone and pull from

pub mod fragments;
pub mod git;
