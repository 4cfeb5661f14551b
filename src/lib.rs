//! Turns changelog web pages into flat lists of tagged change records.
//!
//! Pipeline, per document: [`markup`] parses the page, [`block`] extracts,
//! prunes and classifies a block tree, [`flatten`] walks it into
//! [`flatten::ChangeRecord`]s using [`tags`] to clean category headings.
//! Per batch: [`casing`] reconciles tag spellings and reports near-duplicate
//! tags. [`harvest`] drives the whole run over a [`contract::PageFetcher`].

pub mod block;
pub mod casing;
pub mod cli;
pub mod config;
pub mod contract;
pub mod document;
pub mod download;
pub mod flatten;
pub mod harvest;
pub mod load_config;
pub mod markup;
pub mod output;
pub mod tags;
