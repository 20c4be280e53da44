//! Core domain types and logic.

pub mod analysis;
pub mod config_validation;
pub mod correlation;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod portfolio;
pub mod position;
pub mod predicate;
pub mod predicate_eval;
pub mod predicate_parser;
pub mod query;
pub mod rating;
pub mod reconcile;
pub mod record;
pub mod report;
