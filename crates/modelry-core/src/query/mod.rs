//! Query building and evaluation.
//!
//! Attribute criteria are translated into a conjunctive [`Predicate`] list by the
//! [`PredicateBuilder`]; a [`Query`] carries that list lazily until it is run against a
//! [`QueryExecutor`].

mod builder;
mod filter;
mod predicate;

pub use builder::{Criteria, FilterValue, PredicateBuilder, Query, QueryExecutor};
pub use filter::FilterEvaluator;
pub use predicate::Predicate;
