//! # Palisade Authorization
//!
//! Access decisions and where they come from.
//!
//! - [`PolicyPredicate`] and [`AccessPolicy`]: attribute-based policies that
//!   evaluate to time-bounded decisions
//! - [`DecisionStore`]: decisions in specificity order, one per pattern
//! - [`AuthorizationManager`]: the enforcement point's cache of decisions,
//!   fetched from the decision point on demand
//! - [`AuthorizationController`]: the decision point answering access requests
//!
//! Every path that cannot establish a GRANT ends in a reject.

pub mod controller;
pub mod manager;
pub mod policy;
pub mod predicate;
pub mod store;

pub use controller::{
    AuthorizationController, DecisionRefresher, REFRESH_THRESHOLD, SLEEP_OFFSET,
    STATIC_DECISION_VALIDITY,
};
pub use manager::AuthorizationManager;
pub use policy::{AccessPolicy, FALLBACK_DENY_VALIDITY};
pub use predicate::{Evaluation, NumericOperator, PolicyPredicate};
pub use store::DecisionStore;
