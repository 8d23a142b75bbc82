//! # Microtms
//!
//! A minimal forward-chaining rule engine with truth maintenance.
//!
//! ## Features
//!
//! - Forward chaining to fixpoint on every assertion
//! - Justification tracking: retracting a premise retracts everything derived
//!   solely from it, and nothing that is still supported or asserted
//! - Pattern queries over stored facts
//!
//! ## Example
//!
//! ```rust
//! use microtms::{Implication, KnowledgeBase, Statement};
//!
//! let mut kb = KnowledgeBase::new();
//! kb.assert(Statement::new("on", ["a", "b"])).unwrap();
//! kb.assert(Implication::new(
//!     [Statement::new("on", ["?x", "?y"])],
//!     Statement::new("above", ["?x", "?y"]),
//! ))
//! .unwrap();
//!
//! let answers = kb.ask(Statement::new("above", ["a", "?z"]));
//! assert_eq!(answers.len(), 1);
//! assert_eq!(answers[0].bindings.to_string(), "?z : b");
//!
//! kb.retract(Statement::new("on", ["a", "b"]));
//! assert!(kb.ask(Statement::new("above", ["a", "?z"])).is_empty());
//! ```

/// Knowledge base, inference and retraction.
pub mod engine;
/// Error type.
pub mod error;
/// Support bookkeeping between facts and rules.
pub mod justification;
/// Knowledge file reader.
#[cfg(feature = "parsing")]
pub mod reader;
/// Terms and statements.
pub mod term;
/// Unification and instantiation.
pub mod unify;

pub use engine::{Answer, Fact, Implication, Knowledge, KnowledgeBase, Rule};
pub use error::{Error, Result};
pub use justification::{FactId, Justification, Node, RuleId, Support};
pub use term::{Statement, Term};
pub use unify::{instantiate, unify, Bindings};
