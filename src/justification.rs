//! Justification bookkeeping shared by facts and rules.
//!
//! Every stored fact or rule records what supports it (`supported_by`) and
//! what it supports (`supports_facts`, `supports_rules`). Together these form
//! a graph rooted at asserted entities. The knowledge base keeps the two
//! directions symmetric: `X` lists `D` as a dependent iff some support pair of
//! `D` mentions `X`.

use std::fmt;

use indexmap::IndexSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Handle to a fact stored in a [`KnowledgeBase`](crate::KnowledgeBase).
///
/// Handles are never reused, so a handle to a retracted fact stays dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FactId(pub(crate) u64);

/// Handle to a rule stored in a [`KnowledgeBase`](crate::KnowledgeBase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleId(pub(crate) u64);

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact#{}", self.0)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// A node of the justification graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Node {
    /// A stored fact
    Fact(FactId),
    /// A stored rule
    Rule(RuleId),
}

impl From<FactId> for Node {
    fn from(id: FactId) -> Self {
        Self::Fact(id)
    }
}

impl From<RuleId> for Node {
    fn from(id: RuleId) -> Self {
        Self::Rule(id)
    }
}

/// One derivation: the fact that matched the first premise of the rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Support {
    /// The triggering fact
    pub fact: FactId,
    /// The rule whose first premise the fact matched
    pub rule: RuleId,
}

impl Support {
    /// Returns true if `node` is either side of the pair
    #[must_use]
    pub fn mentions(&self, node: Node) -> bool {
        match node {
            Node::Fact(id) => self.fact == id,
            Node::Rule(id) => self.rule == id,
        }
    }

    /// The other side of the pair, seen from `node`
    fn partner(&self, node: Node) -> Node {
        match node {
            Node::Fact(_) => Node::Rule(self.rule),
            Node::Rule(_) => Node::Fact(self.fact),
        }
    }
}

/// What supports an entity and what it supports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Justification {
    pub(crate) asserted: bool,
    pub(crate) supported_by: SmallVec<[Support; 2]>,
    pub(crate) supports_facts: IndexSet<FactId>,
    pub(crate) supports_rules: IndexSet<RuleId>,
}

impl Justification {
    /// An explicit assertion when `support` is `None`, otherwise a derivation
    pub(crate) fn new(support: Option<Support>) -> Self {
        Self {
            asserted: support.is_none(),
            supported_by: support.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Record another justification for an entity that already exists
    pub(crate) fn merge(&mut self, support: Option<Support>) {
        match support {
            Some(support) => self.supported_by.push(support),
            None => self.asserted = true,
        }
    }

    /// Record `dependent` as derived with the help of this entity
    pub(crate) fn link(&mut self, dependent: Node) {
        match dependent {
            Node::Fact(id) => self.supports_facts.insert(id),
            Node::Rule(id) => self.supports_rules.insert(id),
        };
    }

    pub(crate) fn unlink(&mut self, dependent: Node) {
        match dependent {
            Node::Fact(id) => self.supports_facts.shift_remove(&id),
            Node::Rule(id) => self.supports_rules.shift_remove(&id),
        };
    }

    /// Drop every support pair that mentions `ancestor`.
    ///
    /// Returns the partners of the dropped pairs that no remaining pair
    /// mentions; those no longer support this entity.
    pub(crate) fn withdraw(&mut self, ancestor: Node) -> SmallVec<[Node; 2]> {
        let mut dropped: SmallVec<[Node; 2]> = SmallVec::new();
        self.supported_by.retain(|support| {
            if support.mentions(ancestor) {
                dropped.push(support.partner(ancestor));
                false
            } else {
                true
            }
        });

        dropped.sort_unstable_by_key(|node| match node {
            Node::Fact(id) => (0, id.0),
            Node::Rule(id) => (1, id.0),
        });
        dropped.dedup();
        dropped.retain(|partner| !self.supported_by.iter().any(|s| s.mentions(*partner)));
        dropped
    }

    /// Dependents in the order they were linked, facts first
    pub(crate) fn dependents(&self) -> impl Iterator<Item = Node> + '_ {
        self.supports_facts
            .iter()
            .copied()
            .map(Node::Fact)
            .chain(self.supports_rules.iter().copied().map(Node::Rule))
    }

    /// True if a caller explicitly asserted the entity
    #[must_use]
    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    /// One pair per independent derivation; empty if never derived
    #[must_use]
    pub fn supported_by(&self) -> &[Support] {
        &self.supported_by
    }

    /// Facts derived with the help of this entity
    #[must_use]
    pub fn supports_facts(&self) -> &IndexSet<FactId> {
        &self.supports_facts
    }

    /// Rules derived with the help of this entity
    #[must_use]
    pub fn supports_rules(&self) -> &IndexSet<RuleId> {
        &self.supports_rules
    }

    /// True while some derivation still holds
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !self.supported_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F1: FactId = FactId(1);
    const F2: FactId = FactId(2);
    const R1: RuleId = RuleId(10);
    const R2: RuleId = RuleId(20);

    #[test]
    fn test_new_distinguishes_assertion_from_derivation() {
        let asserted = Justification::new(None);
        assert!(asserted.is_asserted());
        assert!(!asserted.is_supported());

        let derived = Justification::new(Some(Support { fact: F1, rule: R1 }));
        assert!(!derived.is_asserted());
        assert_eq!(derived.supported_by(), &[Support { fact: F1, rule: R1 }]);
    }

    #[test]
    fn test_merge_accumulates_support_and_assertion() {
        let mut justification = Justification::new(Some(Support { fact: F1, rule: R1 }));
        justification.merge(Some(Support { fact: F2, rule: R1 }));
        assert_eq!(justification.supported_by().len(), 2);
        assert!(!justification.is_asserted());

        justification.merge(None);
        assert!(justification.is_asserted());
        assert_eq!(justification.supported_by().len(), 2);
    }

    #[test]
    fn test_withdraw_reports_only_orphaned_partners() {
        let mut justification = Justification::new(Some(Support { fact: F1, rule: R1 }));
        justification.merge(Some(Support { fact: F2, rule: R1 }));
        justification.merge(Some(Support { fact: F1, rule: R2 }));

        // R1 still supports through (F2, R1); R2 loses its only pair
        let orphaned = justification.withdraw(Node::Fact(F1));
        assert_eq!(orphaned.as_slice(), &[Node::Rule(R2)]);
        assert_eq!(justification.supported_by(), &[Support { fact: F2, rule: R1 }]);

        let orphaned = justification.withdraw(Node::Rule(R1));
        assert_eq!(orphaned.as_slice(), &[Node::Fact(F2)]);
        assert!(!justification.is_supported());
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut justification = Justification::default();
        justification.link(Node::Fact(F2));
        justification.link(Node::Fact(F2));
        justification.link(Node::Rule(R2));
        assert_eq!(justification.supports_facts().len(), 1);
        assert_eq!(
            justification.dependents().collect::<Vec<_>>(),
            vec![Node::Fact(F2), Node::Rule(R2)]
        );

        justification.unlink(Node::Fact(F2));
        assert!(justification.supports_facts().is_empty());
    }
}
