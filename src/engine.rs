use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexMap;
use log::{debug, trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::justification::{FactId, Justification, Node, RuleId, Support};
use crate::term::Statement;
use crate::unify::{instantiate, unify, Bindings};

/// A conditional rule (e.g. `((on ?x ?y) (on ?y ?z)) -> (stacked ?x ?z)`)
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Implication {
    /// The premises, all of which must hold. The first one is matched
    /// against facts during a single inference step.
    pub lhs: Vec<Statement>,
    /// The consequent
    pub rhs: Statement,
}

impl Implication {
    /// Create a rule from its premises and consequent
    pub fn new(lhs: impl IntoIterator<Item = Statement>, rhs: Statement) -> Self {
        Self {
            lhs: lhs.into_iter().collect(),
            rhs,
        }
    }

    /// A consequent variable that no premise binds, if any. Such a rule would
    /// derive facts that still contain variables.
    fn unbound_variable(&self) -> Option<&str> {
        self.rhs.variables().find(|variable| {
            !self
                .lhs
                .iter()
                .any(|premise| premise.variables().any(|v| v == *variable))
        })
    }
}

impl fmt::Display for Implication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, premise) in self.lhs.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{premise}")?;
        }
        write!(f, ") -> {}", self.rhs)
    }
}

/// A fact or a rule, as handed to [`KnowledgeBase::assert`],
/// [`KnowledgeBase::retract`] and [`KnowledgeBase::ask`]
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Knowledge {
    /// A ground statement
    Fact(Statement),
    /// A conditional rule
    Rule(Implication),
}

impl Knowledge {
    /// Checks the shape of something about to be asserted
    fn validate(&self) -> Result<()> {
        match self {
            Self::Fact(statement) if !statement.is_ground() => {
                Err(Error::NonGroundFact(statement.clone()))
            }
            Self::Rule(implication) if implication.lhs.is_empty() => {
                Err(Error::EmptyPremises(implication.rhs.clone()))
            }
            Self::Rule(implication) => match implication.unbound_variable() {
                Some(variable) => Err(Error::UnboundVariable {
                    variable: variable.to_string(),
                    rule: implication.clone(),
                }),
                None => Ok(()),
            },
            Self::Fact(_) => Ok(()),
        }
    }
}

impl From<Statement> for Knowledge {
    fn from(statement: Statement) -> Self {
        Self::Fact(statement)
    }
}

impl From<Implication> for Knowledge {
    fn from(implication: Implication) -> Self {
        Self::Rule(implication)
    }
}

impl fmt::Display for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(statement) => write!(f, "fact: {statement}"),
            Self::Rule(implication) => write!(f, "rule: {implication}"),
        }
    }
}

/// A fact stored in the knowledge base
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fact {
    id: FactId,
    statement: Statement,
    justification: Justification,
}

impl Fact {
    /// Handle of this fact
    #[must_use]
    pub fn id(&self) -> FactId {
        self.id
    }

    /// The ground statement
    #[must_use]
    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// What supports this fact and what it supports
    #[must_use]
    pub fn justification(&self) -> &Justification {
        &self.justification
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact: {}", self.statement)?;
        write_justification(f, &self.justification)
    }
}

/// A rule stored in the knowledge base
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    id: RuleId,
    implication: Implication,
    justification: Justification,
}

impl Rule {
    /// Handle of this rule
    #[must_use]
    pub fn id(&self) -> RuleId {
        self.id
    }

    /// The premises and consequent
    #[must_use]
    pub fn implication(&self) -> &Implication {
        &self.implication
    }

    /// The premises
    #[must_use]
    pub fn lhs(&self) -> &[Statement] {
        &self.implication.lhs
    }

    /// The consequent
    #[must_use]
    pub fn rhs(&self) -> &Statement {
        &self.implication.rhs
    }

    /// What supports this rule and what it supports
    #[must_use]
    pub fn justification(&self) -> &Justification {
        &self.justification
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule: {}", self.implication)?;
        write_justification(f, &self.justification)
    }
}

fn write_justification(f: &mut fmt::Formatter<'_>, justification: &Justification) -> fmt::Result {
    if justification.is_asserted() {
        f.write_str(" ASSERTED")?;
    }
    if justification.is_supported() {
        f.write_str(" SUPPORTED BY")?;
        for support in justification.supported_by() {
            write!(f, " [{}, {}]", support.fact, support.rule)?;
        }
    }
    Ok(())
}

/// One match of a query against a stored fact
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Answer {
    /// Bindings that make the query equal to the matched fact
    pub bindings: Bindings,
    /// The matched facts, with their handles and justifications
    pub facts: Vec<Fact>,
}

/// Pairs waiting for a resolution step
type Agenda = VecDeque<(FactId, RuleId)>;

/// A forward-chaining knowledge base with truth maintenance.
///
/// Asserting a fact or rule runs inference to fixpoint. Every derived fact or
/// rule remembers the `(fact, rule)` pairs that produced it, so retracting a
/// premise also removes whatever was derived solely from it.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    facts: IndexMap<FactId, Fact>,
    rules: IndexMap<RuleId, Rule>,
    /// Structural lookup, so re-adding an existing statement merges support
    fact_ids: IndexMap<Statement, FactId>,
    rule_ids: IndexMap<Implication, RuleId>,
    next_id: u64,
}

impl KnowledgeBase {
    /// Create an empty knowledge base
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a fact or rule and derive everything that follows from it.
    ///
    /// Asserting something already present marks it as asserted, even if it
    /// was only derived so far.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonGroundFact`] for a fact containing variables and
    /// [`Error::EmptyPremises`] for a rule without premises. The knowledge
    /// base is left unchanged in both cases.
    pub fn assert(&mut self, item: impl Into<Knowledge>) -> Result<()> {
        let item = item.into();
        item.validate()?;
        debug!("Asserting {item}");

        let mut agenda = Agenda::new();
        self.add(item, None, &mut agenda);
        self.run(&mut agenda);
        Ok(())
    }

    /// Retract a fact or rule.
    ///
    /// Does nothing if no equal fact or rule is present. A fact that is still
    /// supported by a derivation stays, as does an asserted or supported rule.
    /// Otherwise the entity is removed along with everything derived solely
    /// from it.
    pub fn retract(&mut self, item: impl Into<Knowledge>) {
        let item = item.into();
        debug!("Retracting {item}");

        match item {
            Knowledge::Fact(statement) => {
                if let Some(&id) = self.fact_ids.get(&statement) {
                    self.remove_fact(id);
                }
            }
            Knowledge::Rule(implication) => {
                if let Some(&id) = self.rule_ids.get(&implication) {
                    self.remove_rule(id);
                }
            }
        }
    }

    /// Match a query statement against every stored fact.
    ///
    /// An invalid query (a rule) is reported through the log and yields no
    /// answers.
    pub fn ask(&self, query: impl Into<Knowledge>) -> Vec<Answer> {
        let query = query.into();
        debug!("Asking {query}");

        self.try_ask(&query).unwrap_or_else(|err| {
            warn!("{err}");
            Vec::new()
        })
    }

    /// Like [`ask`](Self::ask), but reports an invalid query as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if `query` is not a statement.
    pub fn try_ask(&self, query: &Knowledge) -> Result<Vec<Answer>> {
        let Knowledge::Fact(statement) = query else {
            return Err(Error::InvalidQuery(query.to_string()));
        };

        Ok(self
            .facts
            .values()
            .filter_map(|fact| {
                unify(statement, &fact.statement).map(|bindings| Answer {
                    bindings,
                    facts: vec![fact.clone()],
                })
            })
            .collect())
    }

    /// The stored fact equal to `statement`
    #[must_use]
    pub fn fact(&self, statement: &Statement) -> Option<&Fact> {
        self.fact_ids
            .get(statement)
            .and_then(|id| self.facts.get(id))
    }

    /// The stored rule equal to `implication`
    #[must_use]
    pub fn rule(&self, implication: &Implication) -> Option<&Rule> {
        self.rule_ids
            .get(implication)
            .and_then(|id| self.rules.get(id))
    }

    /// Look up a fact by handle; `None` once it has been retracted
    #[must_use]
    pub fn fact_by_id(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(&id)
    }

    /// Look up a rule by handle; `None` once it has been retracted
    #[must_use]
    pub fn rule_by_id(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(&id)
    }

    /// Returns true if an equal fact or rule is stored
    #[must_use]
    pub fn contains(&self, item: &Knowledge) -> bool {
        match item {
            Knowledge::Fact(statement) => self.fact_ids.contains_key(statement),
            Knowledge::Rule(implication) => self.rule_ids.contains_key(implication),
        }
    }

    /// Facts in insertion order
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }

    /// Rules in insertion order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Total number of stored facts and rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len() + self.rules.len()
    }

    /// Returns true if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.rules.is_empty()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn justification_mut(&mut self, node: Node) -> Option<&mut Justification> {
        match node {
            Node::Fact(id) => self.facts.get_mut(&id).map(|fact| &mut fact.justification),
            Node::Rule(id) => self.rules.get_mut(&id).map(|rule| &mut rule.justification),
        }
    }

    /// Store `item` or merge `support` into the equal entity already stored.
    /// New entities schedule a resolution step against every current
    /// counterpart.
    fn add(&mut self, item: Knowledge, support: Option<Support>, agenda: &mut Agenda) -> Node {
        match item {
            Knowledge::Fact(statement) => Node::Fact(self.add_fact(statement, support, agenda)),
            Knowledge::Rule(implication) => Node::Rule(self.add_rule(implication, support, agenda)),
        }
    }

    fn add_fact(
        &mut self,
        statement: Statement,
        support: Option<Support>,
        agenda: &mut Agenda,
    ) -> FactId {
        if let Some(&id) = self.fact_ids.get(&statement) {
            trace!("Merging support into {statement}");
            if let Some(fact) = self.facts.get_mut(&id) {
                fact.justification.merge(support);
            }
            return id;
        }

        trace!("Adding fact {statement}");
        let id = FactId(self.next_id());
        self.fact_ids.insert(statement.clone(), id);
        self.facts.insert(
            id,
            Fact {
                id,
                statement,
                justification: Justification::new(support),
            },
        );
        agenda.extend(self.rules.keys().map(|&rule| (id, rule)));
        id
    }

    fn add_rule(
        &mut self,
        implication: Implication,
        support: Option<Support>,
        agenda: &mut Agenda,
    ) -> RuleId {
        if let Some(&id) = self.rule_ids.get(&implication) {
            trace!("Merging support into {implication}");
            if let Some(rule) = self.rules.get_mut(&id) {
                rule.justification.merge(support);
            }
            return id;
        }

        trace!("Adding rule {implication}");
        let id = RuleId(self.next_id());
        self.rule_ids.insert(implication.clone(), id);
        self.rules.insert(
            id,
            Rule {
                id,
                implication,
                justification: Justification::new(support),
            },
        );
        agenda.extend(self.facts.keys().map(|&fact| (fact, id)));
        id
    }

    /// Run scheduled resolution steps until no new fact or rule appears
    fn run(&mut self, agenda: &mut Agenda) {
        while let Some((fact, rule)) = agenda.pop_front() {
            self.infer(fact, rule, agenda);
        }
    }

    /// A single resolution step: match `fact` against the first premise of
    /// `rule` and, on success, add the derived fact or the residual rule.
    fn infer(&mut self, fact_id: FactId, rule_id: RuleId, agenda: &mut Agenda) {
        let (Some(fact), Some(rule)) = (self.facts.get(&fact_id), self.rules.get(&rule_id)) else {
            return;
        };
        trace!(
            "Attempting to infer from {} and {}",
            fact.statement,
            rule.implication
        );

        let Some((first, rest)) = rule.implication.lhs.split_first() else {
            return;
        };
        let Some(bindings) = unify(&fact.statement, first) else {
            return;
        };

        let rhs = instantiate(&rule.implication.rhs, &bindings);
        let derived = if rest.is_empty() {
            Knowledge::Fact(rhs)
        } else {
            Knowledge::Rule(Implication {
                lhs: rest
                    .iter()
                    .map(|premise| instantiate(premise, &bindings))
                    .collect(),
                rhs,
            })
        };
        debug!(
            "Inferred {derived} from {} and {}",
            fact.statement, rule.implication
        );

        let support = Support {
            fact: fact_id,
            rule: rule_id,
        };
        let node = self.add(derived, Some(support), agenda);
        for ancestor in [Node::Fact(fact_id), Node::Rule(rule_id)] {
            if let Some(justification) = self.justification_mut(ancestor) {
                justification.link(node);
            }
        }
    }

    fn remove(&mut self, node: Node) {
        match node {
            Node::Fact(id) => self.remove_fact(id),
            Node::Rule(id) => self.remove_rule(id),
        }
    }

    fn remove_fact(&mut self, id: FactId) {
        match self.facts.get(&id) {
            Some(fact) if fact.justification.is_supported() => {
                trace!("Keeping {}: still supported", fact.statement);
                return;
            }
            Some(_) => {}
            None => return,
        }

        // Detached before visiting dependents, so cycles terminate
        let Some(fact) = self.facts.shift_remove(&id) else {
            return;
        };
        self.fact_ids.swap_remove(&fact.statement);
        debug!("Removed {}", fact.statement);

        self.release_dependents(Node::Fact(id), &fact.justification);
    }

    fn remove_rule(&mut self, id: RuleId) {
        match self.rules.get(&id) {
            Some(rule) if rule.justification.is_supported() || rule.justification.is_asserted() => {
                trace!("Keeping {}: asserted or supported", rule.implication);
                return;
            }
            Some(_) => {}
            None => return,
        }

        let Some(rule) = self.rules.shift_remove(&id) else {
            return;
        };
        self.rule_ids.swap_remove(&rule.implication);
        debug!("Removed {}", rule.implication);

        self.release_dependents(Node::Rule(id), &rule.justification);
    }

    fn release_dependents(&mut self, ancestor: Node, justification: &Justification) {
        for dependent in justification.dependents() {
            self.remove_support(dependent, ancestor);
        }
    }

    /// Drop the pairs of `dependent` that mention `ancestor`, then try to
    /// retract `dependent` unless it was asserted.
    fn remove_support(&mut self, dependent: Node, ancestor: Node) {
        let Some(justification) = self.justification_mut(dependent) else {
            return;
        };
        let orphaned = justification.withdraw(ancestor);
        let asserted = justification.is_asserted();

        for partner in orphaned {
            if let Some(justification) = self.justification_mut(partner) {
                justification.unlink(dependent);
            }
        }

        if !asserted {
            self.remove(dependent);
        }
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Knowledge Base:")?;
        for fact in self.facts.values() {
            writeln!(f, "{fact}")?;
        }
        for rule in self.rules.values() {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}
