use std::collections::{HashMap, HashSet};

use crate::common::types::TransactionId;

/// Directed graph from each blocked transaction to the transactions it waits on
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the outgoing edges of `waiter`
    pub fn set_waits<I>(&mut self, waiter: TransactionId, holders: I)
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let targets: HashSet<TransactionId> = holders
            .into_iter()
            .filter(|&holder| holder != waiter)
            .collect();

        if targets.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, targets);
        }
    }

    /// Drop every outgoing edge of `waiter`
    pub fn remove_waiter(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    pub fn remove_edge(&mut self, waiter: TransactionId, holder: TransactionId) {
        if let Some(targets) = self.edges.get_mut(&waiter) {
            targets.remove(&holder);
            if targets.is_empty() {
                self.edges.remove(&waiter);
            }
        }
    }

    pub fn waits_for(&self, waiter: TransactionId) -> Vec<TransactionId> {
        let mut targets: Vec<TransactionId> = self
            .edges
            .get(&waiter)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default();
        targets.sort();
        targets
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Depth-first search rooted at every node, tracking the recursion stack
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();

        self.edges
            .keys()
            .any(|&node| self.visit(node, &mut visited, &mut on_stack))
    }

    fn visit(
        &self,
        node: TransactionId,
        visited: &mut HashSet<TransactionId>,
        on_stack: &mut HashSet<TransactionId>,
    ) -> bool {
        if on_stack.contains(&node) {
            return true;
        }
        if !visited.insert(node) {
            return false;
        }

        on_stack.insert(node);
        if let Some(targets) = self.edges.get(&node) {
            for &next in targets {
                if self.visit(next, visited, on_stack) {
                    return true;
                }
            }
        }
        on_stack.remove(&node);

        false
    }
}
