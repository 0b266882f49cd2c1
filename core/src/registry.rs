//! Per-document store of active problems.

use std::collections::HashMap;
use std::hash::Hash;

use crate::problem::{Problem, ProblemId};

/// Owns the active problem set of every open document.
///
/// Documents without problems have no entry at all, so an emptied set is
/// indistinguishable from a document that was never checked.
#[derive(Debug)]
pub struct ProblemRegistry<D> {
    documents: HashMap<D, Vec<Problem>>,
}

impl<D> Default for ProblemRegistry<D> {
    fn default() -> Self {
        Self {
            documents: HashMap::new(),
        }
    }
}

impl<D: Eq + Hash + Clone> ProblemRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the document's set wholesale.
    pub fn replace_all(&mut self, document: &D, problems: Vec<Problem>) {
        if problems.is_empty() {
            self.documents.remove(document);
        } else {
            self.documents.insert(document.clone(), problems);
        }
    }

    pub fn get(&self, document: &D) -> &[Problem] {
        self.documents
            .get(document)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, document: &D, id: ProblemId) -> Option<&Problem> {
        self.get(document).iter().find(|p| p.id == id)
    }

    /// Mutable access for in-place offset updates. Absent documents yield
    /// an empty slice.
    pub fn get_mut(&mut self, document: &D) -> &mut [Problem] {
        match self.documents.get_mut(document) {
            Some(problems) => problems.as_mut_slice(),
            None => &mut [],
        }
    }

    pub fn remove(&mut self, document: &D, id: ProblemId) -> Option<Problem> {
        let problems = self.documents.get_mut(document)?;
        let index = problems.iter().position(|p| p.id == id)?;
        let removed = problems.remove(index);
        if problems.is_empty() {
            self.documents.remove(document);
        }
        Some(removed)
    }

    /// Removes the document's entry, returning what was stored.
    pub fn evict(&mut self, document: &D) -> Vec<Problem> {
        self.documents.remove(document).unwrap_or_default()
    }

    pub fn contains(&self, document: &D) -> bool {
        self.documents.contains_key(document)
    }
}
