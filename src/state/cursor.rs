use crate::state::TraversalState;
use crate::url::locator_key;
use crate::TenderError;
use std::collections::HashSet;
use url::Url;

/// Pagination cursor of a single traversal
///
/// The start URL counts as visited, so a pager that eventually links back to
/// the first page is recognised as a cycle without refetching it.
#[derive(Debug, Clone)]
pub struct PageCursor {
    current: Url,
    visited: HashSet<String>,
    pages_fetched: u32,
    state: TraversalState,
}

impl PageCursor {
    /// Creates a cursor positioned at the start URL
    pub fn new(start: Url) -> Self {
        let mut visited = HashSet::new();
        visited.insert(locator_key(&start));
        Self {
            current: start,
            visited,
            pages_fetched: 0,
            state: TraversalState::Idle,
        }
    }

    /// The page about to be (or last) fetched
    pub fn current(&self) -> &Url {
        &self.current
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Number of distinct locators seen so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Moves the state machine, rejecting transitions it does not allow
    pub fn transition(&mut self, next: TraversalState) -> Result<(), TenderError> {
        if !self.state.can_transition_to(next) {
            return Err(TenderError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if next == TraversalState::Extracting {
            self.pages_fetched += 1;
        }
        self.state = next;
        Ok(())
    }

    /// Returns true if `url` has already been visited in this traversal
    pub fn has_visited(&self, url: &Url) -> bool {
        self.visited.contains(&locator_key(url))
    }

    /// Records a locator as visited without moving the cursor
    ///
    /// Used for the final URL of a redirected fetch.
    pub fn mark_visited(&mut self, url: &Url) {
        self.visited.insert(locator_key(url));
    }

    /// Records `next` as visited and makes it the current page
    ///
    /// Returns false (and leaves the cursor unchanged) if it was already visited.
    pub fn advance(&mut self, next: Url) -> bool {
        if !self.visited.insert(locator_key(&next)) {
            return false;
        }
        self.current = next;
        true
    }
}
