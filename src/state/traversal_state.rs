/// Traversal state definitions for one crawl attempt
///
/// The engine moves through these states page by page:
///
/// ```text
/// AwaitingTable -> Extracting -> HasNextPage -> Extracting -> ... -> NoNextPage -> Done
/// ```
use std::fmt;

/// Represents the current position of the traversal engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    /// Waiting for the table to render after opening the listing
    AwaitingTable,

    /// Reading the rows of the current page
    Extracting,

    /// The next-page control is enabled; navigation will follow
    HasNextPage,

    /// The next-page control is absent or disabled
    NoNextPage,

    /// The attempt finished normally
    Done,
}

impl TraversalState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if `next` is a legal successor of this state
    ///
    /// `HasNextPage -> Done` is the page cap being reached.
    pub fn can_transition_to(&self, next: TraversalState) -> bool {
        use TraversalState::*;
        matches!(
            (self, next),
            (AwaitingTable, Extracting)
                | (Extracting, HasNextPage)
                | (Extracting, NoNextPage)
                | (HasNextPage, Extracting)
                | (HasNextPage, Done)
                | (NoNextPage, Done)
        )
    }

    /// Returns a short lowercase label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingTable => "awaiting_table",
            Self::Extracting => "extracting",
            Self::HasNextPage => "has_next_page",
            Self::NoNextPage => "no_next_page",
            Self::Done => "done",
        }
    }

    /// Returns all possible traversal states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::AwaitingTable,
            Self::Extracting,
            Self::HasNextPage,
            Self::NoNextPage,
            Self::Done,
        ]
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
