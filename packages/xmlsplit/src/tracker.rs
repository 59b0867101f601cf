//! Boundary tracking for the target element.
//!
//! Consumes tag events in document order and turns each complete target
//! element into a [`MatchSpan`]. A match starts at the end of the tag that
//! precedes the target's start tag, so indentation and text between the two
//! are part of the extracted fragment.

use crate::types::{MatchSpan, PendingMatch, Position, TagEvent, TagKind};

/// Tracks tag boundaries for a single file.
///
/// Only one match can be pending at a time, so callers must pick a target
/// that never nests inside itself. If it does, the innermost start tag wins
/// and the first matching end tag closes it; the outer end tag then has
/// nothing to close and emits no span, so the outer element is not
/// extracted.
#[derive(Debug)]
pub struct BoundaryTracker {
    target: Option<String>,
    prev_end: Position,
    pending: Option<PendingMatch>,
}

impl BoundaryTracker {
    /// Create a tracker for `target`, or for the document's root element
    /// when no target is given.
    #[must_use]
    pub fn new(target: Option<String>) -> Self {
        Self {
            target,
            prev_end: Position::START,
            pending: None,
        }
    }

    /// The target tag, once known.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Give back the target so it can be reused for the next file.
    #[must_use]
    pub fn into_target(self) -> Option<String> {
        self.target
    }

    /// The target element currently open, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingMatch> {
        self.pending.as_ref()
    }

    /// Feed one tag event; returns a span when it completes a match.
    pub fn on_event(&mut self, event: &TagEvent) -> Option<MatchSpan> {
        match event.kind {
            TagKind::Start => {
                let target = self.target.get_or_insert_with(|| {
                    tracing::info!(tag = %event.name, "read tag was not set, defaulting to root tag");
                    event.name.clone()
                });
                if *target == event.name {
                    self.pending = Some(PendingMatch {
                        start: self.prev_end,
                        target: target.clone(),
                    });
                }
                self.prev_end = event.end;
                None
            }
            TagKind::End => {
                self.prev_end = event.end;
                if self.target.as_deref() != Some(event.name.as_str()) {
                    return None;
                }
                self.pending.take().map(|pending| MatchSpan {
                    start: pending.start,
                    end: event.end,
                })
            }
        }
    }
}
