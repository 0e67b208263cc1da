//! Deletion requests from views that hold no surface reference
//!
//! A list view publishes the id of the highlight it wants removed; the
//! session owning the surface is the single consumer. The list view and the
//! surface stay independently replaceable.

use std::collections::HashSet;

use tokio::sync::mpsc;

use crate::surface::Annotation;

/// Create a connected publisher/listener pair
pub fn deletion_channel() -> (DeletionPublisher, DeletionListener) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DeletionPublisher { tx }, DeletionListener { rx })
}

/// Sending side, cloned into every view that offers deletion
#[derive(Clone, Debug)]
pub struct DeletionPublisher {
    tx: mpsc::UnboundedSender<String>,
}

impl DeletionPublisher {
    /// Request deletion of a highlight by id.
    ///
    /// Returns `false` when no session is listening anymore.
    pub fn publish(&self, highlight_id: impl Into<String>) -> bool {
        let highlight_id = highlight_id.into();
        match self.tx.send(highlight_id) {
            Ok(()) => true,
            Err(mpsc::error::SendError(id)) => {
                tracing::debug!(highlight_id = %id, "Deletion request dropped, no listener");
                false
            }
        }
    }
}

/// Receiving side, owned by the session
#[derive(Debug)]
pub struct DeletionListener {
    rx: mpsc::UnboundedReceiver<String>,
}

impl DeletionListener {
    /// Next requested id, or `None` once every publisher is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Surface annotations the engine is removing itself.
///
/// The surface reports every removal, including the engine's own; those
/// echoes must not be treated as user deletions.
#[derive(Debug, Default)]
pub(crate) struct ExpectedRemovals {
    annotation_ids: HashSet<String>,
}

impl ExpectedRemovals {
    pub(crate) fn expect(&mut self, annotations: &[Annotation]) {
        self.annotation_ids
            .extend(annotations.iter().map(|a| a.id.clone()));
    }

    pub(crate) fn forget(&mut self, annotations: &[Annotation]) {
        for annotation in annotations {
            self.annotation_ids.remove(&annotation.id);
        }
    }

    /// Consume the expectation for `annotation_id`, if one was registered
    pub(crate) fn take(&mut self, annotation_id: &str) -> bool {
        self.annotation_ids.remove(annotation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let (publisher, mut listener) = deletion_channel();
        let list_view = publisher.clone();

        assert!(list_view.publish("hl-1"));
        assert!(publisher.publish("hl-2".to_string()));

        assert_eq!(listener.recv().await.as_deref(), Some("hl-1"));
        assert_eq!(listener.recv().await.as_deref(), Some("hl-2"));

        drop(publisher);
        drop(list_view);
        assert_eq!(listener.recv().await, None);
    }

    #[test]
    fn test_publish_without_listener() {
        let (publisher, listener) = deletion_channel();
        drop(listener);
        assert!(!publisher.publish("hl-1"));
    }

    #[test]
    fn test_expected_removals_are_consumed_once() {
        let annotation = Annotation::highlight(0, vec![Rect::new(0.0, 0.0, 1.0, 1.0)]);
        let mut removals = ExpectedRemovals::default();
        removals.expect(std::slice::from_ref(&annotation));

        assert!(removals.take(&annotation.id));
        assert!(!removals.take(&annotation.id));

        removals.expect(std::slice::from_ref(&annotation));
        removals.forget(std::slice::from_ref(&annotation));
        assert!(!removals.take(&annotation.id));
    }
}
