use std::sync::Arc;

use crate::models::{ContentEvent, PostSnapshot};

/// Hook called after a content mutation has been committed.
///
/// Implementations must return quickly and must not fail the caller: the
/// mutation is already durable when `notify` runs.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, event: ContentEvent, snapshot: &PostSnapshot);
}

impl<N: ChangeNotifier + ?Sized> ChangeNotifier for Arc<N> {
    fn notify(&self, event: ContentEvent, snapshot: &PostSnapshot) {
        (**self).notify(event, snapshot);
    }
}

