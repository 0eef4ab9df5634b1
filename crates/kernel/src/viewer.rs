//! Collaborator contracts the registry fans out through.

use objspace_common::{PlayerId, Position, WorldObject};

/// A connected player as seen by the registry: where they stand, and a
/// notifier for their client.
///
/// `show_object` and `hide_object` must only enqueue; they are called with
/// the registry lock held. Both must be harmless for objects the client has
/// never seen or already hid.
pub trait Viewer: Send + Sync {
    fn id(&self) -> PlayerId;

    fn position(&self) -> Position;

    fn show_object(&self, object: &WorldObject);

    fn hide_object(&self, object: &WorldObject);
}

/// Enumerates currently connected players.
///
/// Implementations skip freed or disconnecting slots themselves; the
/// registry treats every visited viewer as live.
pub trait PlayerDirectory: Send + Sync {
    fn for_each_connected(&self, visit: &mut dyn FnMut(&dyn Viewer));
}
