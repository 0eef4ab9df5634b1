use std::sync::{Arc, PoisonError, RwLock};

use objspace_common::{PlayerId, Position, WorldObject};
use objspace_kernel::Viewer;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A change to one client's view, queued for the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "object", rename_all = "snake_case")]
pub enum ObjectUpdate {
    Show(WorldObject),
    Hide(WorldObject),
}

impl ObjectUpdate {
    pub fn object(&self) -> &WorldObject {
        match self {
            Self::Show(o) | Self::Hide(o) => o,
        }
    }
}

/// Receiving end of a session's outbound queue.
pub type UpdateReceiver = UnboundedReceiver<ObjectUpdate>;

/// Pull everything queued so far, without an async runtime.
pub fn drain(rx: &mut UpdateReceiver) -> Vec<ObjectUpdate> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// One connected player: current position plus an outbound update queue.
#[derive(Debug)]
pub struct Session {
    id: PlayerId,
    position: RwLock<Position>,
    outbound: UnboundedSender<ObjectUpdate>,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue.
    pub fn new(position: Position) -> (Arc<Self>, UpdateReceiver) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id: PlayerId::new(),
            position: RwLock::new(position),
            outbound,
        });
        (session, rx)
    }

    pub fn move_to(&self, position: Position) {
        *self.position.write().unwrap_or_else(PoisonError::into_inner) = position;
    }

    /// Whether the client side has gone away.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    fn push(&self, update: ObjectUpdate) {
        if self.outbound.send(update).is_err() {
            tracing::trace!(player = %self.id, ?update, "dropped update for closed session");
        }
    }
}

impl Viewer for Session {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn position(&self) -> Position {
        *self.position.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_object(&self, object: &WorldObject) {
        self.push(ObjectUpdate::Show(*object));
    }

    fn hide_object(&self, object: &WorldObject) {
        self.push(ObjectUpdate::Hide(*object));
    }
}
