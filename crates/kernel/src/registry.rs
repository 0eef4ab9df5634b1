use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use objspace_common::{ObjectError, Position, WorldObject};

use crate::config::RegistryConfig;
use crate::viewer::{PlayerDirectory, Viewer};

/// Errors from registry operations. Only malformed raw input produces one;
/// absence is never an error, and any floor level is accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// The authoritative set of placed world objects.
///
/// Keyed by position, so the one-object-per-tile rule holds structurally.
/// A `BTreeMap` keeps scan and fan-out order deterministic. Every operation
/// takes the lock once and performs its mutation and its notifications under
/// it; notifiers only enqueue, so the critical section stays short.
pub struct ObjectRegistry {
    objects: Mutex<BTreeMap<Position, WorldObject>>,
    directory: Arc<dyn PlayerDirectory>,
    config: RegistryConfig,
}

impl ObjectRegistry {
    pub fn new(directory: Arc<dyn PlayerDirectory>, config: RegistryConfig) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            directory,
            config,
        }
    }

    /// Registry using [`RegistryConfig::default`].
    pub fn with_directory(directory: Arc<dyn PlayerDirectory>) -> Self {
        Self::new(directory, RegistryConfig::default())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Place `object`, evicting whatever occupied its position.
    ///
    /// The evicted object is returned but nobody is told to hide it; players
    /// in range get a `show` for the replacement, which overwrites the tile on
    /// their client. Players outside the new object's range who could still
    /// see the old one keep it until their next region reload. The show goes
    /// to every player within `broadcast_distance` on the plane, on any floor.
    pub fn register(&self, object: WorldObject) -> Result<Option<WorldObject>, RegistryError> {
        let mut objects = self.lock();
        let evicted = objects.insert(object.position, object);
        if let Some(old) = &evicted {
            tracing::debug!(
                position = %object.position,
                old_id = old.id,
                new_id = object.id,
                "evicted occupant without hide notification"
            );
        }

        let radius = self.config.broadcast_distance;
        let mut shown = 0usize;
        self.directory.for_each_connected(&mut |viewer| {
            if viewer.position().within_distance(&object.position, radius) {
                viewer.show_object(&object);
                shown += 1;
            }
        });

        tracing::debug!(id = object.id, position = %object.position, shown, "registered object");
        Ok(evicted)
    }

    /// Validate raw face/kind values, then [`register`](Self::register).
    pub fn register_raw(
        &self,
        id: u16,
        position: Position,
        face: u8,
        kind: u8,
    ) -> Result<Option<WorldObject>, RegistryError> {
        let object = WorldObject::from_raw(id, position, face, kind)?;
        self.register(object)
    }

    /// Remove `object` if an equal object is registered, and tell every
    /// connected player to hide it. Returns whether anything was removed.
    pub fn unregister(&self, object: &WorldObject) -> Result<bool, RegistryError> {
        let mut objects = self.lock();
        if objects.get(&object.position) != Some(object) {
            tracing::trace!(id = object.id, position = %object.position, "unregister: not present");
            return Ok(false);
        }
        objects.remove(&object.position);

        let hidden = self.hide_from_all(object);
        tracing::debug!(id = object.id, position = %object.position, hidden, "unregistered object");
        Ok(true)
    }

    /// Remove whatever occupies `position`, telling every connected player to
    /// hide it. Returns the removed object.
    pub fn remove_on_position(&self, position: Position) -> Option<WorldObject> {
        let mut objects = self.lock();
        let removed = objects.remove(&position)?;

        let hidden = self.hide_from_all(&removed);
        tracing::debug!(id = removed.id, %position, hidden, "removed object on position");
        Some(removed)
    }

    /// Tell `viewer` to hide every object on a floor other than its own.
    ///
    /// Distance plays no part. Nothing is removed from the registry, and
    /// repeated calls resend the same hides.
    pub fn remove_on_height(&self, viewer: &dyn Viewer) {
        let _span = tracing::info_span!("remove_on_height", player = %viewer.id()).entered();
        let objects = self.lock();
        let here = viewer.position();

        let mut hidden = 0usize;
        for object in objects.values() {
            if !object.position.same_floor(&here) {
                viewer.hide_object(object);
                hidden += 1;
            }
        }
        tracing::trace!(floor = here.z, hidden, "hid off-floor objects");
    }

    /// Show `viewer` every object within `broadcast_distance` on the plane,
    /// whatever its floor. Objects that fell out of range are left for the
    /// caller's region-transition logic.
    pub fn load_new_region(&self, viewer: &dyn Viewer) {
        let _span = tracing::info_span!("load_new_region", player = %viewer.id()).entered();
        let objects = self.lock();
        let here = viewer.position();
        let radius = self.config.broadcast_distance;

        let mut shown = 0usize;
        for object in objects.values() {
            if object.position.within_distance(&here, radius) {
                viewer.show_object(object);
                shown += 1;
            }
        }
        tracing::trace!(position = %here, shown, "loaded region objects");
    }

    /// Snapshot of every registered object, in position order.
    pub fn objects(&self) -> Vec<WorldObject> {
        self.lock().values().copied().collect()
    }

    /// The object at `position`, if any.
    pub fn get(&self, position: Position) -> Option<WorldObject> {
        self.lock().get(&position).copied()
    }

    pub fn contains(&self, object: &WorldObject) -> bool {
        self.lock().get(&object.position) == Some(object)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn hide_from_all(&self, object: &WorldObject) -> usize {
        let mut hidden = 0usize;
        self.directory.for_each_connected(&mut |viewer| {
            viewer.hide_object(object);
            hidden += 1;
        });
        hidden
    }

    // The map is consistent between statements, so a panic elsewhere while
    // holding the lock leaves nothing half-written.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<Position, WorldObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objspace_common::{Face, ObjectKind, PlayerId};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::RwLock;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Seen {
        Show(WorldObject),
        Hide(WorldObject),
    }

    struct TestViewer {
        id: PlayerId,
        position: RwLock<Position>,
        seen: Mutex<Vec<Seen>>,
    }

    impl TestViewer {
        fn at(x: i32, y: i32, z: i32) -> Arc<Self> {
            Arc::new(Self {
                id: PlayerId::new(),
                position: RwLock::new(Position::new(x, y, z)),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn move_to(&self, position: Position) {
            *self.position.write().unwrap() = position;
        }

        fn take(&self) -> Vec<Seen> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    impl Viewer for TestViewer {
        fn id(&self) -> PlayerId {
            self.id
        }

        fn position(&self) -> Position {
            *self.position.read().unwrap()
        }

        fn show_object(&self, object: &WorldObject) {
            self.seen.lock().unwrap().push(Seen::Show(*object));
        }

        fn hide_object(&self, object: &WorldObject) {
            self.seen.lock().unwrap().push(Seen::Hide(*object));
        }
    }

    /// Slot list where `None` stands for a freed slot.
    #[derive(Default)]
    struct TestDirectory {
        slots: RwLock<Vec<Option<Arc<TestViewer>>>>,
    }

    impl TestDirectory {
        fn with(viewers: &[&Arc<TestViewer>]) -> Arc<Self> {
            let dir = Self::default();
            for v in viewers {
                dir.slots.write().unwrap().push(Some(Arc::clone(v)));
            }
            Arc::new(dir)
        }

        fn push_empty(&self) {
            self.slots.write().unwrap().push(None);
        }
    }

    impl PlayerDirectory for TestDirectory {
        fn for_each_connected(&self, visit: &mut dyn FnMut(&dyn Viewer)) {
            for viewer in self.slots.read().unwrap().iter().flatten() {
                visit(viewer.as_ref());
            }
        }
    }

    fn obj(id: u16, x: i32, y: i32, z: i32) -> WorldObject {
        WorldObject::interactable(id, Position::new(x, y, z))
    }

    fn registry(dir: &Arc<TestDirectory>) -> ObjectRegistry {
        ObjectRegistry::with_directory(Arc::clone(dir) as Arc<dyn PlayerDirectory>)
    }

    #[test]
    fn registry_starts_empty() {
        let reg = registry(&TestDirectory::with(&[]));
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
        assert!(reg.objects().is_empty());
    }

    #[test]
    fn objects_snapshot_is_in_position_order() {
        let reg = registry(&TestDirectory::with(&[]));
        let (a, b, c, d) = (obj(1, 7, 0, 0), obj(2, -3, 9, 1), obj(3, -3, 9, -1), obj(4, 0, 0, 0));
        for o in [a, b, c, d] {
            reg.register(o).unwrap();
        }
        assert_eq!(reg.objects(), vec![c, b, d, a]);
    }

    #[test]
    fn same_position_keeps_only_latest() {
        let reg = registry(&TestDirectory::with(&[]));
        let a = obj(1, 10, 10, 0);
        let b = WorldObject::new(2, a.position, Face::East, ObjectKind::WallCorner);

        assert_eq!(reg.register(a).unwrap(), None);
        assert_eq!(reg.register(b).unwrap(), Some(a));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(a.position), Some(b));
        assert!(!reg.contains(&a));
        assert!(reg.contains(&b));
    }

    #[test]
    fn same_planar_tile_on_other_floor_is_a_different_position() {
        let reg = registry(&TestDirectory::with(&[]));
        reg.register(obj(1, 10, 10, 0)).unwrap();
        reg.register(obj(1, 10, 10, 1)).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let q = TestViewer::at(0, 0, 0);
        let reg = registry(&TestDirectory::with(&[&q]));
        reg.register(obj(1, 0, 0, 0)).unwrap();
        q.take();

        assert!(!reg.unregister(&obj(99, 5, 5, 0)).unwrap());
        // Same position, different identity.
        assert!(!reg.unregister(&obj(2, 0, 0, 0)).unwrap());
        assert_eq!(reg.len(), 1);
        assert!(q.take().is_empty());
    }

    #[test]
    fn unregister_hides_for_everyone() {
        let near = TestViewer::at(0, 0, 0);
        let far = TestViewer::at(5000, 5000, 0);
        let upstairs = TestViewer::at(0, 0, 2);
        let reg = registry(&TestDirectory::with(&[&near, &far, &upstairs]));
        let o = obj(7, 1, 1, 0);
        reg.register(o).unwrap();
        near.take();
        upstairs.take();

        assert!(reg.unregister(&o).unwrap());
        assert!(reg.is_empty());
        for v in [&near, &far, &upstairs] {
            assert_eq!(v.take(), vec![Seen::Hide(o)]);
        }
    }

    #[test]
    fn remove_on_position_hides_for_everyone() {
        let near = TestViewer::at(0, 0, 0);
        let far = TestViewer::at(-900, 0, 3);
        let reg = registry(&TestDirectory::with(&[&near, &far]));
        let o = obj(7, 3, 3, 1);
        reg.register(o).unwrap();
        near.take();

        assert_eq!(reg.remove_on_position(o.position), Some(o));
        assert!(reg.is_empty());
        assert_eq!(near.take(), vec![Seen::Hide(o)]);
        assert_eq!(far.take(), vec![Seen::Hide(o)]);
    }

    #[test]
    fn remove_on_empty_position_is_noop() {
        let q = TestViewer::at(0, 0, 0);
        let reg = registry(&TestDirectory::with(&[&q]));
        reg.register(obj(1, 0, 0, 0)).unwrap();
        q.take();

        assert_eq!(reg.remove_on_position(Position::new(0, 0, 1)), None);
        assert_eq!(reg.len(), 1);
        assert!(q.take().is_empty());
    }

    #[test]
    fn register_shows_within_planar_range_on_any_floor() {
        let edge = TestViewer::at(160, 100, 0);
        let beyond = TestViewer::at(161, 100, 0);
        let other_floor = TestViewer::at(100, 130, 3);
        let reg = registry(&TestDirectory::with(&[&edge, &beyond, &other_floor]));
        let o = obj(5, 100, 100, 0);

        reg.register(o).unwrap();

        assert_eq!(edge.take(), vec![Seen::Show(o)]);
        assert!(beyond.take().is_empty());
        assert_eq!(other_floor.take(), vec![Seen::Show(o)]);
    }

    #[test]
    fn register_skips_empty_directory_slots() {
        let q = TestViewer::at(0, 0, 0);
        let dir = TestDirectory::with(&[]);
        dir.push_empty();
        dir.slots.write().unwrap().push(Some(Arc::clone(&q)));
        dir.push_empty();
        let reg = registry(&dir);

        let o = obj(1, 1, 1, 0);
        reg.register(o).unwrap();
        assert_eq!(q.take(), vec![Seen::Show(o)]);
    }

    #[test]
    fn eviction_sends_no_hide() {
        let reg_dir = TestDirectory::with(&[]);
        let q = TestViewer::at(12, 12, 0);
        reg_dir.slots.write().unwrap().push(Some(Arc::clone(&q)));
        let reg = registry(&reg_dir);

        let a = obj(1, 10, 10, 0);
        reg.register(a).unwrap();
        assert_eq!(q.take(), vec![Seen::Show(a)]);

        let b = obj(2, 10, 10, 0);
        assert_eq!(reg.register(b).unwrap(), Some(a));
        assert_eq!(q.take(), vec![Seen::Show(b)]);
        assert_eq!(reg.objects(), vec![b]);
    }

    #[test]
    fn eviction_leaves_out_of_range_viewer_untouched() {
        let q = TestViewer::at(100, 100, 0);
        let reg = registry(&TestDirectory::with(&[&q]));
        let a = obj(1, 100, 100, 0);
        reg.register(a).unwrap();
        q.take();

        // Viewer walks away; the replacement's show never reaches them, and
        // neither does a hide for the old object.
        q.move_to(Position::new(500, 500, 0));
        reg.register(obj(2, 100, 100, 0)).unwrap();
        assert!(q.take().is_empty());
    }

    #[test]
    fn load_new_region_shows_only_objects_in_range() {
        let reg = registry(&TestDirectory::with(&[]));
        let near = obj(1, 40, 40, 0);
        let near_upstairs = obj(2, 60, 0, 2);
        let far = obj(3, 61, 0, 0);
        for o in [near, near_upstairs, far] {
            reg.register(o).unwrap();
        }

        let q = TestViewer::at(0, 0, 0);
        reg.load_new_region(q.as_ref());

        let mut seen = q.take();
        seen.sort_by_key(|s| match s {
            Seen::Show(o) | Seen::Hide(o) => o.id,
        });
        assert_eq!(seen, vec![Seen::Show(near), Seen::Show(near_upstairs)]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn load_new_region_does_not_mutate() {
        let reg = registry(&TestDirectory::with(&[]));
        reg.register(obj(1, 0, 0, 0)).unwrap();
        let before = reg.objects();
        let q = TestViewer::at(1000, 1000, 0);
        reg.load_new_region(q.as_ref());
        assert!(q.take().is_empty());
        assert_eq!(reg.objects(), before);
    }

    #[test]
    fn remove_on_height_hides_other_floors_regardless_of_distance() {
        let reg = registry(&TestDirectory::with(&[]));
        let same_floor = obj(1, 0, 0, 1);
        let below_far = obj(2, 9000, 9000, 0);
        let above_near = obj(3, 1, 1, 2);
        for o in [same_floor, below_far, above_near] {
            reg.register(o).unwrap();
        }

        let q = TestViewer::at(0, 1, 1);
        reg.remove_on_height(q.as_ref());

        let seen = q.take();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&Seen::Hide(below_far)));
        assert!(seen.contains(&Seen::Hide(above_near)));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn remove_on_height_repeats_hides() {
        let reg = registry(&TestDirectory::with(&[]));
        let o = obj(1, 0, 0, 0);
        reg.register(o).unwrap();
        let q = TestViewer::at(0, 0, 1);

        reg.remove_on_height(q.as_ref());
        reg.remove_on_height(q.as_ref());
        assert_eq!(q.take(), vec![Seen::Hide(o), Seen::Hide(o)]);
    }

    #[test]
    fn any_floor_level_is_accepted() {
        let q = TestViewer::at(0, 0, 4);
        let reg = registry(&TestDirectory::with(&[&q]));
        let basement = obj(1, 0, 0, -1);
        let high = obj(2, 5, 5, 4);

        assert_eq!(reg.unregister(&high), Ok(false));
        assert_eq!(reg.unregister(&basement), Ok(false));
        assert!(q.take().is_empty());

        assert_eq!(reg.register(basement), Ok(None));
        assert_eq!(reg.register(high), Ok(None));
        assert_eq!(reg.len(), 2);
        assert_eq!(q.take(), vec![Seen::Show(basement), Seen::Show(high)]);

        assert_eq!(reg.unregister(&basement), Ok(true));
        assert_eq!(reg.unregister(&high), Ok(true));
        assert!(reg.is_empty());
        assert_eq!(q.take(), vec![Seen::Hide(basement), Seen::Hide(high)]);
    }

    #[test]
    fn register_raw_validates_fields() {
        let reg = registry(&TestDirectory::with(&[]));
        let pos = Position::new(3, 3, 0);
        assert!(reg.register_raw(1276, pos, 2, 10).unwrap().is_none());
        assert_eq!(reg.get(pos).unwrap().face, Face::East);

        let err = reg.register_raw(1276, pos, 7, 10).unwrap_err();
        assert_eq!(err, RegistryError::Object(ObjectError::InvalidFace(7)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn custom_broadcast_distance() {
        let q = TestViewer::at(0, 0, 0);
        let dir = TestDirectory::with(&[&q]);
        let reg = ObjectRegistry::new(
            dir as Arc<dyn PlayerDirectory>,
            RegistryConfig {
                broadcast_distance: 5,
            },
        );
        reg.register(obj(1, 5, 5, 0)).unwrap();
        reg.register(obj(2, 6, 0, 0)).unwrap();
        assert_eq!(q.take().len(), 1);
    }

    #[test]
    fn concurrent_mutation_keeps_live_count() {
        let q = TestViewer::at(4, 4, 0);
        let reg = Arc::new(registry(&TestDirectory::with(&[&q])));

        let (inserted, removed) = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8u64)
                .map(|t| {
                    let reg = Arc::clone(&reg);
                    s.spawn(move || {
                        let mut rng = StdRng::seed_from_u64(t);
                        let (mut inserted, mut removed) = (0usize, 0usize);
                        for _ in 0..2_000 {
                            let o = obj(
                                rng.gen_range(0..4),
                                rng.gen_range(0..8),
                                rng.gen_range(0..8),
                                rng.gen_range(-1..=4),
                            );
                            match rng.gen_range(0..3) {
                                0 | 1 => {
                                    if reg.register(o).unwrap().is_none() {
                                        inserted += 1;
                                    }
                                }
                                _ => {
                                    if reg.unregister(&o).unwrap() {
                                        removed += 1;
                                    }
                                }
                            }
                        }
                        (inserted, removed)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .fold((0, 0), |(i, r), (ti, tr)| (i + ti, r + tr))
        });

        assert!(removed > 0);
        assert_eq!(reg.len(), inserted - removed);
        for o in reg.objects() {
            assert_eq!(reg.get(o.position), Some(o));
        }
    }

    #[test]
    fn concurrent_fanout_preserves_per_client_order() {
        let q = TestViewer::at(0, 0, 0);
        let reg = Arc::new(registry(&TestDirectory::with(&[&q])));

        std::thread::scope(|s| {
            for t in 0..4i32 {
                let reg = Arc::clone(&reg);
                s.spawn(move || {
                    for i in 0..200 {
                        let o = obj(t as u16, t, i % 10, 0);
                        reg.register(o).unwrap();
                        reg.unregister(&o).unwrap();
                    }
                });
            }
        });

        let seen = q.take();
        assert_eq!(seen.len(), 1_600);
        assert!(reg.is_empty());
        for t in 0..4u16 {
            let per_thread: Vec<&Seen> = seen
                .iter()
                .filter(|s| matches!(s, Seen::Show(o) | Seen::Hide(o) if o.id == t))
                .collect();
            for pair in per_thread.chunks(2) {
                assert!(matches!(pair, [Seen::Show(a), Seen::Hide(b)] if a == b));
            }
        }
    }
}
