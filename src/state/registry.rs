use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;

use crate::{
    error::ServiceError,
    state::{
        room::{Player, Room},
        room_code::RoomCode,
    },
};

/// A room behind its own lock. Operations on different rooms never contend.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Attempts at drawing an unused code before reporting capacity exhaustion.
const MAX_CODE_ATTEMPTS: usize = 32;

/// Process-wide map from room code to live room.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, SharedRoom>,
    /// Slots taken against the room cap, reserved before a room is inserted.
    reserved: AtomicUsize,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an active room.
    pub fn get(&self, code: &RoomCode) -> Option<SharedRoom> {
        self.rooms.get(code).map(|entry| Arc::clone(entry.value()))
    }

    /// Register a new room hosted by `host` under a freshly drawn, unused code.
    ///
    /// A slot under `max_rooms` is reserved before any code is drawn, so concurrent
    /// creations never overshoot the cap. The code is claimed through the map entry, so two
    /// concurrent creations can never end up with the same code.
    pub fn create(
        &self,
        host: Player,
        total_rounds: usize,
        max_rooms: usize,
    ) -> Result<(RoomCode, SharedRoom), ServiceError> {
        self.reserve_slot(max_rooms)?;

        let mut rng = rand::rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = RoomCode::random(&mut rng);
            if let Entry::Vacant(slot) = self.rooms.entry(code.clone()) {
                let room = Arc::new(Mutex::new(Room::new(code.clone(), host, total_rounds)));
                slot.insert(Arc::clone(&room));
                return Ok((code, room));
            }
        }
        self.reserved.fetch_sub(1, Ordering::AcqRel);
        Err(ServiceError::Capacity)
    }

    fn reserve_slot(&self, max_rooms: usize) -> Result<(), ServiceError> {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < max_rooms).then_some(taken + 1)
            })
            .map(|_| ())
            .map_err(|_| ServiceError::Capacity)
    }

    /// Drop a room from the registry; its code and its slot become available again.
    pub fn remove(&self, code: &RoomCode) -> Option<SharedRoom> {
        let (_, room) = self.rooms.remove(code)?;
        self.reserved.fetch_sub(1, Ordering::AcqRel);
        Some(room)
    }

    /// Number of active rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is active.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Snapshot of every registered room, used by the eviction sweep.
    pub fn handles(&self) -> Vec<(RoomCode, SharedRoom)> {
        self.rooms
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}
