//! Per-room join bookkeeping, in configured join order.

/// Join status of one configured room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub room: String,
    pub join_requested: bool,
    pub join_confirmed: bool,
    /// Why the join failed (error condition or timeout), if it did.
    pub failure: Option<String>,
}

/// Memberships for the rooms joined so far in this session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomMemberships {
    rooms: Vec<RoomMembership>,
}

impl RoomMemberships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a join was issued for `room`.
    pub fn request(&mut self, room: &str) {
        match self.get_mut(room) {
            Some(entry) => {
                entry.join_requested = true;
                entry.join_confirmed = false;
                entry.failure = None;
            }
            None => self.rooms.push(RoomMembership {
                room: room.to_string(),
                join_requested: true,
                join_confirmed: false,
                failure: None,
            }),
        }
    }

    /// Marks `room` confirmed. Returns false if no join was requested for it.
    pub fn confirm(&mut self, room: &str) -> bool {
        match self.get_mut(room) {
            Some(entry) => {
                entry.join_confirmed = true;
                entry.failure = None;
                true
            }
            None => false,
        }
    }

    /// Marks `room` failed with `reason`. Returns false if no join was requested for it.
    pub fn fail(&mut self, room: &str, reason: impl Into<String>) -> bool {
        match self.get_mut(room) {
            Some(entry) => {
                entry.join_confirmed = false;
                entry.failure = Some(reason.into());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, room: &str) -> Option<&RoomMembership> {
        self.rooms.iter().find(|m| m.room == room)
    }

    fn get_mut(&mut self, room: &str) -> Option<&mut RoomMembership> {
        self.rooms.iter_mut().find(|m| m.room == room)
    }

    pub fn all(&self) -> &[RoomMembership] {
        &self.rooms
    }

    pub fn confirmed_count(&self) -> usize {
        self.rooms.iter().filter(|m| m.join_confirmed).count()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}
