use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::validate_name;
use super::{Engine, EngineError};

// Reference data mutations all hold the catalog write lock. That serializes
// them against each other (name and number uniqueness) and against in-flight
// bookings, which hold the catalog shared.

impl Engine {
    pub async fn create_branch(&self, id: Ulid, name: String) -> Result<(), EngineError> {
        validate_name("branch name", &name, MAX_NAME_LEN)?;
        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let _catalog = self.acquire("catalog", self.catalog.write()).await?;

        if self.branches.len() >= MAX_BRANCHES {
            return Err(EngineError::LimitExceeded("too many branches"));
        }
        if self.branches.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("branch {id}")));
        }
        if self.branch_names.contains_key(&name) {
            return Err(EngineError::AlreadyExists(format!("branch {name}")));
        }

        let event = Event::BranchCreated { id, name: name.clone() };
        self.wal_append(&event).await?;
        self.insert_branch(id, name.clone());
        info!(branch_id = %id, branch = %name, "branch created");
        Ok(())
    }

    pub async fn create_room_type(&self, room_type: RoomType) -> Result<(), EngineError> {
        validate_name("room type name", &room_type.name, MAX_NAME_LEN)?;
        if room_type.capacity == 0 {
            return Err(EngineError::InvalidInput("room capacity must be at least 1".into()));
        }
        if room_type.capacity > MAX_ROOM_CAPACITY {
            return Err(EngineError::LimitExceeded("room capacity too large"));
        }
        if room_type.base_price < 0 {
            return Err(EngineError::InvalidInput("base price must not be negative".into()));
        }
        if room_type.base_price > MAX_AMOUNT_CENTS {
            return Err(EngineError::LimitExceeded("base price too large"));
        }
        if let Some(ref amenities) = room_type.amenities
            && amenities.len() > MAX_AMENITIES_LEN
        {
            return Err(EngineError::LimitExceeded("amenities too long"));
        }

        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let mut catalog = self.acquire("catalog", self.catalog.write()).await?;
        if catalog.len() >= MAX_ROOM_TYPES {
            return Err(EngineError::LimitExceeded("too many room types"));
        }
        if catalog.contains_key(&room_type.name) {
            return Err(EngineError::AlreadyExists(format!("room type {}", room_type.name)));
        }

        let event = Event::RoomTypeCreated { room_type: room_type.clone() };
        self.wal_append(&event).await?;
        info!(room_type = %room_type.name, capacity = room_type.capacity, "room type created");
        catalog.insert(room_type.name.clone(), room_type);
        Ok(())
    }

    /// Remove a room type. Refused while any room is still of that type, so a
    /// booking that validated the type can never lose it mid-transaction.
    pub async fn delete_room_type(&self, name: &str) -> Result<(), EngineError> {
        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let mut catalog = self.acquire("catalog", self.catalog.write()).await?;
        if !catalog.contains_key(name) {
            return Err(EngineError::InvalidRoomType(name.to_string()));
        }
        if self.room_info.iter().any(|info| info.room_type == name) {
            return Err(EngineError::RoomTypeInUse(name.to_string()));
        }

        let event = Event::RoomTypeDeleted { name: name.to_string() };
        self.wal_append(&event).await?;
        catalog.remove(name);
        info!(room_type = %name, "room type deleted");
        Ok(())
    }

    pub async fn create_room(
        &self,
        id: Ulid,
        branch_id: Ulid,
        room_type: String,
        number: String,
    ) -> Result<(), EngineError> {
        validate_name("room number", &number, MAX_ROOM_NUMBER_LEN)?;
        let _gate = self.acquire("commit gate", self.commit_gate.read()).await?;
        let catalog = self.acquire("catalog", self.catalog.write()).await?;

        let branch = self
            .branches
            .get(&branch_id)
            .map(|b| b.name.clone())
            .ok_or_else(|| EngineError::BranchNotFound(branch_id.to_string()))?;
        if !catalog.contains_key(&room_type) {
            return Err(EngineError::InvalidRoomType(room_type));
        }
        if self.rooms.contains_key(&id) {
            return Err(EngineError::AlreadyExists(format!("room {id}")));
        }
        let branch_rooms = self.rooms_in_branch(&branch_id);
        if branch_rooms.len() >= MAX_ROOMS_PER_BRANCH {
            return Err(EngineError::LimitExceeded("too many rooms in branch"));
        }
        let taken = branch_rooms
            .iter()
            .any(|rid| self.room_info.get(rid).is_some_and(|info| info.number == number));
        if taken {
            return Err(EngineError::AlreadyExists(format!("room {number} at {branch}")));
        }

        let event = Event::RoomCreated {
            id,
            branch_id,
            room_type: room_type.clone(),
            number: number.clone(),
        };
        self.wal_append(&event).await?;
        info!(room_id = %id, branch = %branch, room_type = %room_type, number = %number, "room created");
        self.insert_room(RoomState::new(id, branch_id, room_type, number));
        Ok(())
    }
}
