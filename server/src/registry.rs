//! Room directory.
//!
//! Each room sits behind its own mutex so that actions in one room never wait
//! on another. The directory lock is only taken to find, add or drop a room,
//! and always before a room lock, never while holding one.

use crate::error::{ActionError, NotFoundError, PreconditionError};
use crate::game::Engine;
use log::{info, warn};
use parking_lot::Mutex;
use rand::Rng;
use skyjo_protocol::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type Outbox = mpsc::UnboundedSender<ServerToClient>;
pub type RoomHandle = Arc<Mutex<Room>>;

/// Checked name and color for a player about to be seated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub name: String,
    pub color: String,
}

impl NewPlayer {
    pub fn parse(name: &str, color: &str) -> Result<Self, ActionError> {
        let name = name.trim();
        let color = color.trim();
        if name.is_empty() || color.is_empty() {
            return Err(ActionError::validation("Missing required fields"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ActionError::validation(format!(
                "Name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        Ok(NewPlayer {
            name: name.to_string(),
            color: color.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    password: Option<String>,
    pub engine: Engine,
    connections: HashMap<Uuid, Outbox>,
}

impl Room {
    fn new(code: String, password: Option<String>, engine: Engine) -> Self {
        Room {
            code,
            password,
            engine,
            connections: HashMap::new(),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    pub fn snapshot(&self) -> PublicRoom {
        self.engine.snapshot(&self.code, self.has_password())
    }

    /// Send to every seated player in insertion order.
    pub fn broadcast(&self, msg: &ServerToClient) {
        for p in self.engine.players() {
            self.send_to(p.id, msg.clone());
        }
    }

    pub fn broadcast_except(&self, skip: Uuid, msg: &ServerToClient) {
        for p in self.engine.players().iter().filter(|p| p.id != skip) {
            self.send_to(p.id, msg.clone());
        }
    }

    pub fn broadcast_state(&self) {
        self.broadcast(&ServerToClient::UpdateState {
            snapshot: self.snapshot(),
        });
    }

    pub fn send_to(&self, id: Uuid, msg: ServerToClient) {
        if let Some(tx) = self.connections.get(&id) {
            if tx.send(msg).is_err() {
                warn!("[BROADCAST] room={} send to {} failed", self.code, &id.to_string()[..8]);
            }
        }
    }

    pub fn require_member(&self, id: Uuid) -> Result<(), ActionError> {
        self.engine
            .player(id)
            .map(|_| ())
            .ok_or(NotFoundError::Player.into())
    }

    pub fn require_host(&self, id: Uuid) -> Result<(), ActionError> {
        self.require_member(id)?;
        if !self.engine.is_host(id) {
            return Err(PreconditionError::NotHost.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room still has players.
    Left { name: String },
    /// The last player left and the room is gone.
    Closed,
}

pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    default_max_players: usize,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(4)
    }
}

impl RoomRegistry {
    pub fn new(default_max_players: usize) -> Self {
        RoomRegistry {
            rooms: Mutex::new(HashMap::new()),
            default_max_players: default_max_players.clamp(MIN_PLAYERS, MAX_PLAYERS),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    #[cfg(test)]
    pub fn contains(&self, code: &str) -> bool {
        self.rooms.lock().contains_key(code)
    }

    fn handle(&self, code: &str) -> Result<RoomHandle, ActionError> {
        self.rooms
            .lock()
            .get(code)
            .cloned()
            .ok_or_else(|| NotFoundError::Room(code.to_string()).into())
    }

    /// Run `f` against one room under that room's lock only.
    pub fn with_room<T>(
        &self,
        code: &str,
        f: impl FnOnce(&mut Room) -> Result<T, ActionError>,
    ) -> Result<T, ActionError> {
        let handle = self.handle(code)?;
        let mut room = handle.lock();
        f(&mut room)
    }

    pub fn create_room(
        &self,
        host_id: Uuid,
        host: NewPlayer,
        max_players: Option<usize>,
        password: Option<String>,
        outbox: Outbox,
    ) -> Result<String, ActionError> {
        let max_players = max_players.unwrap_or(self.default_max_players);
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
            return Err(ActionError::validation(format!(
                "Max players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            )));
        }
        let password = password.filter(|p| !p.is_empty());

        let mut engine = Engine::new(max_players);
        engine.add_player(host_id, host.name.clone(), host.color)?;

        let mut rooms = self.rooms.lock();
        let code = generate_room_code(&mut rand::thread_rng(), |c| rooms.contains_key(c));
        let mut room = Room::new(code.clone(), password, engine);
        room.connections.insert(host_id, outbox);
        rooms.insert(code.clone(), Arc::new(Mutex::new(room)));

        info!("[CREATE] room={} host={} max_players={}", code, host.name, max_players);
        Ok(code)
    }

    pub fn join_room(
        &self,
        code: &str,
        player_id: Uuid,
        player: NewPlayer,
        password: Option<&str>,
        outbox: Outbox,
    ) -> Result<PublicRoom, ActionError> {
        if !is_valid_room_code(code) {
            return Err(ActionError::validation("Room code must be 6 digits"));
        }
        let rooms = self.rooms.lock();
        let handle = rooms
            .get(code)
            .ok_or_else(|| NotFoundError::Room(code.to_string()))?;
        let mut room = handle.lock();

        if let Some(expected) = &room.password {
            if password != Some(expected.as_str()) {
                return Err(PreconditionError::WrongPassword.into());
            }
        }
        room.engine
            .add_player(player_id, player.name.clone(), player.color)?;
        room.connections.insert(player_id, outbox);

        info!("[JOIN] room={} player={} seated={}", code, player.name, room.engine.players().len());
        room.broadcast_except(
            player_id,
            &ServerToClient::Info {
                message: format!("{} joined the game", player.name),
            },
        );
        room.broadcast_state();
        Ok(room.snapshot())
    }

    /// Remove a player; the room goes away with its last player.
    pub fn leave_room(&self, code: &str, player_id: Uuid) -> Result<LeaveOutcome, ActionError> {
        let mut rooms = self.rooms.lock();
        let handle = rooms
            .get(code)
            .cloned()
            .ok_or_else(|| NotFoundError::Room(code.to_string()))?;
        let mut room = handle.lock();

        let player = room
            .engine
            .remove_player(player_id)
            .ok_or(NotFoundError::Player)?;
        room.connections.remove(&player_id);

        if room.engine.players().is_empty() {
            rooms.remove(code);
            info!("[CLOSE] room={} deleted - no players", code);
            return Ok(LeaveOutcome::Closed);
        }

        info!("[LEAVE] room={} player={} remaining={}", code, player.name, room.engine.players().len());
        room.broadcast(&ServerToClient::Info {
            message: format!("{} left the game", player.name),
        });
        room.broadcast_state();
        Ok(LeaveOutcome::Left { name: player.name })
    }
}

/// Six uniformly random digits, redrawn while `taken` says the code is live.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let code = format!("{:06}", rng.gen_range(0..1_000_000u32));
        if !taken(&code) {
            return code;
        }
    }
}
