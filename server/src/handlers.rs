use crate::error::{ActionError, NotFoundError, PreconditionError};
use crate::game::TurnOutcome;
use crate::registry::{NewPlayer, Outbox, Room, RoomRegistry};
use chrono::Utc;
use log::info;
use skyjo_protocol::*;
use uuid::Uuid;

/// How a handled command changed the caller's room membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomChange {
    Stay,
    Entered(String),
    Left,
}

/// Apply one client command for `my_id`. Errors are for the caller only; the
/// transport reports them and keeps the connection open.
pub fn dispatch(
    registry: &RoomRegistry,
    joined_room: Option<&str>,
    my_id: Uuid,
    tx_out: &Outbox,
    cmd: ClientToServer,
) -> Result<RoomChange, ActionError> {
    match cmd {
        ClientToServer::HostRoom {
            name,
            color,
            max_players,
            password,
        } => {
            if joined_room.is_some() {
                return Err(PreconditionError::AlreadyInRoom.into());
            }
            let host = NewPlayer::parse(&name, &color)?;
            let code = registry.create_room(my_id, host, max_players, password, tx_out.clone())?;
            let snapshot = registry.with_room(&code, |r| Ok(r.snapshot()))?;
            let _ = tx_out.send(ServerToClient::RoomCreated {
                room: code.clone(),
                player_id: my_id,
                snapshot,
            });
            Ok(RoomChange::Entered(code))
        }
        ClientToServer::JoinRoom {
            room,
            name,
            color,
            password,
        } => {
            if joined_room.is_some() {
                return Err(PreconditionError::AlreadyInRoom.into());
            }
            let player = NewPlayer::parse(&name, &color)?;
            let room = room.trim().to_string();
            let snapshot =
                registry.join_room(&room, my_id, player, password.as_deref(), tx_out.clone())?;
            let _ = tx_out.send(ServerToClient::Joined {
                room: room.clone(),
                player_id: my_id,
                snapshot,
            });
            Ok(RoomChange::Entered(room))
        }
        ClientToServer::LeaveRoom => {
            let code = joined_room.ok_or(NotFoundError::NotInRoom)?;
            registry.leave_room(code, my_id)?;
            let _ = tx_out.send(ServerToClient::Left);
            Ok(RoomChange::Left)
        }
        cmd => {
            let code = joined_room.ok_or(NotFoundError::NotInRoom)?;
            registry.with_room(code, |r| handle_in_room(r, my_id, cmd))?;
            Ok(RoomChange::Stay)
        }
    }
}

fn handle_in_room(r: &mut Room, id: Uuid, cmd: ClientToServer) -> Result<(), ActionError> {
    r.require_member(id)?;
    match cmd {
        ClientToServer::StartGame => start_game(r, id),
        ClientToServer::DrawCard => draw_card(r, id).map(|_| ()),
        ClientToServer::TakeDiscard => take_discard(r, id).map(|_| ()),
        ClientToServer::PlaceCard { position } => place_card(r, id, position),
        ClientToServer::DiscardAndReveal { position } => discard_and_reveal(r, id, position),
        ClientToServer::NewGame => new_game(r, id),
        ClientToServer::GetState => {
            r.send_to(id, ServerToClient::UpdateState { snapshot: r.snapshot() });
            Ok(())
        }
        ClientToServer::Chat { message } => chat(r, id, &message),
        ClientToServer::HostRoom { .. }
        | ClientToServer::JoinRoom { .. }
        | ClientToServer::LeaveRoom => Err(ActionError::Internal),
    }
}

/// Deal the first or the next round. Host only.
pub fn start_game(r: &mut Room, id: Uuid) -> Result<(), ActionError> {
    r.require_host(id)?;
    r.engine.start_new_round()?;
    info!("[START] room={} round={}", r.code, r.engine.round_number());
    r.broadcast(&ServerToClient::Info {
        message: format!("Round {} started", r.engine.round_number()),
    });
    r.broadcast_state();
    Ok(())
}

pub fn draw_card(r: &mut Room, id: Uuid) -> Result<Card, ActionError> {
    let card = r.engine.draw_card(id)?;
    r.send_to(id, ServerToClient::CardDrawn { card });
    r.broadcast_state();
    Ok(card)
}

pub fn take_discard(r: &mut Room, id: Uuid) -> Result<Card, ActionError> {
    let card = r.engine.take_discard(id)?;
    r.broadcast_state();
    Ok(card)
}

pub fn place_card(r: &mut Room, id: Uuid, position: usize) -> Result<(), ActionError> {
    let outcome = r.engine.place_card(id, position)?;
    announce(r, outcome);
    Ok(())
}

pub fn discard_and_reveal(r: &mut Room, id: Uuid, position: usize) -> Result<(), ActionError> {
    let outcome = r.engine.discard_and_reveal(id, position)?;
    announce(r, outcome);
    Ok(())
}

fn announce(r: &Room, outcome: TurnOutcome) {
    if let TurnOutcome::RoundOver(summary) = outcome {
        r.broadcast(&ServerToClient::RoundEnded {
            round_number: summary.round_number,
            scores: summary.scores,
        });
        if let Some(winner) = r.engine.winner() {
            r.broadcast(&ServerToClient::GameEnded {
                winner_id: winner.id,
                winner_name: winner.name.clone(),
                total_scores: summary.totals,
            });
        }
    }
    r.broadcast_state();
}

/// Replace a finished game with a fresh one for the same table.
pub fn new_game(r: &mut Room, id: Uuid) -> Result<(), ActionError> {
    r.require_host(id)?;
    if r.engine.phase() != Phase::GameEnd {
        return Err(PreconditionError::GameNotOver.into());
    }
    r.engine = r.engine.rematch();
    info!("[NEW_GAME] room={}", r.code);
    r.broadcast_state();
    Ok(())
}

pub fn chat(r: &mut Room, id: Uuid, message: &str) -> Result<(), ActionError> {
    let message: String = message.trim().chars().take(MAX_CHAT_LEN).collect();
    if message.is_empty() {
        return Err(ActionError::validation("Message cannot be empty"));
    }
    let sender = r.engine.player(id).ok_or(NotFoundError::Player)?;
    let msg = ServerToClient::ChatMessage {
        player_id: id,
        player_name: sender.name.clone(),
        player_color: sender.color.clone(),
        message,
        timestamp: Utc::now().to_rfc3339(),
    };
    r.broadcast(&msg);
    Ok(())
}

