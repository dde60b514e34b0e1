use futures_util::{SinkExt, StreamExt};
use skyjo_protocol::{
    ClientToServer, PublicRoom, PublicSlot, ServerToClient, GRID_COLUMNS, GRID_ROWS,
};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use uuid::Uuid;

const DEFAULT_URL: &str = "ws://127.0.0.1:9001/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎮 Skyjo CLI Client");
    println!("===================");

    let name = prompt("Enter your name: ")?;
    if name.is_empty() {
        println!("❌ Name cannot be empty");
        return Ok(());
    }
    let color = prompt("Pick a color: ")?;

    let url = std::env::var("SERVER_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    println!("🔗 Connecting to {}...", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("✅ Connected to server!");

    let (mut write, mut read) = ws_stream.split();

    tokio::spawn(async move {
        let mut my_id: Option<Uuid> = None;
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerToClient>(&text) {
                    Ok(server_msg) => handle_server_message(server_msg, &mut my_id),
                    Err(e) => println!("⚠️  Unreadable message: {}", e),
                },
                Ok(Message::Close(_)) => {
                    println!("🔌 Connection closed by server");
                    break;
                }
                Err(e) => {
                    println!("❌ WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    print_help();

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if line == "help" {
            print_help();
            continue;
        }

        match parse_command(line, &name, &color) {
            Some(msg) => {
                let json = serde_json::to_string(&msg)?;
                write.send(Message::Text(json)).await?;
            }
            None => println!("❓ Unknown command: {}", line),
        }
    }

    println!("👋 Goodbye!");
    Ok(())
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf.trim().to_string())
}

fn print_help() {
    println!("\n📋 Commands available:");
    println!("  host [max] [password]        - Create a room");
    println!("  join <code> [password]       - Join a room by its 6-digit code");
    println!("  start                        - Deal a round (host)");
    println!("  draw                         - Draw from the pile");
    println!("  take                         - Take the top discard");
    println!("  place <0-11>                 - Swap the held card into your grid");
    println!("  reveal <0-11>                - Discard the drawn card and flip a slot");
    println!("  new                          - Start a new game after the last one ended (host)");
    println!("  state                        - Ask for the current table");
    println!("  chat <msg>                   - Send a chat message");
    println!("  leave                        - Leave the room");
    println!("  quit                         - Exit");
    println!("\nGrid positions run left to right, top to bottom.\n");
}

fn handle_server_message(msg: ServerToClient, my_id: &mut Option<Uuid>) {
    match msg {
        ServerToClient::Hello { your_id } => {
            *my_id = Some(your_id);
            println!("👋 Welcome! Your ID: {}", your_id);
        }
        ServerToClient::RoomCreated { room, snapshot, .. } => {
            println!("🏠 Room {} created. Share the code with your friends.", room);
            print_game_state(&snapshot, *my_id);
        }
        ServerToClient::Joined { room, snapshot, .. } => {
            println!("🎯 Joined room {}", room);
            print_game_state(&snapshot, *my_id);
        }
        ServerToClient::UpdateState { snapshot } => print_game_state(&snapshot, *my_id),
        ServerToClient::CardDrawn { card } => {
            println!("🃏 You drew {}. 'place N' to keep it or 'reveal N' to discard it.", card.value());
        }
        ServerToClient::RoundEnded { round_number, scores } => {
            println!("\n🏁 Round {} over", round_number);
            for (id, score) in scores {
                println!("  {}: {:+}", short(id), score);
            }
        }
        ServerToClient::GameEnded { winner_name, total_scores, .. } => {
            println!("\n🏆 {} wins!", winner_name);
            for (id, total) in total_scores {
                println!("  {}: {}", short(id), total);
            }
        }
        ServerToClient::ChatMessage { player_name, message, .. } => {
            println!("💬 {}: {}", player_name, message);
        }
        ServerToClient::Info { message } => println!("ℹ️  {}", message),
        ServerToClient::Error { kind, message } => println!("❌ {:?}: {}", kind, message),
        ServerToClient::Left => println!("🚪 You left the room"),
    }
}

fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn print_game_state(snapshot: &PublicRoom, my_id: Option<Uuid>) {
    println!("\n🎲 === ROOM {} ===", snapshot.room);
    println!("🕹️  Phase: {} (round {})", snapshot.phase, snapshot.round_number);
    println!(
        "🂠 Draw pile: {}   Discard: {}",
        snapshot.draw_pile_count,
        snapshot
            .discard_top
            .map_or_else(|| "-".to_string(), |c| c.value().to_string())
    );
    if let Some(held) = snapshot.held {
        match held.card {
            Some(card) => println!("✋ Holding {} from {:?}", card.value(), held.source),
            None => println!("✋ Holding a card from {:?}", held.source),
        }
    }

    println!("👥 Players ({}/{}):", snapshot.players.len(), snapshot.max_players);
    for player in &snapshot.players {
        let you = if Some(player.id) == my_id { " (you)" } else { "" };
        let host = if player.is_host { " 🎩" } else { "" };
        let to_act = if Some(player.id) == snapshot.current_player_id { " 👈 TO ACT" } else { "" };
        println!(
            "  {} [{}] round {} / total {}{}{}{}",
            player.name, player.color, player.score, player.total_score, you, host, to_act
        );
        for row in 0..GRID_ROWS {
            let cells: Vec<String> = (0..GRID_COLUMNS)
                .map(|col| match player.grid.get(row * GRID_COLUMNS + col) {
                    Some(PublicSlot::Revealed { value }) => format!("{}", value),
                    Some(PublicSlot::Hidden) => "  ?".to_string(),
                    Some(PublicSlot::Cleared) | None => "  .".to_string(),
                })
                .collect();
            println!("     {}", cells.join(" "));
        }
    }
    println!("==================\n");
}

fn parse_command(input: &str, name: &str, color: &str) -> Option<ClientToServer> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let position = || parts.get(1).and_then(|p| p.parse::<usize>().ok());

    match parts.first()?.to_lowercase().as_str() {
        "host" => Some(ClientToServer::HostRoom {
            name: name.to_string(),
            color: color.to_string(),
            max_players: parts.get(1).and_then(|m| m.parse().ok()),
            password: parts.get(2).map(|p| p.to_string()),
        }),
        "join" => Some(ClientToServer::JoinRoom {
            room: parts.get(1)?.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            password: parts.get(2).map(|p| p.to_string()),
        }),
        "start" => Some(ClientToServer::StartGame),
        "draw" => Some(ClientToServer::DrawCard),
        "take" => Some(ClientToServer::TakeDiscard),
        "place" => Some(ClientToServer::PlaceCard { position: position()? }),
        "reveal" => Some(ClientToServer::DiscardAndReveal { position: position()? }),
        "new" => Some(ClientToServer::NewGame),
        "state" => Some(ClientToServer::GetState),
        "leave" => Some(ClientToServer::LeaveRoom),
        "chat" if parts.len() > 1 => Some(ClientToServer::Chat {
            message: parts[1..].join(" "),
        }),
        _ => None,
    }
}
