//! WebSocket transport: accepts connections, runs the fixed-timestep
//! simulation loop, and fans out snapshots/HUD messages to every
//! connected client. Grounded in the pack's `astraweave-net`
//! `run_ws`/`handle_conn` pattern (accept loop + per-connection task +
//! `tokio::sync::broadcast` fanout) — the teacher has no transport layer
//! of its own (`Server::step` is called directly by its test harness).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flowstate_wire::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use crate::config::RoomConfig;
use crate::driver;
use crate::session::Room;

/// A message fanned out to every connected client: either the binary
/// snapshot frame or a per-player JSON control message.
#[derive(Debug, Clone)]
pub enum Broadcast {
    Snapshot(Arc<Vec<u8>>),
    Server(Arc<ServerMessage>),
}

pub async fn run_ws(addr: SocketAddr, config: RoomConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "flowstate-server listening");

    let room = Arc::new(Mutex::new(Room::new(config.seed, config.tick_rate_hz, 1)));
    let (tx, _rx) = broadcast::channel::<Broadcast>(256);

    tokio::spawn(tick_loop(Arc::clone(&room), config, tx.clone()));

    loop {
        let (stream, peer) = listener.accept().await?;
        let room = Arc::clone(&room);
        let rx = tx.subscribe();
        tokio::spawn(async move {
            if let Err(err) = handle_conn(stream, peer, room, rx).await {
                tracing::warn!(%peer, %err, "connection closed with error");
            }
        });
    }
}

async fn tick_loop(room: Arc<Mutex<Room>>, config: RoomConfig, tx: broadcast::Sender<Broadcast>) {
    let tick_duration = std::time::Duration::from_secs_f64(1.0 / config.tick_rate_hz as f64);
    let mut interval = tokio::time::interval(tick_duration);
    let start = Instant::now();
    loop {
        interval.tick().await;
        let server_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let now = Instant::now();
        let output = {
            let mut room = room.lock().expect("room lock poisoned");
            room.expire_disconnected(now);
            driver::run_tick(&mut room, server_time_ms)
        };
        if let Some(bytes) = output.snapshot {
            let _ = tx.send(Broadcast::Snapshot(Arc::new(bytes)));
        }
        for (_, hud) in output.hud {
            let _ = tx.send(Broadcast::Server(Arc::new(ServerMessage::Hud(hud))));
        }
        if let Some(report) = output.telemetry {
            let tick = room.lock().expect("room lock poisoned").world.tick;
            tracing::info!(
                tick,
                rate_limited_drops_total = report.rate_limited_drops_total,
                history_misses_total = report.history_misses_total,
                shot_count = report.shot_count,
                rewind_depth_p50 = report.rewind_depth_p50,
                rewind_depth_p95 = report.rewind_depth_p95,
                mean_latency_ms = report.mean_latency_ms,
                mean_interp_delay_ms = report.mean_interp_delay_ms,
                mean_effective_age_ms = report.mean_effective_age_ms,
                held_input_shoot_skips = report.held_input_shoot_skips,
                "telemetry checkpoint"
            );
        }
    }
}

async fn handle_conn(
    stream: TcpStream,
    peer: SocketAddr,
    room: Arc<Mutex<Room>>,
    mut rx: broadcast::Receiver<Broadcast>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    // The first inbound message decides identity: a valid `reconnect`
    // against this room's session resumes a held slot (spec.md:143);
    // anything else joins fresh and is then replayed through the normal
    // message handler so it isn't silently dropped. A client that sends
    // nothing within the grace window just joins fresh.
    const RECONNECT_WINDOW: Duration = Duration::from_secs(3);
    let mut replay_first: Option<ClientMessage> = None;
    let player_id = 'identify: {
        if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(RECONNECT_WINDOW, read.next()).await {
            if let Ok(ClientMessage::Reconnect { session_id, player_id }) =
                serde_json::from_str::<ClientMessage>(&text)
            {
                let mut room = room.lock().expect("room lock poisoned");
                if session_id == room.session_id && room.reconnect(player_id, Instant::now()) {
                    tracing::info!(%peer, player_id, "player reconnected");
                    break 'identify player_id;
                }
            } else if let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) {
                replay_first = Some(msg);
            }
        }
        let mut room = room.lock().expect("room lock poisoned");
        let (player_id, _) = room.join("default".to_string(), Instant::now());
        tracing::info!(%peer, player_id, "player joined");
        player_id
    };

    let config_msg = {
        let room = room.lock().expect("room lock poisoned");
        room.game_config_for(player_id)
    };
    if let Some(config_msg) = config_msg {
        send_server_message(&mut write, &ServerMessage::GameConfig(config_msg)).await?;
    }
    if let Some(msg) = replay_first.take() {
        handle_client_message(&room, player_id, msg, &mut write).await?;
    }

    loop {
        tokio::select! {
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) {
                            handle_client_message(&room, player_id, msg, &mut write).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(%peer, %err, "websocket read error");
                        break;
                    }
                }
            }
            broadcast_msg = rx.recv() => {
                match broadcast_msg {
                    Ok(Broadcast::Snapshot(bytes)) => {
                        write.send(Message::Binary((*bytes).clone())).await?;
                    }
                    Ok(Broadcast::Server(msg)) => {
                        send_server_message(&mut write, &msg).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let mut room = room.lock().expect("room lock poisoned");
    room.mark_disconnected(player_id, Instant::now());
    Ok(())
}

async fn handle_client_message(
    room: &Arc<Mutex<Room>>,
    player_id: flowstate_sim::PlayerId,
    msg: ClientMessage,
    write: &mut (impl SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
) -> anyhow::Result<()> {
    match msg {
        ClientMessage::Input(input) => {
            let reply = {
                let mut room = room.lock().expect("room lock poisoned");
                room.handle_input(player_id, &input, Instant::now())
            };
            if let Some(reply) = reply {
                send_server_message(write, &reply).await?;
            }
        }
        ClientMessage::Ping { client_time } => {
            let server_time = Instant::now().elapsed().as_secs_f64();
            send_server_message(
                write,
                &ServerMessage::Pong {
                    client_time,
                    server_time,
                },
            )
            .await?;
        }
        ClientMessage::RequestGameConfig => {
            let config = room.lock().expect("room lock poisoned").game_config_for(player_id);
            if let Some(config) = config {
                send_server_message(write, &ServerMessage::GameConfig(config)).await?;
            }
        }
        ClientMessage::SelectNode { node_id } => {
            let reply = room
                .lock()
                .expect("room lock poisoned")
                .select_node(player_id, &node_id);
            send_server_message(write, &reply).await?;
        }
        ClientMessage::SetReady { .. } | ClientMessage::SetCharacter { .. } | ClientMessage::SetCampReady { .. } => {
            // Lobby/progression bookkeeping is out of scope for the
            // authoritative arena core (SPEC_FULL §1 Non-goals).
        }
        ClientMessage::Reconnect { .. } => {
            // Only meaningful as the connection's first message
            // (handled in `handle_conn`); once a slot is live, resending
            // it is a no-op.
        }
    }
    Ok(())
}

async fn send_server_message(
    write: &mut (impl SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    msg: &ServerMessage,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    write.send(Message::Text(json)).await?;
    Ok(())
}
