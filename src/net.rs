// ==============================================================================
// net.rs — WEBSOCKET INGEST/EGRESS
// ------------------------------------------------------------------------------
// Accepts render clients, sends a welcome + the terrain grid once, then
// forwards key-down/key-up events into the simulation. Snapshots flow the
// other way through each client's outgoing channel (see state.rs).
// ==============================================================================

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::sim::Simulation;
use crate::state::SharedState;

#[derive(Debug)]
struct ClientMessage {
    msg_type: String,
    key: String,
    down: bool,
}

impl ClientMessage {
    fn from_json(txt: &str) -> Option<Self> {
        let v = serde_json::from_str::<serde_json::Value>(txt).ok()?;

        Some(ClientMessage {
            msg_type: v.get("type")?.as_str()?.to_string(),
            key: v
                .get("key")
                .and_then(|x| x.as_str())
                .unwrap_or("")
                .to_string(),
            down: v.get("down").and_then(|x| x.as_bool()).unwrap_or(false),
        })
    }
}

pub async fn start_websocket_server(
    addr: String,
    state: Arc<Mutex<SharedState>>,
    sim: Arc<Mutex<Simulation>>,
) {
    let listener = TcpListener::bind(&addr)
        .await
        .expect("failed to bind WebSocket port");

    info!("🌐 WebSocket listening on ws://{addr}");

    loop {
        let (raw, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };
        let state = Arc::clone(&state);
        let sim = Arc::clone(&sim);

        tokio::spawn(async move {
            let ws = match accept_async(raw).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("handshake failed: {e}");
                    return;
                }
            };
            let (mut write, mut read) = ws.split();

            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            {
                let mut state = state.lock().await;
                state.register_client(tx.clone());
            }

            // Send loop: snapshots and one-shot messages.
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if write.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
            });

            let client_id = Uuid::new_v4().to_string();
            info!("🟢 client connected: {client_id}");

            let welcome = format!(r#"{{"type":"welcome","client_id":"{client_id}"}}"#);
            let _ = tx.send(welcome);

            // Terrain grid, once, so the renderer can build the same mesh.
            {
                let sim = sim.lock().await;
                if let Ok(json) = serde_json::to_string(&sim.terrain.to_message()) {
                    let _ = tx.send(json);
                }
            }

            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(m) => m,
                    Err(_) => break,
                };
                if !msg.is_text() {
                    continue;
                }
                let text = match msg.to_text() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                let parsed = match ClientMessage::from_json(text) {
                    Some(v) => v,
                    None => continue,
                };

                match parsed.msg_type.as_str() {
                    "ping" => {
                        let _ = tx.send("{\"type\":\"pong\"}".into());
                    }
                    "key" => {
                        let mut sim = sim.lock().await;
                        sim.handle_key(&parsed.key, parsed.down);
                    }
                    _ => {}
                }
            }

            info!("🔴 client disconnected: {client_id}");
        });
    }
}
