//! Load test for the merge arcade server.
//!
//! Spawns multiple fake WebSocket players that:
//! - Connect and wait for the welcome message
//! - Drop bodies at random positions at a fixed rate
//! - Dismiss quizzes and restart after game over
//! - Count board_state, merged and game_over messages
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 100)
//!   --duration S     Test duration in seconds (default: 30)
//!   --drop-rate R    Drops per second per client (default: 2)
//!   --url URL        Server URL (default: ws://127.0.0.1:3000/ws)

use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use merge_arcade_shared::protocol::{ClientMsg, ServerMsg};

/// Broadcast rate the expected-delivery figure assumes
const EXPECTED_BROADCAST_HZ: f64 = 30.0;

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    messages_received: AtomicU64,
    board_states_received: AtomicU64,
    merges_received: AtomicU64,
    game_overs_received: AtomicU64,
    drops_sent: AtomicU64,
    drops_rejected: AtomicU64,
    errors: AtomicU64,
    total_bodies_seen: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    drop_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    metrics
        .latency_sum_ms
        .fetch_add(connect_start.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    // Wait for welcome message before doing anything else
    let welcome = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    if let Ok(ServerMsg::Welcome(w)) = serde_json::from_str::<ServerMsg>(&text) {
                        return Some(w.config.width);
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;

    let board_width = match welcome {
        Ok(Some(width)) => width,
        _ => {
            if client_id < 3 {
                eprintln!("Client {} got no welcome", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    };

    let drop_interval = if drop_rate > 0.0 {
        Duration::from_secs_f64(1.0 / drop_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut drop_timer = tokio::time::interval(drop_interval);
    drop_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = tokio::time::Instant::now() + duration;
    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64);

    loop {
        let reply = tokio::select! {
            _ = tokio::time::sleep_until(test_end) => break,

            _ = drop_timer.tick() => {
                metrics.drops_sent.fetch_add(1, Ordering::Relaxed);
                Some(ClientMsg::Drop { x: rng.gen_range(0.0..board_width) })
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        match serde_json::from_str::<ServerMsg>(&text) {
                            Ok(ServerMsg::BoardState(state)) => {
                                metrics.board_states_received.fetch_add(1, Ordering::Relaxed);
                                metrics
                                    .total_bodies_seen
                                    .fetch_add(state.bodies.len() as u64, Ordering::Relaxed);
                                None
                            }
                            Ok(ServerMsg::Merged(_)) => {
                                metrics.merges_received.fetch_add(1, Ordering::Relaxed);
                                None
                            }
                            Ok(ServerMsg::DropRejected(_)) => {
                                metrics.drops_rejected.fetch_add(1, Ordering::Relaxed);
                                None
                            }
                            Ok(ServerMsg::QuizOpened(_)) => {
                                Some(ClientMsg::AnswerQuiz { choice: Some(rng.gen_range(0..4)) })
                            }
                            Ok(ServerMsg::GameOver(_)) => {
                                metrics.game_overs_received.fetch_add(1, Ordering::Relaxed);
                                Some(ClientMsg::Restart)
                            }
                            _ => None,
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => None,
                }
            }
        };

        if let Some(msg) = reply {
            let Ok(json) = serde_json::to_string(&msg) else {
                continue;
            };
            if ws.send(Message::Text(json.into())).await.is_err() {
                metrics.errors.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 100;
    let mut duration_secs: u64 = 30;
    let mut drop_rate: f64 = 2.0;
    let mut url = "ws://127.0.0.1:3000/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(100);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--drop-rate" => {
                i += 1;
                drop_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(2.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Merge Arcade Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Drop rate: {}/s per client", drop_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);
        handles.push(tokio::spawn(run_client(
            client_id, url, drop_rate, duration, metrics,
        )));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            let m = &metrics_clone;
            println!(
                "[{:3}s] connected={}, msgs={}, board_states={}, merges={}, game_overs={}, drops={}, errors={}",
                elapsed,
                m.connected.load(Ordering::Relaxed),
                m.messages_received.load(Ordering::Relaxed),
                m.board_states_received.load(Ordering::Relaxed),
                m.merges_received.load(Ordering::Relaxed),
                m.game_overs_received.load(Ordering::Relaxed),
                m.drops_sent.load(Ordering::Relaxed),
                m.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let board_states = metrics.board_states_received.load(Ordering::Relaxed);
    let bodies = metrics.total_bodies_seen.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages received: {}", msgs);
    println!("Total board_state messages: {}", board_states);
    println!(
        "Total merges: {}",
        metrics.merges_received.load(Ordering::Relaxed)
    );
    println!(
        "Total game overs: {}",
        metrics.game_overs_received.load(Ordering::Relaxed)
    );
    println!(
        "Drops sent / rejected: {} / {}",
        metrics.drops_sent.load(Ordering::Relaxed),
        metrics.drops_rejected.load(Ordering::Relaxed)
    );
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));
    println!(
        "Average bodies per board: {}",
        if board_states > 0 { bodies / board_states } else { 0 }
    );
    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    let expected = duration_secs as f64 * EXPECTED_BROADCAST_HZ;
    let per_client = board_states as f64 / num_clients.max(1) as f64;
    println!();
    println!("Messages/sec (total): {:.0}", msgs as f64 / duration_secs.max(1) as f64);
    println!("Board states per client: {:.1}", per_client);
    println!("Expected board states per client: {:.1}", expected);
    println!("Delivery rate: {:.1}%", per_client / expected.max(1.0) * 100.0);
}
