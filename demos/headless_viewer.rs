//! Headless viewer for a running bridge
//!
//! Run with: cargo run --example headless_viewer [URL]
//!
//! Examples:
//!   cargo run --example headless_viewer                       # ws://127.0.0.1:5006
//!   cargo run --example headless_viewer ws://192.168.1.9:5006
//!
//! Connects as a plain viewer, prints every status change, and counts the
//! media frames it receives. After the first status it sends one tap in
//! the middle of the screen, which exercises the touch routing path.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use carplay_bridge::server::{FRAME_AUDIO, FRAME_VIDEO};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:5006".to_string());

    println!("Connecting to {}", url);
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    let mut video_frames: u64 = 0;
    let mut audio_frames: u64 = 0;
    let mut media_bytes: u64 = 0;
    let mut tapped = false;

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message else { break };
                match message? {
                    Message::Text(text) => {
                        println!("status: {}", text);
                        if !tapped {
                            tapped = true;
                            sink.send(Message::Text(
                                r#"{"type":"click","data":{"type":14,"x":0.5,"y":0.5}}"#.into(),
                            ))
                            .await?;
                            sink.send(Message::Text(
                                r#"{"type":"click","data":{"type":16,"x":0.5,"y":0.5}}"#.into(),
                            ))
                            .await?;
                        }
                    }
                    Message::Binary(data) => {
                        match data.first() {
                            Some(&FRAME_VIDEO) => video_frames += 1,
                            Some(&FRAME_AUDIO) => audio_frames += 1,
                            _ => {}
                        }
                        media_bytes += data.len() as u64;
                        if (video_frames + audio_frames) % 100 == 0 {
                            println!(
                                "frames: video={} audio={} bytes={}",
                                video_frames, audio_frames, media_bytes
                            );
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nClosing...");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    println!(
        "Totals: video={} audio={} bytes={}",
        video_frames, audio_frames, media_bytes
    );
    Ok(())
}
