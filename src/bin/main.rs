use std::env;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use servo_infra::client::{ControlClient, DEFAULT_SERVER_ADDR};
use servo_infra::DetectionResult;

// Feeds detections to the control server, one JSON object per line:
//   {"count":1,"box":{"x1":400,"y1":300,"x2":600,"y2":500},"label":"follow"}
// Lines starting with `!` are sent as operator commands (`!takeoff`).
//
// cargo run --bin main -- detections.jsonl
// vision_process | cargo run --bin main -- -

async fn feed<R: AsyncBufRead + Unpin>(reader: R, client: ControlClient, interval: Duration) -> servo_infra::Result<()> {
    let mut lines = reader.lines();
    let mut ticker = tokio::time::interval(interval);

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        ticker.tick().await;

        if let Some(command) = line.strip_prefix('!') {
            match client.submit_command(command.trim()).await {
                Ok(response) if response.accepted => {
                    tracing::info!(command = ?response.command, "command accepted")
                }
                Ok(response) => tracing::warn!(error = ?response.error, "command refused"),
                Err(e) => tracing::warn!(error = %e, "server unreachable"),
            }
            continue;
        }

        let detection: DetectionResult = match serde_json::from_str(line) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(line, error = %e, "skipping malformed detection");
                continue;
            }
        };
        match client.post_detection(&detection).await {
            Ok(report) => tracing::info!(
                tick = report.tick,
                label = %report.label,
                behavior = ?report.behavior,
                enqueued = ?report.enqueued.map(|c| c.to_string()),
                sent = ?report.sent.map(|c| c.to_string()),
                "tick"
            ),
            Err(e) => tracing::warn!(error = %e, "server unreachable"),
        }
    }

    match client.status().await {
        Ok(status) => tracing::info!(%status, "final controller state"),
        Err(e) => tracing::warn!(error = %e, "could not read final state"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> servo_infra::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "servo_infra=info,main=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let source = args.get(1).map(String::as_str).unwrap_or("-");
    let server = env::var("SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string());
    let interval_ms = env::var("FEED_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);

    let client = ControlClient::new(server);
    let interval = Duration::from_millis(interval_ms);

    if source == "-" {
        feed(BufReader::new(tokio::io::stdin()), client, interval).await
    } else {
        let file = tokio::fs::File::open(source).await?;
        feed(BufReader::new(file), client, interval).await
    }
}
