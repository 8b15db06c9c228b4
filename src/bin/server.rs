use actix_web::{web, App, HttpResponse, HttpServer};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use servo_infra::client::{CommandRequest, CommandResponse};
use servo_infra::config::LinkKind;
use servo_infra::link::{RecordingLink, SerialLink, UdpLink};
use servo_infra::{AnyLink, DetectionResult, Error, MotionConfig, MotionController, ServerConfig};

// a vision process posts one detection per frame; each post is one control tick

struct AppState {
    controller: Mutex<MotionController<AnyLink>>,
}

#[derive(Deserialize)]
struct PaceRequest {
    pace: i32,
}

#[derive(Deserialize)]
struct SearchRequest {
    enabled: bool,
}

async fn post_detection(data: web::Json<DetectionResult>, app_data: web::Data<AppState>) -> HttpResponse {
    let mut controller = app_data.controller.lock().await;
    let report = controller.tick(data.into_inner()).await;
    HttpResponse::Ok().json(report)
}

async fn post_command(data: web::Json<CommandRequest>, app_data: web::Data<AppState>) -> HttpResponse {
    let mut controller = app_data.controller.lock().await;
    match controller.submit(&data.command).await {
        Ok(cmd) => HttpResponse::Ok().json(CommandResponse {
            accepted: true,
            command: Some(cmd.to_string()),
            error: None,
        }),
        Err(e) => {
            tracing::warn!(command = %data.command, error = %e, "command refused");
            HttpResponse::BadRequest().json(CommandResponse {
                accepted: false,
                command: None,
                error: Some(e.to_string()),
            })
        }
    }
}

async fn set_pace(data: web::Json<PaceRequest>, app_data: web::Data<AppState>) -> HttpResponse {
    let mut controller = app_data.controller.lock().await;
    match controller.set_pace(data.pace) {
        Ok(()) => HttpResponse::Ok().json(controller.snapshot()),
        Err(e) => HttpResponse::BadRequest().body(e.to_string()),
    }
}

async fn set_search(data: web::Json<SearchRequest>, app_data: web::Data<AppState>) -> HttpResponse {
    let mut controller = app_data.controller.lock().await;
    controller.set_search_enabled(data.enabled).await;
    HttpResponse::Ok().json(controller.snapshot())
}

async fn get_status(app_data: web::Data<AppState>) -> HttpResponse {
    let controller = app_data.controller.lock().await;
    HttpResponse::Ok().json(controller.snapshot())
}

async fn open_link(config: &ServerConfig) -> servo_infra::Result<AnyLink> {
    let link = match config.link {
        LinkKind::Udp => AnyLink::Udp(
            UdpLink::connect(&config.local_addr, &config.vehicle_addr, config.link_timeout).await?,
        ),
        LinkKind::Serial => {
            let port = config
                .serial_port
                .as_deref()
                .ok_or_else(|| Error::config("SERIAL_PORT is not set"))?;
            AnyLink::Serial(SerialLink::open(port, config.baud_rate, config.link_timeout)?)
        }
        LinkKind::DryRun => AnyLink::DryRun(RecordingLink::new()),
    };
    Ok(link)
}

fn to_io(e: Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "servo_infra=debug,server=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_config = ServerConfig::from_env().map_err(to_io)?;
    let motion_config = MotionConfig::from_env().map_err(to_io)?;
    tracing::info!(
        host = %server_config.host,
        port = server_config.port,
        link = ?server_config.link,
        pace = motion_config.pace,
        debounce_ms = motion_config.debounce_window.as_millis() as u64,
        "starting control server"
    );

    let link = open_link(&server_config).await.map_err(to_io)?;
    let mut controller = MotionController::new(Arc::new(link), motion_config);
    controller.start();

    let shared_state = web::Data::new(AppState {
        controller: Mutex::new(controller),
    });
    let server_state = shared_state.clone();

    // one worker: the control tick has a single writer
    HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .route("/detection", web::post().to(post_detection))
            .route("/command", web::post().to(post_command))
            .route("/pace", web::put().to(set_pace))
            .route("/search", web::put().to(set_search))
            .route("/status", web::get().to(get_status))
    })
    .workers(1)
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await?;

    shared_state.controller.lock().await.shutdown().await;
    Ok(())
}
