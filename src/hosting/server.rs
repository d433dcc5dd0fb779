use super::gate::DevGate;
use super::gate::Gate;
use crate::gameplay::Mode;
use crate::gameplay::TableError;
use crate::gameroom::ClientMessage;
use crate::gameroom::Command;
use crate::gameroom::Floor;
use crate::gameroom::Identity;
use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::middleware::Logger;
use actix_web::web;
use crate::tournament::Controller;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

pub struct Server;

#[derive(Debug, serde::Deserialize)]
struct JoinQuery {
    token: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenQuery {
    mode: Option<String>,
}

impl Server {
    pub async fn run(
        bind: &str,
        floor: Arc<Floor>,
        controller: Arc<Controller>,
    ) -> Result<(), std::io::Error> {
        let gate = web::Data::new(Arc::new(DevGate) as Arc<dyn Gate>);
        let floor = web::Data::new(floor);
        let controller = web::Data::new(controller);
        log::info!("starting hosting server on {}", bind);
        HttpServer::new(move || {
            App::new()
                .wrap(Logger::new("%r %s %Ts"))
                .wrap(
                    Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header(),
                )
                .app_data(floor.clone())
                .app_data(controller.clone())
                .app_data(gate.clone())
                .route("/health", web::get().to(health))
                .route("/open", web::post().to(open))
                .route("/join/{channel}", web::get().to(join))
        })
        .workers(4)
        .bind(bind)?
        .run()
        .await
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Creates an ephemeral lobby channel and hands back its code.
async fn open(floor: web::Data<Arc<Floor>>, query: web::Query<OpenQuery>) -> impl Responder {
    let mode = match query.mode.as_deref() {
        Some(game) => match Mode::try_from(game) {
            Ok(mode) => mode,
            Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
        },
        None => Mode::Poker,
    };
    match floor.open_lobby(mode).await {
        Ok(channel) => HttpResponse::Ok().json(serde_json::json!({ "channel": channel })),
        Err(e) => HttpResponse::BadRequest().body(e.to_string()),
    }
}

/// Websocket ingress: one socket is both a subscription to the
/// channel's event stream and a command pipe for the authorized
/// identity. The bridge drops the moment either side goes away.
async fn join(
    req: HttpRequest,
    body: web::Payload,
    path: web::Path<String>,
    query: web::Query<JoinQuery>,
    floor: web::Data<Arc<Floor>>,
    controller: web::Data<Arc<Controller>>,
    gate: web::Data<Arc<dyn Gate>>,
) -> actix_web::Result<HttpResponse> {
    let channel = path.into_inner();
    let identity = gate
        .authorize(query.token.as_deref())
        .await
        .map_err(actix_web::error::ErrorUnauthorized)?;
    let mode = match query.mode.as_deref() {
        Some(game) => Mode::try_from(game).map_err(actix_web::error::ErrorBadRequest)?,
        None => Mode::Blackjack,
    };
    let (tx, mut rx) = unbounded_channel();
    let login = (!identity.login.is_empty()).then(|| identity.login.clone());
    let sub = floor
        .subscribe(&channel, mode, login, tx)
        .await
        .map_err(actix_web::error::ErrorBadRequest)?;
    let (response, mut session, mut stream) = actix_ws::handle(&req, body)?;
    log::debug!("[bridge {}] {} connected as #{}", channel, identity.login, sub);
    let floor = floor.get_ref().clone();
    let controller = controller.get_ref().clone();
    actix_web::rt::spawn(async move {
        use futures::StreamExt;
        'sesh: loop {
            tokio::select! {
                biased;
                event = rx.recv() => match event {
                    Some(outbound) => if session.text(outbound.to_json()).await.is_err() { break 'sesh },
                    None => break 'sesh,
                },
                msg = stream.next() => match msg {
                    Some(Ok(actix_ws::Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client) => route(&floor, &controller, &channel, &identity, sub, client).await,
                            Err(_) => Err(TableError::InvalidPayload("malformed message")),
                        };
                        let frame = match reply {
                            Ok(Some(value)) => Some(value.to_string()),
                            Ok(None) => None,
                            Err(e) => Some(
                                serde_json::json!({ "type": "error", "reason": e.reason() }).to_string(),
                            ),
                        };
                        if let Some(frame) = frame {
                            if session.text(frame).await.is_err() {
                                break 'sesh;
                            }
                        }
                    }
                    Some(Ok(actix_ws::Message::Close(_))) => break 'sesh,
                    Some(Err(_)) => break 'sesh,
                    None => break 'sesh,
                    _ => continue 'sesh,
                },
            }
        }
        floor.unsubscribe(&channel, sub).await;
        log::debug!("[bridge {}] #{} disconnected", channel, sub);
    });
    Ok(response)
}

/// Channel-scoped messages go through the router; tournament
/// operations hit the controller directly and reply inline.
async fn route(
    floor: &Floor,
    controller: &Arc<Controller>,
    channel: &str,
    identity: &Identity,
    sub: u64,
    msg: ClientMessage,
) -> Result<Option<serde_json::Value>, TableError> {
    match msg {
        ClientMessage::CreateTournament {
            game,
            starting,
            cutoffs,
            levels,
            table_size,
        } => {
            if !identity.is_admin() {
                return Err(TableError::Unauthorized);
            }
            let mode = Mode::try_from(game.as_str())?;
            let id = controller
                .create(mode, starting, cutoffs, levels, table_size)
                .await?;
            Ok(Some(serde_json::json!({ "type": "tournament", "tournament": id })))
        }
        ClientMessage::AddTournamentPlayer { tournament, login } => {
            if !identity.is_admin() {
                return Err(TableError::Unauthorized);
            }
            let seat = controller.add_player(tournament, &login).await?;
            Ok(Some(serde_json::json!({ "type": "tournament", "tournament": tournament, "seat": seat })))
        }
        ClientMessage::GenerateBracket { tournament } => {
            if !identity.is_admin() {
                return Err(TableError::Unauthorized);
            }
            let tables = controller.generate_bracket(tournament).await?;
            Ok(Some(serde_json::json!({ "type": "bracket", "tournament": tournament, "tables": tables })))
        }
        ClientMessage::StartTournament { tournament } => {
            if !identity.is_admin() {
                return Err(TableError::Unauthorized);
            }
            controller.start(tournament).await?;
            Ok(Some(serde_json::json!({ "type": "tournament", "tournament": tournament, "state": "active" })))
        }
        ClientMessage::AdvanceRound { tournament } => {
            if !identity.is_admin() {
                return Err(TableError::Unauthorized);
            }
            let tables = controller.advance_round(tournament).await?;
            Ok(Some(serde_json::json!({ "type": "bracket", "tournament": tournament, "tables": tables })))
        }
        ClientMessage::BindTournamentTable { tournament, round, table } => {
            if !identity.is_admin() {
                return Err(TableError::Unauthorized);
            }
            let bound = controller.bind_table(tournament, round, table).await?;
            Ok(Some(serde_json::json!({ "type": "tournament", "tournament": tournament, "table": bound })))
        }
        other => match other.into_command() {
            Some(kind) => {
                floor
                    .dispatch(Command {
                        channel: channel.to_string(),
                        actor: identity.clone(),
                        kind,
                        origin: Some(sub),
                    })
                    .await?;
                Ok(None)
            }
            None => Err(TableError::InvalidPayload("unroutable message")),
        },
    }
}
