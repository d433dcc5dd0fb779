use super::channel::ChannelState;
use super::channel::TableConfig;
use super::channel::normalize;
use super::command::Command;
use super::event::Outbound;
use super::room::Input;
use super::room::Room;
use crate::gameplay::Mode;
use crate::gameplay::Role;
use crate::gameplay::Seat;
use crate::gameplay::Services;
use crate::gameplay::TableError;
use crate::hosting::limits::Limiter;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Handle to a live channel task.
pub struct ChannelHandle {
    pub tx: UnboundedSender<Input>,
    pub mode: Mode,
}

/// The arena of channels: a read-mostly map from identifier to room
/// handle. Per-channel serialization lives inside each room's queue;
/// the floor only looks identifiers up, gates ingress, and never
/// holds a channel lock across a mutation.
pub struct Floor {
    services: Services,
    limiter: Limiter,
    channels: RwLock<HashMap<String, ChannelHandle>>,
    bots: Mutex<HashSet<String>>,
    next_sub: AtomicU64,
}

impl Floor {
    pub fn new(services: Services) -> Arc<Self> {
        Arc::new(Self {
            services,
            limiter: Limiter::new(),
            channels: RwLock::new(HashMap::new()),
            bots: Mutex::new(HashSet::new()),
            next_sub: AtomicU64::new(1),
        })
    }
    pub fn services(&self) -> &Services {
        &self.services
    }
    /// Channels the house AI keeps seats filled on. Survives restarts
    /// via persistence; membership checked at channel creation.
    pub fn add_bot_channel(&self, name: &str) {
        self.bots.lock().expect("bots lock").insert(name.to_string());
    }
    pub fn bot_channels(&self) -> Vec<String> {
        let mut list = self
            .bots
            .lock()
            .expect("bots lock")
            .iter()
            .cloned()
            .collect::<Vec<_>>();
        list.sort();
        list
    }

    /// Looks the channel up, creating it if absent (first subscription
    /// or tournament binding creates a channel).
    pub async fn ensure(
        &self,
        name: &str,
        mode: Mode,
        config: TableConfig,
    ) -> Result<UnboundedSender<Input>, TableError> {
        let name = normalize(name).ok_or(TableError::InvalidPayload("bad channel identifier"))?;
        {
            let channels = self.channels.read().await;
            if let Some(handle) = channels.get(&name) {
                if !handle.tx.is_closed() {
                    return Ok(handle.tx.clone());
                }
            }
        }
        let mut channels = self.channels.write().await;
        // lost the race or stale: re-check under the write lock
        if let Some(handle) = channels.get(&name) {
            if !handle.tx.is_closed() {
                return Ok(handle.tx.clone());
            }
        }
        let mut state = ChannelState::new(&name, mode, config);
        if self.bots.lock().expect("bots lock").contains(&name) {
            for i in 1..=crate::HOUSE_BOTS {
                let login = format!("{}-bot-{}", name, i);
                self.services.ledger.ensure(&login);
                let mut seat = Seat::new(&login, Role::Ai);
                seat.auto = true;
                state.seats.push(seat);
            }
        }
        let (room, tx) = Room::new(state, self.services.clone());
        tokio::spawn(room.run());
        log::info!("[floor] created channel {} ({})", name, mode);
        channels.insert(
            name,
            ChannelHandle {
                tx: tx.clone(),
                mode,
            },
        );
        Ok(tx)
    }

    /// Subscribes a listener, creating the channel on first interest.
    pub async fn subscribe(
        &self,
        name: &str,
        mode: Mode,
        login: Option<String>,
        tx: UnboundedSender<Outbound>,
    ) -> Result<u64, TableError> {
        let room = self.ensure(name, mode, TableConfig::default()).await?;
        let id = self.next_sub.fetch_add(1, Ordering::Relaxed);
        room.send(Input::Subscribe { id, login, tx })
            .map_err(|_| TableError::InvalidPayload("channel closed"))?;
        Ok(id)
    }

    pub async fn unsubscribe(&self, name: &str, id: u64) {
        let Some(name) = normalize(name) else { return };
        let channels = self.channels.read().await;
        if let Some(handle) = channels.get(&name) {
            let _ = handle.tx.send(Input::Unsubscribe { id });
        }
    }

    /// Ingress gate: identity required for every mutation, admin role
    /// (or owning the channel) for control commands, then the sliding
    /// rate limit per (actor, kind). Passing commands are serialized
    /// onto the channel's queue.
    pub async fn dispatch(&self, cmd: Command) -> Result<(), TableError> {
        let channel = normalize(&cmd.channel)
            .ok_or(TableError::InvalidPayload("bad channel identifier"))?;
        if cmd.actor.login.is_empty() {
            return Err(TableError::Unauthorized);
        }
        if cmd.kind.requires_admin() && !cmd.actor.is_admin() && cmd.actor.login != channel {
            return Err(TableError::Unauthorized);
        }
        if !self.limiter.allow(&cmd.actor.login, cmd.kind.kind()) {
            return Err(TableError::InvalidAction("rate limited"));
        }
        let channels = self.channels.read().await;
        match channels.get(&channel) {
            Some(handle) => handle
                .tx
                .send(Input::Cmd(cmd))
                .map_err(|_| TableError::InvalidPayload("unknown channel")),
            None => Err(TableError::InvalidPayload("unknown channel")),
        }
    }

    /// Creates an ephemeral lobby channel with a generated code.
    pub async fn open_lobby(&self, mode: Mode) -> Result<String, TableError> {
        let code: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(crate::LOBBY_CODE)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        let name = format!("lobby-{}", code);
        self.ensure(&name, mode, TableConfig::default()).await?;
        Ok(name)
    }

    /// Graceful shutdown: every room broadcasts a final state, cancels
    /// its timers, and drains in-flight commands before stopping.
    pub async fn shutdown(&self) {
        let channels = self.channels.read().await;
        log::info!("[floor] shutting down {} channels", channels.len());
        for handle in channels.values() {
            let _ = handle.tx.send(Input::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::TableCmd;
    use crate::gameroom::command::CommandKind;
    use crate::gameroom::command::Identity;

    fn cmd(channel: &str, actor: Identity, kind: CommandKind) -> Command {
        Command {
            channel: channel.to_string(),
            actor,
            kind,
            origin: None,
        }
    }

    #[tokio::test]
    async fn rejects_anonymous_mutations() {
        let floor = Floor::new(Services::new());
        let err = floor
            .dispatch(cmd(
                "main",
                Identity::new("", Role::Player),
                CommandKind::Table(TableCmd::Hit),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, TableError::Unauthorized);
    }

    #[tokio::test]
    async fn admin_kinds_gated() {
        let floor = Floor::new(Services::new());
        floor
            .ensure("main", Mode::Blackjack, TableConfig::default())
            .await
            .unwrap();
        let err = floor
            .dispatch(cmd(
                "main",
                Identity::new("mallory", Role::Player),
                CommandKind::Admin(super::super::command::Directive::OpenBetting),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, TableError::Unauthorized);
        // the channel's own streamer passes without the admin role
        floor
            .dispatch(cmd(
                "main",
                Identity::new("main", Role::Player),
                CommandKind::Admin(super::super::command::Directive::OpenBetting),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_channel_rejected() {
        let floor = Floor::new(Services::new());
        let err = floor
            .dispatch(cmd(
                "nowhere",
                Identity::new("alice", Role::Player),
                CommandKind::Table(TableCmd::Hit),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, TableError::InvalidPayload("unknown channel"));
    }

    #[tokio::test]
    async fn lobby_codes_validate() {
        let floor = Floor::new(Services::new());
        let name = floor.open_lobby(Mode::Poker).await.unwrap();
        assert!(name.starts_with("lobby-"));
        assert_eq!(name.len(), "lobby-".len() + crate::LOBBY_CODE);
        assert!(super::normalize(&name).is_some());
    }

    #[tokio::test]
    async fn rate_limit_trips() {
        let floor = Floor::new(Services::new());
        floor
            .ensure("main", Mode::Blackjack, TableConfig::default())
            .await
            .unwrap();
        let mut limited = false;
        for _ in 0..crate::RATE_BURST + 1 {
            let result = floor
                .dispatch(cmd(
                    "main",
                    Identity::new("spammer", Role::Player),
                    CommandKind::Table(TableCmd::Hit),
                ))
                .await;
            if result == Err(TableError::InvalidAction("rate limited")) {
                limited = true;
            }
        }
        assert!(limited);
    }
}
