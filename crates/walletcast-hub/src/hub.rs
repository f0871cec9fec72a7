use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walletcast_core::config::HubConfig;
use walletcast_core::types::ClientId;
use walletcast_protocol::frames::SubscribeAck;

use crate::client::{Client, ClientSnapshot, Offer};
use crate::error::{HubError, Result};

/// Everything the Hub task can be asked to do.
#[derive(Debug)]
pub enum HubCommand {
    Register(Client),
    Unregister(ClientId),
    Subscribe {
        id: ClientId,
        accounts: Vec<String>,
        currency: Option<String>,
    },
    Unsubscribe {
        id: ClientId,
        accounts: Vec<String>,
    },
    Deliver {
        id: ClientId,
        payload: String,
    },
    /// Deliver to every client watching `account`.
    DeliverToAccount {
        account: String,
        payload: String,
    },
    Snapshot(oneshot::Sender<Vec<ClientSnapshot>>),
    Count(oneshot::Sender<usize>),
}

/// Registry actor. Construct with [`Hub::new`], then drive with [`Hub::run`].
pub struct Hub {
    clients: HashMap<ClientId, Client>,
    /// account -> clients watching it
    watchers: HashMap<String, HashSet<ClientId>>,
    commands: mpsc::Receiver<HubCommand>,
    max_strikes: u32,
}

impl Hub {
    pub fn new(config: &HubConfig) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let hub = Self {
            clients: HashMap::new(),
            watchers: HashMap::new(),
            commands: rx,
            max_strikes: config.max_overflow_strikes.max(1),
        };
        let handle = HubHandle {
            tx,
            client_queue_capacity: config.client_queue_capacity.max(1),
        };
        (hub, handle)
    }

    /// Main loop. Runs until `cancel` fires or every handle is dropped.
    ///
    /// On exit all clients are dropped, which closes every outbound queue.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("hub started");
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => break,
                },
                _ = cancel.cancelled() => {
                    info!("hub shutting down");
                    break;
                }
            }
        }
        let remaining = self.clients.len();
        self.clients.clear();
        self.watchers.clear();
        info!(clients = remaining, "hub stopped");
    }

    fn apply(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(client) => self.register(client),
            HubCommand::Unregister(id) => self.unregister(&id),
            HubCommand::Subscribe {
                id,
                accounts,
                currency,
            } => self.subscribe(id, accounts, currency),
            HubCommand::Unsubscribe { id, accounts } => self.unsubscribe(id, accounts),
            HubCommand::Deliver { id, payload } => self.deliver(id, payload),
            HubCommand::DeliverToAccount { account, payload } => {
                self.deliver_to_account(&account, payload)
            }
            HubCommand::Snapshot(reply) => {
                let snapshot = self.clients.values().map(Client::snapshot).collect();
                let _ = reply.send(snapshot);
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(self.clients.len());
            }
        }
    }

    fn register(&mut self, client: Client) {
        let id = client.id();
        if let Some(previous) = self.clients.insert(id, client) {
            warn!(client_id = %id, "client registered twice, replacing");
            self.forget_accounts(&previous);
        }
        debug!(client_id = %id, clients = self.clients.len(), "client registered");
    }

    /// Dropping the removed `Client` closes its outbound queue; that happens
    /// here and nowhere else.
    fn unregister(&mut self, id: &ClientId) {
        let Some(client) = self.clients.remove(id) else {
            return;
        };
        self.forget_accounts(&client);
        debug!(client_id = %id, clients = self.clients.len(), "client unregistered");
    }

    fn forget_accounts(&mut self, client: &Client) {
        for account in client.accounts() {
            if let Some(ids) = self.watchers.get_mut(account) {
                ids.remove(&client.id());
                if ids.is_empty() {
                    self.watchers.remove(account);
                }
            }
        }
    }

    fn subscribe(&mut self, id: ClientId, accounts: Vec<String>, currency: Option<String>) {
        let Some(client) = self.clients.get_mut(&id) else {
            debug!(client_id = %id, "subscribe for unknown client ignored");
            return;
        };
        if let Some(ref currency) = currency {
            client.set_currency(currency);
        }
        let outcome = client.watch(accounts);
        let watched = client.watched_count();
        let currency = client.currency().to_string();
        if outcome.over_cap > 0 {
            warn!(
                client_id = %id,
                ignored = outcome.over_cap,
                watched,
                "account subscription cap reached"
            );
        }
        for account in outcome.added {
            self.watchers.entry(account).or_default().insert(id);
        }

        match serde_json::to_string(&SubscribeAck::subscribed(currency, watched)) {
            Ok(ack) => self.deliver(id, ack),
            Err(e) => warn!(client_id = %id, error = %e, "failed to serialize subscribe ack"),
        }
    }

    fn unsubscribe(&mut self, id: ClientId, accounts: Vec<String>) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        for account in client.unwatch(accounts) {
            if let Some(ids) = self.watchers.get_mut(&account) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.watchers.remove(&account);
                }
            }
        }
    }

    fn deliver(&mut self, id: ClientId, payload: String) {
        let Some(client) = self.clients.get_mut(&id) else {
            debug!(client_id = %id, "delivery to unknown client discarded");
            return;
        };
        match client.offer(payload) {
            Offer::Queued => {}
            Offer::Dropped { strikes } if strikes >= self.max_strikes => {
                warn!(client_id = %id, strikes, "outbound queue stuck full, disconnecting client");
                self.unregister(&id);
            }
            Offer::Dropped { strikes } => {
                warn!(client_id = %id, strikes, "outbound queue full, payload dropped");
            }
            Offer::Closed => {
                debug!(client_id = %id, "outbound queue closed, unregistering client");
                self.unregister(&id);
            }
        }
    }

    fn deliver_to_account(&mut self, account: &str, payload: String) {
        let Some(ids) = self.watchers.get(account) else {
            return;
        };
        let targets: Vec<ClientId> = ids.iter().copied().collect();
        for id in targets {
            self.deliver(id, payload.clone());
        }
    }
}

/// Cloneable front door to the Hub. Every method is one queued command.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    client_queue_capacity: usize,
}

impl HubHandle {
    /// Create a client with a fresh outbound queue and register it.
    /// Returns the receiving end for the connection's writer.
    pub async fn connect(&self, id: ClientId) -> Result<mpsc::Receiver<String>> {
        let (client, rx) = Client::channel(id, self.client_queue_capacity);
        self.register(client).await?;
        Ok(rx)
    }

    pub async fn register(&self, client: Client) -> Result<()> {
        self.send(HubCommand::Register(client)).await
    }

    /// Removing an absent client is a no-op.
    pub async fn unregister(&self, id: ClientId) -> Result<()> {
        self.send(HubCommand::Unregister(id)).await
    }

    pub async fn subscribe(
        &self,
        id: ClientId,
        accounts: Vec<String>,
        currency: Option<String>,
    ) -> Result<()> {
        self.send(HubCommand::Subscribe {
            id,
            accounts,
            currency,
        })
        .await
    }

    pub async fn unsubscribe(&self, id: ClientId, accounts: Vec<String>) -> Result<()> {
        self.send(HubCommand::Unsubscribe { id, accounts }).await
    }

    /// Queue `payload` for one client. Waits only for room in the Hub's
    /// command queue, never for the client itself.
    pub async fn broadcast_to_client(&self, id: ClientId, payload: String) -> Result<()> {
        self.send(HubCommand::Deliver { id, payload }).await
    }

    /// Queue `payload` for every client watching `account`.
    pub async fn broadcast_to_account(&self, account: String, payload: String) -> Result<()> {
        self.send(HubCommand::DeliverToAccount { account, payload })
            .await
    }

    /// Point-in-time copy of every registered client.
    pub async fn snapshot(&self) -> Result<Vec<ClientSnapshot>> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn client_count(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Count(tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn send(&self, cmd: HubCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| HubError::Closed)
    }
}
