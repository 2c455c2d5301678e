use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, ErrorKind, Result};
use crate::interface::InterfaceModel;
use crate::message::{Message, Serial, SerialAllocator};
use crate::object_path::{ObjectPath, ObjectPathBuf};
use crate::proto::Flags;
use crate::router::MatchRule;
use crate::sasl;
use crate::transport::{self, Address, Transport};

use super::actor::{Actor, Command};

/// The default per-call timeout, per the D-Bus core specification's guidance
/// that implementations should not wait forever for a reply.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// Options accepted by [`Connection::connect_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    address: Option<String>,
    negotiate_unix_fd: bool,
}

impl ConnectOptions {
    /// Start from the default options: discover the address from the
    /// environment, fd passing disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to an explicit address instead of discovering one.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attempt `NEGOTIATE_UNIX_FD` during authentication.
    pub fn negotiate_unix_fd(mut self, negotiate: bool) -> Self {
        self.negotiate_unix_fd = negotiate;
        self
    }
}

/// A handle to an authenticated D-Bus connection.
///
/// Cheaply [`Clone`]: every clone shares the same background task, serial
/// counter, call table, match table, and export table.
#[derive(Clone)]
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    serials: Arc<Mutex<SerialAllocator>>,
    unique_name: Arc<Mutex<Option<String>>>,
    pub(crate) owned_names: Arc<Mutex<HashSet<String>>>,
}

impl Connection {
    /// Connect to the session bus using the default configuration.
    pub async fn session_bus() -> Result<Self> {
        Self::connect_address(transport::session_address()?, false).await
    }

    /// Connect to the system bus using the default configuration.
    pub async fn system_bus() -> Result<Self> {
        Self::connect_address(transport::system_address()?, false).await
    }

    /// Connect using an explicit address string.
    pub async fn connect(address: &str) -> Result<Self> {
        Self::connect_with(ConnectOptions::new().address(address)).await
    }

    /// Connect using the given [`ConnectOptions`], falling back to the
    /// session bus address discovery rules when no address is given.
    pub async fn connect_with(options: ConnectOptions) -> Result<Self> {
        let address = match &options.address {
            Some(address) => transport::parse_address(address)?,
            None => transport::session_address()?,
        };

        Self::connect_address(address, options.negotiate_unix_fd).await
    }

    async fn connect_address(address: Address, negotiate_unix_fd: bool) -> Result<Self> {
        let mut transport = Transport::connect(&address).await?;
        let authenticated = sasl::authenticate(&mut transport, negotiate_unix_fd).await?;
        transport.unix_fd_passing = authenticated.unix_fd_passing;

        let (commands, receiver) = mpsc::unbounded_channel();
        let serials = Arc::new(Mutex::new(SerialAllocator::new()));
        let actor = Actor::new(transport, receiver, serials.clone());
        tokio::spawn(actor.run());

        let connection = Connection {
            commands,
            serials,
            unique_name: Arc::new(Mutex::new(None)),
            owned_names: Arc::new(Mutex::new(HashSet::new())),
        };

        let name = connection.hello().await?;
        *connection.unique_name.lock().unwrap() = Some(name);
        Ok(connection)
    }

    /// The unique name (`:X.Y`) assigned to this connection by `Hello`.
    pub fn unique_name(&self) -> Option<String> {
        self.unique_name.lock().unwrap().clone()
    }

    /// The well-known names this connection currently owns, tracked locally
    /// from successful `RequestName`/`ReleaseName` calls.
    pub fn owned_names(&self) -> Vec<String> {
        self.owned_names.lock().unwrap().iter().cloned().collect()
    }

    fn next_serial(&self) -> Serial {
        self.serials.lock().unwrap().next()
    }

    /// Send `message` and await its reply.
    ///
    /// Cancellation-safe: dropping the returned future before it resolves
    /// cancels the pending call, and any reply that arrives afterwards is
    /// discarded silently.
    pub async fn call(&self, mut message: Message) -> Result<Message> {
        message.serial = self.next_serial();
        let serial = message.serial;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Send {
                message,
                reply: Some(reply_tx),
            })
            .map_err(|_| Error::new(ErrorKind::Disconnected))?;

        let mut guard = CancelOnDrop {
            commands: self.commands.clone(),
            serial,
            armed: true,
        };

        let result = tokio::time::timeout(DEFAULT_TIMEOUT, reply_rx).await;
        guard.armed = false;

        match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(Error::new(ErrorKind::Disconnected)),
            Err(_elapsed) => {
                let _ = self.commands.send(Command::Cancel(serial.get()));
                Err(Error::new(ErrorKind::Timeout))
            }
        }
    }

    /// Send `message` without waiting for a reply.
    pub fn send(&self, mut message: Message) -> Result<()> {
        message.serial = self.next_serial();
        message.flags |= Flags::NO_REPLY_EXPECTED;
        self.commands
            .send(Command::Send {
                message,
                reply: None,
            })
            .map_err(|_| Error::new(ErrorKind::Disconnected))
    }

    /// Subscribe to messages matching `rule`, returning a channel of every
    /// message delivered under that subscription.
    pub async fn add_match(&self, rule: MatchRule) -> Result<mpsc::UnboundedReceiver<Message>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        self.commands
            .send(Command::AddMatch {
                rule,
                sender,
                ack: ack_tx,
            })
            .map_err(|_| Error::new(ErrorKind::Disconnected))?;

        ack_rx.await.map_err(|_| Error::new(ErrorKind::Disconnected))??;
        Ok(receiver)
    }

    /// Remove one reference to a previously added match rule.
    pub fn remove_match(&self, rule: MatchRule) -> Result<()> {
        self.commands
            .send(Command::RemoveMatch { rule })
            .map_err(|_| Error::new(ErrorKind::Disconnected))
    }

    /// Export `interface` on `path`, replacing any interface of the same
    /// name already exported there.
    pub fn export(&self, path: ObjectPathBuf, interface: InterfaceModel) -> Result<()> {
        self.commands
            .send(Command::Export { path, interface })
            .map_err(|_| Error::new(ErrorKind::Disconnected))
    }

    /// Unexport `interface_name` at `path`, or every interface at `path`
    /// when `interface_name` is `None`.
    pub fn unexport(&self, path: &ObjectPath, interface_name: Option<&str>) -> Result<()> {
        self.commands
            .send(Command::Unexport {
                path: path.to_owned(),
                interface_name: interface_name.map(str::to_owned),
            })
            .map_err(|_| Error::new(ErrorKind::Disconnected))
    }

    /// Construct a client-side proxy for a remote object by fetching and
    /// parsing its introspection XML.
    pub async fn get_proxy_object(
        &self,
        destination: impl Into<String>,
        path: ObjectPathBuf,
    ) -> Result<crate::proxy::ProxyObject> {
        crate::proxy::ProxyFactory::new(self.clone())
            .get_proxy_object(destination, path)
            .await
    }

    /// Close the connection. Outstanding calls resolve with `Disconnected`,
    /// and the locally-tracked owned-name set is cleared.
    pub fn disconnect(&self) {
        self.owned_names.lock().unwrap().clear();
        let _ = self.commands.send(Command::Disconnect);
    }
}

struct CancelOnDrop {
    commands: mpsc::UnboundedSender<Command>,
    serial: Serial,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.commands.send(Command::Cancel(self.serial.get()));
        }
    }
}
