//! The task that owns the socket: reads frames, dispatches them, and
//! serialises writes requested by [`Connection`][super::Connection] handles.

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::interface::InterfaceModel;
use crate::message::{Message, Serial, SerialAllocator};
use crate::object_path::ObjectPathBuf;
use crate::proto::{Endianness, Flags, MessageType};
use crate::router::{self, MatchRule, ServiceRouter};
use crate::transport::Transport;

/// A request sent from a [`Connection`][super::Connection] handle to the
/// actor task that owns the socket.
pub(crate) enum Command {
    /// Send a message. `reply` is `Some` unless `NO_REPLY_EXPECTED` is set,
    /// in which case the call resolves as soon as the write succeeds.
    Send {
        message: Message,
        reply: Option<oneshot::Sender<Result<Message>>>,
    },
    /// Subscribe to messages matching `rule`.
    AddMatch {
        rule: MatchRule,
        sender: mpsc::UnboundedSender<Message>,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Unsubscribe one reference to `rule`.
    RemoveMatch { rule: MatchRule },
    /// Export an interface on a path.
    Export {
        path: ObjectPathBuf,
        interface: InterfaceModel,
    },
    /// Unexport an interface, or every interface at `path` if `None`.
    Unexport {
        path: ObjectPathBuf,
        interface_name: Option<String>,
    },
    /// Abandon a pending call. A reply that arrives afterwards is discarded.
    Cancel(u32),
    /// Shut down the actor task, failing every outstanding call.
    Disconnect,
}

struct Subscriber {
    rule: MatchRule,
    count: usize,
    sender: mpsc::UnboundedSender<Message>,
}

/// Owns the [`Transport`] and every mutable table; runs on its own task for
/// the lifetime of the connection.
pub(crate) struct Actor {
    transport: Transport,
    endianness: Endianness,
    serials: Arc<Mutex<SerialAllocator>>,
    calls: HashMap<u32, oneshot::Sender<Result<Message>>>,
    subscribers: Vec<Subscriber>,
    router: ServiceRouter,
    read_buf: Vec<u8>,
    fd_queue: Vec<RawFd>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Actor {
    pub(crate) fn new(
        transport: Transport,
        commands: mpsc::UnboundedReceiver<Command>,
        serials: Arc<Mutex<SerialAllocator>>,
    ) -> Self {
        Self {
            transport,
            endianness: Endianness::NATIVE,
            serials,
            calls: HashMap::new(),
            subscribers: Vec::new(),
            router: ServiceRouter::new(),
            read_buf: Vec::new(),
            fd_queue: Vec::new(),
            commands,
        }
    }

    /// Run until the socket closes or every `Connection` handle is dropped.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Disconnect) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                incoming = self.read_message() => {
                    match incoming {
                        Ok(message) => self.dispatch_incoming(message).await,
                        Err(error) => {
                            trace!(%error, "connection closed");
                            break;
                        }
                    }
                }
            }
        }

        self.fail_outstanding();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { message, reply } => {
                if let Err(error) = self.send(message, reply).await {
                    warn!(%error, "failed to send message");
                }
            }
            Command::AddMatch { rule, sender, ack } => {
                let result = self.add_match(rule, sender).await;
                let _ = ack.send(result);
            }
            Command::RemoveMatch { rule } => {
                self.remove_match(rule).await;
            }
            Command::Export { path, interface } => {
                let signal = router::interfaces_added_message(&path, &interface).await;
                self.router.export(path, interface);

                if let Err(error) = self.send_internal(signal).await {
                    warn!(%error, "failed to emit InterfacesAdded signal");
                }
            }
            Command::Unexport { path, interface_name } => {
                let removed = self.router.unexport(&path, interface_name.as_deref());

                if !removed.is_empty() {
                    let signal = router::interfaces_removed_message(&path, removed);

                    if let Err(error) = self.send_internal(signal).await {
                        warn!(%error, "failed to emit InterfacesRemoved signal");
                    }
                }
            }
            Command::Cancel(serial) => {
                self.calls.remove(&serial);
            }
            Command::Disconnect => unreachable!("handled in run()"),
        }
    }

    fn next_serial(&self) -> Serial {
        self.serials.lock().unwrap().next()
    }

    /// Send a message whose serial was already stamped by the caller (every
    /// [`Command::Send`] message, since the [`Connection`][super::Connection]
    /// handle stamps from the same shared allocator before enqueueing it).
    async fn send(&mut self, message: Message, reply: Option<oneshot::Sender<Result<Message>>>) -> Result<()> {
        let serial = message.serial;
        let no_reply = message.flags.contains(Flags::NO_REPLY_EXPECTED);
        let (buf, fds) = message.encode(serial, self.endianness)?;
        self.transport.send_message(&buf, &fds).await?;

        if let Some(reply) = reply {
            if no_reply {
                let _ = reply.send(Ok(message));
            } else {
                self.calls.insert(serial.get(), reply);
            }
        }

        Ok(())
    }

    /// Send a message generated by the actor itself (a method reply, a
    /// signal, or an `AddMatch`/`RemoveMatch` call), stamping a fresh serial
    /// from the shared allocator first.
    async fn send_internal(&mut self, mut message: Message) -> Result<()> {
        message.serial = self.next_serial();
        self.send(message, None).await
    }

    async fn add_match(&mut self, rule: MatchRule, sender: mpsc::UnboundedSender<Message>) -> Result<()> {
        if let Some(existing) = self.subscribers.iter_mut().find(|s| s.rule == rule) {
            existing.count += 1;
            return Ok(());
        }

        self.send_bus_match(&rule, "AddMatch").await?;
        self.subscribers.push(Subscriber { rule, count: 1, sender });
        Ok(())
    }

    async fn remove_match(&mut self, rule: MatchRule) {
        let Some(index) = self.subscribers.iter().position(|s| s.rule == rule) else {
            return;
        };

        self.subscribers[index].count -= 1;

        if self.subscribers[index].count == 0 {
            let subscriber = self.subscribers.remove(index);
            let _ = self.send_bus_match(&subscriber.rule, "RemoveMatch").await;
        }
    }

    async fn send_bus_match(&mut self, rule: &MatchRule, member: &str) -> Result<()> {
        let message = Message::method_call(crate::object_path::ObjectPathBuf::new("/org/freedesktop/DBus").unwrap(), member)
            .with_interface("org.freedesktop.DBus")
            .with_destination("org.freedesktop.DBus")
            .with_body(vec![crate::value::Value::from(format_match_rule(rule))]);

        self.send_internal(message).await
    }

    async fn dispatch_incoming(&mut self, message: Message) {
        match message.message_type {
            MessageType::METHOD_RETURN | MessageType::ERROR => {
                let Some(reply_serial) = message.reply_serial else {
                    return;
                };

                if let Some(sender) = self.calls.remove(&reply_serial.get()) {
                    let result = if message.message_type == MessageType::ERROR {
                        let name = message.error_name.clone().unwrap_or_default();
                        let body = match message.body.first() {
                            Some(crate::value::Value::String(s)) => s.clone(),
                            _ => String::new(),
                        };
                        Err(Error::new(ErrorKind::DBusError { name, body }))
                    } else {
                        Ok(message)
                    };

                    let _ = sender.send(result);
                }
            }
            MessageType::METHOD_CALL => {
                let dispatched = self.router.dispatch(&message).await;

                if !message.flags.contains(Flags::NO_REPLY_EXPECTED) {
                    if let Err(error) = self.send_internal(dispatched.reply).await {
                        warn!(%error, "failed to send method reply");
                    }
                }

                for signal in dispatched.signals {
                    if let Err(error) = self.send_internal(signal).await {
                        warn!(%error, "failed to emit signal");
                    }
                }
            }
            MessageType::SIGNAL => {
                for subscriber in &self.subscribers {
                    if subscriber.rule.matches(&message) {
                        let _ = subscriber.sender.send(message.clone());
                    }
                }
            }
        }
    }

    fn fail_outstanding(&mut self) {
        for (_, sender) in self.calls.drain() {
            let _ = sender.send(Err(Error::new(ErrorKind::Disconnected)));
        }
    }

    async fn read_message(&mut self) -> Result<Message> {
        loop {
            if self.read_buf.len() >= 16 {
                let required = Message::required_len(&self.read_buf[..16])?;

                if self.read_buf.len() >= required {
                    let frame: Vec<u8> = self.read_buf.drain(..required).collect();
                    let fd_count = Message::peek_unix_fd_count(&frame)? as usize;
                    let fds: Vec<RawFd> = self.fd_queue.drain(..fd_count.min(self.fd_queue.len())).collect();
                    return Message::decode(&frame, &fds);
                }
            }

            let mut scratch = [0u8; 4096];
            let n = self.transport.recv_message(&mut scratch, &mut self.fd_queue).await?;

            if n == 0 {
                return Err(Error::new(ErrorKind::Disconnected));
            }

            self.read_buf.extend_from_slice(&scratch[..n]);
        }
    }
}

fn format_match_rule(rule: &MatchRule) -> String {
    let mut parts = Vec::new();

    if let Some(interface) = &rule.interface {
        parts.push(format!("interface='{interface}'"));
    }

    if let Some(member) = &rule.member {
        parts.push(format!("member='{member}'"));
    }

    if let Some(path) = &rule.path {
        parts.push(format!("path='{}'", path.as_str()));
    }

    if let Some(sender) = &rule.sender {
        parts.push(format!("sender='{sender}'"));
    }

    if rule.message_type.is_some() {
        parts.push("type='signal'".to_owned());
    }

    parts.join(",")
}
