//! The service registry: a single dedicated task ("strand") owning the
//! name index, reached only through its [`Handle`]. Every mutation is
//! serialised through the task's channel, so there is never a lock to
//! take or a race between a lookup and a concurrent registration.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mdns_proto::protocol::types::Message;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

use crate::descriptor::{BuildError, ServiceDescriptor};

/// Number of times a registration's announcement is retransmitted, per
/// RFC 6762 section 8.3's recommendation to send an initial announcement
/// at least twice.
const ANNOUNCEMENT_COUNT: usize = 2;

/// Jitter window, in milliseconds, between retransmissions (RFC 6762
/// section 8.3: "a random delay of 100-250ms").
const ANNOUNCEMENT_JITTER_MS: std::ops::Range<u64> = 100..250;

struct Entry {
    descriptor: ServiceDescriptor,
    /// Shared so every name this descriptor answers for resolves to
    /// the *same* `Arc`, letting the responder loop dedup by pointer
    /// identity when one query names a descriptor more than once.
    message: Arc<Message>,
}

enum Command {
    Register {
        descriptor: ServiceDescriptor,
        reply: oneshot::Sender<Result<(), RegisterError>>,
    },
    Lookup {
        name: String,
        reply: oneshot::Sender<Option<Arc<Message>>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// A cheaply-cloneable reference to a running registry task.
#[derive(Clone)]
pub struct Handle {
    commands: mpsc::Sender<Command>,
}

/// Errors that can arise while registering a service.
#[derive(Debug)]
pub enum RegisterError {
    Build(BuildError),
    Send(std::io::Error),
    /// The registry task has already stopped.
    Stopped,
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RegisterError::Build(e) => write!(f, "could not build response message: {e}"),
            RegisterError::Send(e) => write!(f, "could not transmit announcement: {e}"),
            RegisterError::Stopped => write!(f, "registry has stopped"),
        }
    }
}

impl std::error::Error for RegisterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegisterError::Build(e) => Some(e),
            RegisterError::Send(e) => Some(e),
            RegisterError::Stopped => None,
        }
    }
}

impl Handle {
    /// Builds a service's response message, announces it over
    /// `socket` to `multicast_addr` [`ANNOUNCEMENT_COUNT`] times with
    /// jittered delays between sends, then installs it into the
    /// registry's index under every name the descriptor answers for.
    ///
    /// The announcement happens before the index update so that a
    /// lookup can never observe a name as registered before its
    /// announcement has gone out at least once.
    pub async fn register(&self, descriptor: ServiceDescriptor) -> Result<(), RegisterError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Register { descriptor, reply })
            .await
            .map_err(|_| RegisterError::Stopped)?;
        response.await.map_err(|_| RegisterError::Stopped)?
    }

    /// Looks up the pre-built response message for `name` (matched
    /// case-insensitively, as all mDNS names are). Returns `None` if
    /// no registered descriptor answers for that name.
    pub async fn lookup(&self, name: &str) -> Option<Arc<Message>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Lookup {
                name: name.to_ascii_lowercase(),
                reply,
            })
            .await
            .ok()?;
        response.await.ok()?
    }

    /// Sends a goodbye (TTL 0) for every registered descriptor and
    /// stops the registry task. Idempotent: calling this more than
    /// once, or after the task has already exited, is a no-op.
    pub async fn stop(&self) {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Stop { reply }).await.is_ok() {
            let _ = response.await;
        }
    }
}

/// Spawns the registry task bound to `socket`, announcing and
/// answering over `multicast_addr`. Returns a [`Handle`] to it.
pub fn spawn(socket: Arc<UdpSocket>, multicast_addr: SocketAddr) -> Handle {
    let (commands, mut receiver) = mpsc::channel(32);
    let handle = Handle {
        commands: commands.clone(),
    };

    tokio::spawn(async move {
        // Keyed by lowercase FQDN; several keys may point at the same
        // descriptor (instance/service/enumeration/host names all
        // resolve to one entry).
        let mut index: BTreeMap<String, Arc<Entry>> = BTreeMap::new();
        let mut stopped = false;

        while let Some(command) = receiver.recv().await {
            match command {
                Command::Register { descriptor, reply } => {
                    if stopped {
                        let _ = reply.send(Err(RegisterError::Stopped));
                        continue;
                    }
                    let result = handle_register(&socket, multicast_addr, descriptor).await;
                    match result {
                        Ok(entry) => {
                            for name in entry.descriptor.answerable_names() {
                                index.insert(name.to_ascii_lowercase(), entry.clone());
                            }
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                Command::Lookup { name, reply } => {
                    let message = index.get(&name).map(|entry| Arc::clone(&entry.message));
                    let _ = reply.send(message);
                }
                Command::Stop { reply } => {
                    if !stopped {
                        stopped = true;
                        let mut sent = std::collections::HashSet::new();
                        for entry in index.values() {
                            let instance = entry.descriptor.instance_fqdn();
                            if sent.insert(instance) {
                                let goodbye = (*entry.message).clone().into_goodbye();
                                let _ = transmit(&socket, multicast_addr, &goodbye).await;
                            }
                        }
                    }
                    let _ = reply.send(());
                }
            }
        }
    });

    handle
}

async fn handle_register(
    socket: &Arc<UdpSocket>,
    multicast_addr: SocketAddr,
    descriptor: ServiceDescriptor,
) -> Result<Arc<Entry>, RegisterError> {
    let message = descriptor
        .build_response_message()
        .await
        .map_err(RegisterError::Build)?;

    for n in 0..ANNOUNCEMENT_COUNT {
        transmit(socket, multicast_addr, &message)
            .await
            .map_err(RegisterError::Send)?;
        if n + 1 < ANNOUNCEMENT_COUNT {
            let delay_ms = rand::thread_rng().gen_range(ANNOUNCEMENT_JITTER_MS);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    Ok(Arc::new(Entry {
        descriptor,
        message: Arc::new(message),
    }))
}

async fn transmit(
    socket: &UdpSocket,
    multicast_addr: SocketAddr,
    message: &Message,
) -> std::io::Result<()> {
    let octets = message
        .to_octets()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    socket.send_to(&octets, multicast_addr).await?;
    Ok(())
}
