// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

//! In-process message bus connecting query workers and the scheduler.
//!
//! Every participant connects once and receives a [`ClientId`]; messages
//! are tagged byte payloads addressed by client id. Worker threads record
//! their client id in a shared [`ClientIdMap`] so that code deep in the
//! write path can name the sending thread without plumbing identities
//! through every call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};
use thiserror::Error;

pub type ClientId = u32;

/// Tags distinguishing message kinds on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    /// A storage block has been filled and is ready for downstream
    /// consumption; payload is a length-delimited `DataPipelineMessage`.
    DataPipeline,
}

/// A byte payload tagged with its message kind.
#[derive(Debug, Clone)]
pub struct TaggedMessage {
    tag: MessageTag,
    payload: Bytes,
}

impl TaggedMessage {
    pub fn new(tag: MessageTag, payload: Bytes) -> Self {
        Self { tag, payload }
    }

    pub fn tag(&self) -> MessageTag {
        self.tag
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// A delivered message, annotated with the sender's client id.
#[derive(Debug)]
pub struct AnnotatedMessage {
    pub sender: ClientId,
    pub message: TaggedMessage,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SendError {
    #[error("unknown sender client {0}")]
    UnknownSender(ClientId),
    #[error("unknown receiver client {0}")]
    UnknownReceiver(ClientId),
}

#[derive(Default)]
struct Mailbox {
    queue: Mutex<VecDeque<AnnotatedMessage>>,
    condvar: Condvar,
}

impl Mailbox {
    fn push(&self, message: AnnotatedMessage) {
        self.queue.lock().push_back(message);
        self.condvar.notify_one();
    }

    fn try_pop(&self) -> Option<AnnotatedMessage> {
        self.queue.lock().pop_front()
    }

    fn pop_blocking(&self) -> AnnotatedMessage {
        let mut queue = self.queue.lock();
        loop {
            if let Some(message) = queue.pop_front() {
                return message;
            }
            self.condvar.wait(&mut queue);
        }
    }
}

/// The bus itself: a registry of per-client mailboxes.
#[derive(Default)]
pub struct MessageBus {
    clients: RwLock<HashMap<ClientId, Arc<Mailbox>>>,
    next_client_id: AtomicU32,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and return its id.
    pub fn connect(&self) -> ClientId {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        self.clients.write().insert(id, Arc::new(Mailbox::default()));
        id
    }

    /// Deliver `message` from `sender` to `receiver`'s mailbox.
    pub fn send(
        &self,
        sender: ClientId,
        receiver: ClientId,
        message: TaggedMessage,
    ) -> Result<(), SendError> {
        let mailbox = {
            let clients = self.clients.read();
            if !clients.contains_key(&sender) {
                return Err(SendError::UnknownSender(sender));
            }
            clients
                .get(&receiver)
                .ok_or(SendError::UnknownReceiver(receiver))?
                .clone()
        };
        mailbox.push(AnnotatedMessage { sender, message });
        Ok(())
    }

    /// Pop the next message for `client`, if any.
    pub fn try_receive(&self, client: ClientId) -> Option<AnnotatedMessage> {
        self.mailbox(client).try_pop()
    }

    /// Block until a message arrives for `client`.
    pub fn receive(&self, client: ClientId) -> AnnotatedMessage {
        self.mailbox(client).pop_blocking()
    }

    fn mailbox(&self, client: ClientId) -> Arc<Mailbox> {
        self.clients
            .read()
            .get(&client)
            .unwrap_or_else(|| panic!("client {client} is not connected to the bus"))
            .clone()
    }
}

/// Process-wide mapping from OS-thread identity to message-bus client id.
///
/// Populated once per worker thread at startup and read-only thereafter.
#[derive(Default)]
pub struct ClientIdMap {
    map: RwLock<HashMap<ThreadId, ClientId>>,
}

impl ClientIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the calling thread's client id.
    pub fn add_value(&self, client_id: ClientId) {
        self.map.write().insert(thread::current().id(), client_id);
    }

    /// Drop the calling thread's entry, on worker shutdown.
    pub fn remove_value(&self) {
        self.map.write().remove(&thread::current().id());
    }

    /// The calling thread's client id. Panics if the thread never
    /// registered: only bus-connected workers may reach the write path.
    pub fn value(&self) -> ClientId {
        *self
            .map
            .read()
            .get(&thread::current().id())
            .expect("current thread is not registered with the message bus")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(payload: &'static [u8]) -> TaggedMessage {
        TaggedMessage::new(MessageTag::DataPipeline, Bytes::from_static(payload))
    }

    #[test]
    fn send_and_receive() {
        let bus = MessageBus::new();
        let a = bus.connect();
        let b = bus.connect();

        bus.send(a, b, tagged(b"hello")).unwrap();
        let received = bus.try_receive(b).unwrap();
        assert_eq!(received.sender, a);
        assert_eq!(received.message.tag(), MessageTag::DataPipeline);
        assert_eq!(received.message.payload().as_ref(), b"hello");
        assert!(bus.try_receive(b).is_none());
        assert!(bus.try_receive(a).is_none());
    }

    #[test]
    fn send_to_unknown_receiver() {
        let bus = MessageBus::new();
        let a = bus.connect();
        assert_eq!(
            bus.send(a, 999, tagged(b"x")),
            Err(SendError::UnknownReceiver(999))
        );
        assert_eq!(
            bus.send(998, a, tagged(b"x")),
            Err(SendError::UnknownSender(998))
        );
    }

    #[test]
    fn blocking_receive() {
        let bus = Arc::new(MessageBus::new());
        let a = bus.connect();
        let b = bus.connect();

        let sender = {
            let bus = bus.clone();
            std::thread::spawn(move || bus.send(a, b, tagged(b"ping")).unwrap())
        };
        let received = bus.receive(b);
        assert_eq!(received.sender, a);
        sender.join().unwrap();
    }

    #[test]
    fn client_id_map_tracks_threads() {
        let map = Arc::new(ClientIdMap::new());
        map.add_value(7);
        assert_eq!(map.value(), 7);

        let other = {
            let map = map.clone();
            std::thread::spawn(move || {
                map.add_value(8);
                let id = map.value();
                map.remove_value();
                id
            })
        };
        assert_eq!(other.join().unwrap(), 8);
        // The spawning thread's entry is untouched.
        assert_eq!(map.value(), 7);
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn unregistered_thread_panics() {
        ClientIdMap::new().value();
    }
}
