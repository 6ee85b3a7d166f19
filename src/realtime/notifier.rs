use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use log::{debug, trace};
use rocket::tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex, OwnedMutexGuard,
};

use crate::model::api::event::ServerEvent;

/// A unique identifier for a realtime connection.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ConnectionId(pub usize);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ConnectionId {
    /// Atomically get the next ID.
    pub fn next() -> ConnectionId {
        static CONNECTION_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        ConnectionId(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The sending half of a connection: events pushed here are written to the
/// client's socket by its own task.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbox: UnboundedSender<ServerEvent>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for this connection.
    /// Returns false if the connection has gone away.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.outbox.send(event).is_ok()
    }
}

#[derive(Default)]
struct Rooms {
    /// Crew name to the connections subscribed to it.
    members: HashMap<String, HashMap<ConnectionId, Connection>>,
}

/// Crew name to the lock that orders its write-then-broadcast sequences.
/// Entries only live while someone holds or waits on them.
type Sequencers = HashMap<String, Arc<Mutex<()>>>;

/// In-memory registry of which connections are watching which crew.
///
/// Cloning gives another handle on the same registry.
#[derive(Clone, Default)]
pub struct Notifier {
    rooms: Arc<Mutex<Rooms>>,
    // Touched from `Drop`, so this can't be an async lock.
    sequencers: Arc<SyncMutex<Sequencers>>,
}

/// Holds a crew's sequencing lock until dropped.
pub struct Sequence {
    guard: Option<OwnedMutexGuard<()>>,
    crew_name: String,
    sequencers: Arc<SyncMutex<Sequencers>>,
}

impl Drop for Sequence {
    fn drop(&mut self) {
        let mut sequencers = self
            .sequencers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Release under the map lock, so nobody can pick up the entry in between.
        self.guard.take();
        let unused = sequencers
            .get(&self.crew_name)
            .map_or(false, |sequencer| Arc::strong_count(sequencer) == 1);
        if unused {
            sequencers.remove(&self.crew_name);
        }
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection. The receiver yields every event sent to it.
    pub fn connect(&self) -> (Connection, UnboundedReceiver<ServerEvent>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let connection = Connection {
            id: ConnectionId::next(),
            outbox,
        };
        (connection, inbox)
    }

    /// Add the connection to the crew's room. Joining twice is harmless.
    pub async fn join(&self, connection: &Connection, crew_name: &str) {
        let mut rooms = self.rooms.lock().await;
        rooms
            .members
            .entry(crew_name.to_string())
            .or_default()
            .insert(connection.id, connection.clone());
        debug!("ws{} joined room {crew_name}", connection.id);
    }

    /// Remove the connection from every room it joined.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut rooms = self.rooms.lock().await;
        rooms.members.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        debug!("ws{id} left all rooms");
    }

    /// How many connections are in the crew's room.
    pub async fn room_size(&self, crew_name: &str) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.members.get(crew_name).map_or(0, HashMap::len)
    }

    /// Send the crew's destinations to everyone in its room.
    pub async fn broadcast_destinations(&self, crew_name: &str, options: &[String]) -> usize {
        self.broadcast(crew_name, ServerEvent::DestinationOptions(options.to_vec()))
            .await
    }

    /// Send the crew's winner to everyone in its room.
    pub async fn broadcast_winner(&self, crew_name: &str, winner: &str) -> usize {
        self.broadcast(crew_name, ServerEvent::WinningOption(winner.to_string()))
            .await
    }

    /// Send an event to every connection in the room, dropping any that have
    /// gone away. Returns the number of connections reached.
    async fn broadcast(&self, crew_name: &str, event: ServerEvent) -> usize {
        let mut rooms = self.rooms.lock().await;
        let Some(members) = rooms.members.get_mut(crew_name) else {
            return 0;
        };
        members.retain(|_, connection| connection.send(event.clone()));
        let reached = members.len();
        if members.is_empty() {
            rooms.members.remove(crew_name);
        }
        trace!("Broadcast to {reached} connection(s) in room {crew_name}: {event:?}");
        reached
    }

    /// Hold the crew's sequencing lock.
    ///
    /// A write whose result is then broadcast must hold this for both steps,
    /// so that broadcasts go out in the order the writes were persisted.
    pub async fn sequence(&self, crew_name: &str) -> Sequence {
        let sequencer = self
            .sequencers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(crew_name.to_string())
            .or_default()
            .clone();
        let guard = sequencer.lock_owned().await;
        Sequence {
            guard: Some(guard),
            crew_name: crew_name.to_string(),
            sequencers: self.sequencers.clone(),
        }
    }

    /// How many crews currently have a sequencing lock in use.
    pub fn sequenced_crews(&self) -> usize {
        self.sequencers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rocket::tokio::{self, time::timeout};

    use super::*;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[rocket::async_test]
    async fn broadcast_reaches_only_the_room() {
        let notifier = Notifier::new();
        let (alice, mut alice_inbox) = notifier.connect();
        let (bob, mut bob_inbox) = notifier.connect();
        let (carol, mut carol_inbox) = notifier.connect();
        notifier.join(&alice, "Lunch").await;
        notifier.join(&bob, "Lunch").await;
        notifier.join(&carol, "Dinner").await;

        let reached = notifier
            .broadcast_destinations("Lunch", &options(&["Tacos"]))
            .await;
        assert_eq!(reached, 2);

        let expected = ServerEvent::DestinationOptions(options(&["Tacos"]));
        assert_eq!(alice_inbox.recv().await.unwrap(), expected);
        assert_eq!(bob_inbox.recv().await.unwrap(), expected);
        assert!(carol_inbox.try_recv().is_err());
    }

    #[rocket::async_test]
    async fn broadcast_winner_to_room() {
        let notifier = Notifier::new();
        let (alice, mut alice_inbox) = notifier.connect();
        notifier.join(&alice, "Lunch").await;
        notifier.join(&alice, "Lunch").await;

        assert_eq!(notifier.broadcast_winner("Lunch", "Pizza").await, 1);
        assert_eq!(
            alice_inbox.recv().await.unwrap(),
            ServerEvent::WinningOption("Pizza".to_string())
        );
        // Joining twice doesn't mean hearing twice.
        assert!(alice_inbox.try_recv().is_err());
    }

    #[rocket::async_test]
    async fn broadcast_to_empty_room() {
        let notifier = Notifier::new();
        assert_eq!(notifier.broadcast_winner("Nobody", "Pizza").await, 0);
    }

    #[rocket::async_test]
    async fn disconnect_leaves_every_room() {
        let notifier = Notifier::new();
        let (alice, _alice_inbox) = notifier.connect();
        let (bob, _bob_inbox) = notifier.connect();
        notifier.join(&alice, "Lunch").await;
        notifier.join(&alice, "Dinner").await;
        notifier.join(&bob, "Lunch").await;

        notifier.disconnect(alice.id()).await;
        assert_eq!(notifier.room_size("Lunch").await, 1);
        assert_eq!(notifier.room_size("Dinner").await, 0);
    }

    #[rocket::async_test]
    async fn dropped_connections_are_pruned() {
        let notifier = Notifier::new();
        let (alice, alice_inbox) = notifier.connect();
        let (bob, mut bob_inbox) = notifier.connect();
        notifier.join(&alice, "Lunch").await;
        notifier.join(&bob, "Lunch").await;
        drop(alice_inbox);

        assert_eq!(notifier.broadcast_winner("Lunch", "Pizza").await, 1);
        assert_eq!(notifier.room_size("Lunch").await, 1);
        assert!(bob_inbox.recv().await.is_some());
    }

    #[rocket::async_test]
    async fn sequence_is_exclusive_per_crew() {
        let notifier = Notifier::new();
        let guard = notifier.sequence("Lunch").await;

        // Another crew is unaffected.
        let other = timeout(Duration::from_millis(100), notifier.sequence("Dinner")).await;
        assert!(other.is_ok());

        // The same crew waits until the first holder is done.
        let waiter = {
            let notifier = notifier.clone();
            tokio::spawn(async move {
                let _guard = notifier.sequence("Lunch").await;
            })
        };
        let blocked = timeout(Duration::from_millis(100), async {
            while !waiter.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(blocked.is_err());

        drop(guard);
        timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notifier.sequenced_crews(), 0);
    }

    #[rocket::async_test]
    async fn sequencers_are_released() {
        let notifier = Notifier::new();
        for i in 0..1000 {
            let _sequence = notifier.sequence(&format!("Nobody {i}")).await;
            assert_eq!(notifier.sequenced_crews(), 1);
        }
        assert_eq!(notifier.sequenced_crews(), 0);
    }

    #[rocket::async_test]
    async fn sequencer_outlives_first_holder_while_contended() {
        let notifier = Notifier::new();
        let first = notifier.sequence("Lunch").await;
        let waiter = {
            let notifier = notifier.clone();
            tokio::spawn(async move { notifier.sequence("Lunch").await })
        };
        // Let the waiter queue up behind the first holder.
        while notifier
            .sequencers
            .lock()
            .unwrap()
            .get("Lunch")
            .map_or(0, Arc::strong_count)
            < 3
        {
            tokio::task::yield_now().await;
        }

        drop(first);
        assert_eq!(notifier.sequenced_crews(), 1);
        let second = timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        drop(second);
        assert_eq!(notifier.sequenced_crews(), 0);
    }
}
