//! Media Router-side state: live calls being fed, and the fixed pools of
//! feeders and players that serve them.

use std::net::SocketAddr;

use super::call::CallKind;
use super::event::StreamOriginator;
use crate::config::FeederType;

/// One call currently eligible for interception (not yet released).
#[derive(Debug, Clone)]
pub struct LiveCall {
    pub call_id: u32,
    pub kind: CallKind,
    pub started_at_secs: u64,
}

impl LiveCall {
    /// The feeder type a call of this kind must be fed through: a duplex
    /// call carries two independent legs and needs a stereo feeder, while
    /// simplex and group calls carry one and are fed mono.
    #[must_use]
    pub fn required_feeder_type(&self) -> FeederType {
        match self.kind {
            CallKind::Duplex => FeederType::Stereo,
            CallKind::Simplex | CallKind::Group => FeederType::Mono,
        }
    }
}

/// A feeder slot: a long-lived, statically-configured destination (stream
/// name, address, and mono/stereo type) that can be attached to a
/// type-compatible live call and receives its voice frames verbatim as they
/// arrive.
#[derive(Debug)]
pub struct Feeder {
    pub id: u32,
    pub stream: String,
    pub destination: SocketAddr,
    pub kind: FeederType,
    pub attached_call: Option<u32>,
    pub wants_originator: Option<StreamOriginator>,
    pub busy: bool,
}

impl Feeder {
    #[must_use]
    pub fn new(id: u32, stream: String, destination: SocketAddr, kind: FeederType) -> Self {
        Self {
            id,
            stream,
            destination,
            kind,
            attached_call: None,
            wants_originator: None,
            busy: false,
        }
    }

    pub fn attach(&mut self, call_id: u32, originator: Option<StreamOriginator>) {
        self.attached_call = Some(call_id);
        self.wants_originator = originator;
        self.busy = true;
    }

    pub fn release(&mut self) {
        self.attached_call = None;
        self.wants_originator = None;
        self.busy = false;
    }
}

/// A player slot: a child-process-backed audio player used to play back a
/// finalized recording, distinct from a feeder because it decodes and
/// renders audio rather than relaying raw frames.
#[derive(Debug)]
pub struct Player {
    pub id: u32,
    pub playing_file: Option<String>,
    pub busy: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            playing_file: None,
            busy: false,
        }
    }

    pub fn start(&mut self, file: String) {
        self.playing_file = Some(file);
        self.busy = true;
    }

    pub fn stop(&mut self) {
        self.playing_file = None;
        self.busy = false;
    }
}

/// A fixed-size pool of feeders or players, tracking free/busy assignment.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<T>,
}

impl<T> Pool<T> {
    #[must_use]
    pub fn new(slots: Vec<T>) -> Self {
        Self { slots }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.slots.iter_mut()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }
}

impl Pool<Feeder> {
    /// Finds and attaches the first free feeder whose type matches `kind` to
    /// `call_id`, returning its id, or `None` if no type-compatible feeder
    /// is free.
    pub fn acquire(
        &mut self,
        call_id: u32,
        kind: FeederType,
        originator: Option<StreamOriginator>,
    ) -> Option<u32> {
        let feeder = self.slots.iter_mut().find(|f| !f.busy && f.kind == kind)?;
        feeder.attach(call_id, originator);
        Some(feeder.id)
    }

    #[must_use]
    pub fn find_by_call(&self, call_id: u32) -> Option<&Feeder> {
        self.slots.iter().find(|f| f.attached_call == Some(call_id))
    }

    pub fn release(&mut self, feeder_id: u32) -> bool {
        if let Some(feeder) = self.slots.iter_mut().find(|f| f.id == feeder_id) {
            feeder.release();
            true
        } else {
            false
        }
    }

    pub fn release_by_call(&mut self, call_id: u32) -> bool {
        if let Some(feeder) = self.slots.iter_mut().find(|f| f.attached_call == Some(call_id)) {
            feeder.release();
            true
        } else {
            false
        }
    }
}

impl Pool<Player> {
    /// Finds and starts the first free player on `file`, returning its id,
    /// or `None` if every player is busy.
    pub fn acquire(&mut self, file: String) -> Option<u32> {
        let player = self.slots.iter_mut().find(|p| !p.busy)?;
        player.start(file);
        Some(player.id)
    }

    pub fn release(&mut self, player_id: u32) -> bool {
        if let Some(player) = self.slots.iter_mut().find(|p| p.id == player_id) {
            player.stop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feeder(id: u32, kind: FeederType) -> Feeder {
        Feeder::new(id, format!("feed{id}"), "127.0.0.1:9000".parse().unwrap(), kind)
    }

    #[test]
    fn feeder_pool_exhausts_after_all_busy() {
        let mut pool = Pool::new(vec![feeder(0, FeederType::Mono), feeder(1, FeederType::Mono)]);
        assert_eq!(pool.acquire(10, FeederType::Mono, None), Some(0));
        assert_eq!(pool.acquire(11, FeederType::Mono, None), Some(1));
        assert_eq!(pool.acquire(12, FeederType::Mono, None), None);
    }

    #[test]
    fn acquire_only_matches_compatible_feeder_type() {
        let mut pool = Pool::new(vec![feeder(0, FeederType::Mono), feeder(1, FeederType::Stereo)]);
        assert_eq!(pool.acquire(10, FeederType::Mono, None), Some(0));
        // Only the stereo feeder remains free; a mono request must not match it.
        assert_eq!(pool.acquire(11, FeederType::Mono, None), None);
        assert_eq!(pool.acquire(11, FeederType::Stereo, None), Some(1));
    }

    #[test]
    fn releasing_a_feeder_makes_it_available_again() {
        let mut pool = Pool::new(vec![feeder(0, FeederType::Mono)]);
        let id = pool.acquire(1, FeederType::Mono, Some(StreamOriginator::A)).unwrap();
        assert!(pool.release(id));
        assert_eq!(pool.acquire(2, FeederType::Mono, None), Some(0));
    }

    #[test]
    fn release_by_call_frees_the_attached_feeder() {
        let mut pool = Pool::new(vec![feeder(0, FeederType::Mono)]);
        pool.acquire(1, FeederType::Mono, None).unwrap();
        assert!(pool.release_by_call(1));
        assert_eq!(pool.acquire(2, FeederType::Mono, None), Some(0));
    }

    #[test]
    fn player_pool_tracks_playing_file() {
        let mut pool = Pool::new(vec![Player::new(0)]);
        let id = pool.acquire("rec.wav".into()).unwrap();
        assert!(pool.iter().any(|p| p.id == id && p.busy));
        assert!(pool.release(id));
    }
}
