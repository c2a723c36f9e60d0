//! Per-peer session ownership.
//!
//! One established ratchet session per remote identity, each behind its
//! own async mutex so encrypt/decrypt are serialized against one ratchet
//! while different peers proceed in parallel. The outer map lock is held
//! only for lookups, never across crypto work.

use log::{info, warn};
use pl_core::error::{ErrorCode, SyncError};
use pl_core::ids::PeerId;
use pl_core::session::{
    respond, Envelope, HandshakeAck, HandshakeInit, HandshakeInitiator, IdentityKeys,
    RatchetSession, SessionError,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub struct SessionManager {
    local_peer_id: PeerId,
    identity: IdentityKeys,
    blacklist: HashSet<PeerId>,
    sessions: Mutex<HashMap<PeerId, Arc<tokio::sync::Mutex<RatchetSession>>>>,
}

impl SessionManager {
    pub fn new(local_peer_id: PeerId, identity: IdentityKeys, blacklist: HashSet<PeerId>) -> Self {
        Self {
            local_peer_id,
            identity,
            blacklist,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn local_peer_id(&self) -> &PeerId {
        &self.local_peer_id
    }

    /// Pairing blacklist, checked before every session creation.
    pub fn ensure_allowed(&self, peer_id: &PeerId) -> Result<(), SyncError> {
        if self.blacklist.contains(peer_id) {
            return Err(SyncError::new(
                ErrorCode::PeerBlacklisted,
                format!("refusing to communicate with {peer_id}"),
            ));
        }
        Ok(())
    }

    pub fn has_session(&self, peer_id: &PeerId) -> bool {
        self.sessions
            .lock()
            .expect("session map lock")
            .contains_key(peer_id)
    }

    /// Start a handshake toward a peer.
    pub fn init_handshake(&self, peer_id: &PeerId) -> Result<(HandshakeInitiator, HandshakeInit), SyncError> {
        self.ensure_allowed(peer_id)?;
        let initiator = HandshakeInitiator::new(self.local_peer_id.clone());
        let init = initiator.init_message(&self.identity);
        Ok((initiator, init))
    }

    /// Finish an initiated handshake and install the session.
    pub fn complete_handshake(
        &self,
        initiator: HandshakeInitiator,
        ack: &HandshakeAck,
    ) -> Result<(), SyncError> {
        self.ensure_allowed(&ack.peer_id)?;
        let session = initiator.establish(&self.identity, ack);
        self.install(session);
        Ok(())
    }

    /// Answer an incoming handshake. An existing session for the same
    /// peer is replaced: a fresh init means the peer restarted or
    /// re-paired, and stale state must not linger and poison the map.
    pub fn respond_handshake(&self, init: &HandshakeInit) -> Result<HandshakeAck, SyncError> {
        self.ensure_allowed(&init.peer_id)?;

        let (ack, session) = respond(&self.identity, &self.local_peer_id, init);

        let replaced = self
            .sessions
            .lock()
            .expect("session map lock")
            .insert(
                init.peer_id.clone(),
                Arc::new(tokio::sync::Mutex::new(session)),
            )
            .is_some();
        if replaced {
            info!("replaced session for {} after fresh handshake", init.peer_id);
        }

        Ok(ack)
    }

    fn install(&self, session: RatchetSession) {
        let peer_id = session.peer_id().clone();
        self.sessions
            .lock()
            .expect("session map lock")
            .insert(peer_id, Arc::new(tokio::sync::Mutex::new(session)));
    }

    fn get(&self, peer_id: &PeerId) -> Option<Arc<tokio::sync::Mutex<RatchetSession>>> {
        self.sessions
            .lock()
            .expect("session map lock")
            .get(peer_id)
            .cloned()
    }

    /// Drop a session, forcing the next exchange to re-handshake.
    pub fn reset(&self, peer_id: &PeerId) {
        if self
            .sessions
            .lock()
            .expect("session map lock")
            .remove(peer_id)
            .is_some()
        {
            info!("session for {} reset", peer_id);
        }
    }

    /// Seal a payload toward a peer, creating nothing: the caller must
    /// handshake first when `RequiresHandshake` comes back.
    pub async fn seal(&self, peer_id: &PeerId, plaintext: &[u8]) -> Result<Envelope, SessionError> {
        let session = self.get(peer_id).ok_or(SessionError::RequiresHandshake)?;
        let mut session = session.lock().await;
        session.encrypt(plaintext)
    }

    /// Open an envelope, selecting the session by the declared peer id.
    ///
    /// A hard decrypt failure evicts the session (the likely cause is a
    /// re-paired peer) and surfaces as `RequiresHandshake`; replays keep
    /// the session intact.
    pub async fn open(&self, envelope: &Envelope) -> Result<Vec<u8>, SessionError> {
        let peer_id = &envelope.header.peer_id;
        let session = self.get(peer_id).ok_or(SessionError::RequiresHandshake)?;

        let result = {
            let mut session = session.lock().await;
            session.decrypt(envelope)
        };

        match result {
            Err(SessionError::DecryptFailed) => {
                warn!(
                    "decrypt failed for {}; evicting session and requesting handshake",
                    peer_id
                );
                self.reset(peer_id);
                Err(SessionError::RequiresHandshake)
            }
            other => other,
        }
    }

    /// Snapshot of all established sessions for restart durability.
    pub async fn export_sessions(&self) -> Vec<RatchetSession> {
        let slots: Vec<_> = {
            let map = self.sessions.lock().expect("session map lock");
            map.values().cloned().collect()
        };
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().await.clone());
        }
        out
    }

    pub fn import_sessions(&self, sessions: Vec<RatchetSession>) {
        for session in sessions {
            if self.blacklist.contains(session.peer_id()) {
                continue;
            }
            self.install(session);
        }
    }
}
