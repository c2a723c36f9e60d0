//! Ratcheting encrypted session between two paired devices.
//!
//! One session per remote identity. The handshake is a three-way X25519
//! agreement (identity + ephemeral keys on both sides); the root key
//! feeds two symmetric hash chains, one per direction, advanced on every
//! message so earlier message keys are not recoverable from later state.
//!
//! The whole state is serde-serializable: sessions survive a process
//! restart and peers do not re-handshake on reconnect. A peer that
//! re-pairs (new identity key) makes decryption fail, which callers must
//! treat as "handshake again", never as fatal.

use crate::ids::PeerId;
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const PROTOCOL_VERSION: u8 = 1;

/// Receive counters may run ahead by at most this many lost messages
/// before the session is considered unrecoverable.
const MAX_COUNTER_SKIP: u32 = 64;

const ROOT_KEY_CONTEXT: &str = "pastelink v1 session root key";
const INITIATOR_CHAIN_CONTEXT: &str = "pastelink v1 initiator chain key";
const RESPONDER_CHAIN_CONTEXT: &str = "pastelink v1 responder chain key";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No usable session state for this peer; run the handshake.
    #[error("peer requires a fresh handshake")]
    RequiresHandshake,
    /// Counter behind the receiving chain: replayed or reordered
    /// delivery. Recoverable by retransmission, the session stays valid.
    #[error("replayed or out-of-order message: expected counter >= {expected}, got {got}")]
    ReplayedOrOutOfOrder { expected: u32, got: u32 },
    /// Envelope header names a different peer than the session in use.
    #[error("envelope declares peer {got}, session is bound to {expected}")]
    IdentityMismatch { expected: PeerId, got: PeerId },
    #[error("decrypt failed")]
    DecryptFailed,
    #[error("encrypt failed")]
    EncryptFailed,
}

/// Long-lived X25519 identity of this device.
pub struct IdentityKeys {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeys {
    pub fn generate() -> Self {
        let secret = StaticSecret::random();
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }
}

/// First handshake message, initiator → responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeInit {
    pub peer_id: PeerId,
    pub identity: [u8; 32],
    pub ephemeral: [u8; 32],
}

/// Second handshake message, responder → initiator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub peer_id: PeerId,
    pub identity: [u8; 32],
    pub ephemeral: [u8; 32],
}

/// Wire header carried with every sealed payload. The declared peer id
/// lets the receiver select a session and reject confusion across
/// concurrently handled connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Sender's declared identity id.
    pub peer_id: PeerId,
    pub version: u8,
    pub counter: u32,
}

impl EnvelopeHeader {
    /// Associated data bound into the AEAD tag.
    fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.peer_id.inner().len() + 5);
        aad.extend_from_slice(self.peer_id.inner().as_bytes());
        aad.push(self.version);
        aad.extend_from_slice(&self.counter.to_le_bytes());
        aad
    }
}

/// Encrypted application payload plus its header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: EnvelopeHeader,
    pub ciphertext: Vec<u8>,
}

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct ChainKey([u8; 32]);

impl ChainKey {
    fn message_key(&self) -> [u8; 32] {
        *blake3::keyed_hash(&self.0, b"message").as_bytes()
    }

    fn advanced(&self) -> ChainKey {
        ChainKey(*blake3::keyed_hash(&self.0, b"advance").as_bytes())
    }
}

impl std::fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never reaches logs.
        f.write_str("ChainKey(..)")
    }
}

fn nonce_for(counter: u32) -> XNonce {
    let mut nonce = [0u8; 24];
    nonce[..4].copy_from_slice(&counter.to_le_bytes());
    XNonce::from(nonce)
}

fn derive_root(dh1: &[u8; 32], dh2: &[u8; 32], dh3: &[u8; 32]) -> [u8; 32] {
    let mut ikm = [0u8; 96];
    ikm[..32].copy_from_slice(dh1);
    ikm[32..64].copy_from_slice(dh2);
    ikm[64..].copy_from_slice(dh3);
    let root = blake3::derive_key(ROOT_KEY_CONTEXT, &ikm);
    ikm.zeroize();
    root
}

fn derive_chains(root: &[u8; 32]) -> (ChainKey, ChainKey) {
    let initiator = ChainKey(blake3::derive_key(INITIATOR_CHAIN_CONTEXT, root));
    let responder = ChainKey(blake3::derive_key(RESPONDER_CHAIN_CONTEXT, root));
    (initiator, responder)
}

/// Established, restart-durable ratchet state with one remote device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatchetSession {
    local_peer_id: PeerId,
    peer_id: PeerId,
    remote_identity: [u8; 32],
    send_chain: ChainKey,
    recv_chain: ChainKey,
    send_count: u32,
    recv_count: u32,
}

impl RatchetSession {
    /// Remote device this session is bound to.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Constant-time comparison against a presented identity key, used
    /// to detect re-pairing (identity change) without leaking timing.
    pub fn matches_remote_identity(&self, identity: &[u8; 32]) -> bool {
        self.remote_identity.ct_eq(identity).into()
    }

    /// Advance the sending chain and seal a payload.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Envelope, SessionError> {
        let header = EnvelopeHeader {
            peer_id: self.local_peer_id.clone(),
            version: PROTOCOL_VERSION,
            counter: self.send_count,
        };

        let mut key = self.send_chain.message_key();
        let cipher =
            XChaCha20Poly1305::new_from_slice(&key).map_err(|_| SessionError::EncryptFailed)?;
        let ciphertext = cipher
            .encrypt(
                &nonce_for(header.counter),
                Payload {
                    msg: plaintext,
                    aad: &header.aad(),
                },
            )
            .map_err(|_| SessionError::EncryptFailed)?;
        key.zeroize();

        self.send_chain = self.send_chain.advanced();
        self.send_count += 1;

        Ok(Envelope { header, ciphertext })
    }

    /// Open an envelope and advance the receiving chain.
    ///
    /// Counters ahead of the expected value (up to a bounded skip) step
    /// the chain forward over lost messages; counters behind are replay
    /// errors. Nothing is committed until the AEAD check passes, so a
    /// failed attempt cannot poison the session state.
    pub fn decrypt(&mut self, envelope: &Envelope) -> Result<Vec<u8>, SessionError> {
        if envelope.header.peer_id != self.peer_id {
            return Err(SessionError::IdentityMismatch {
                expected: self.peer_id.clone(),
                got: envelope.header.peer_id.clone(),
            });
        }

        let counter = envelope.header.counter;
        if counter < self.recv_count {
            return Err(SessionError::ReplayedOrOutOfOrder {
                expected: self.recv_count,
                got: counter,
            });
        }
        if counter - self.recv_count > MAX_COUNTER_SKIP {
            return Err(SessionError::RequiresHandshake);
        }

        // Work on a scratch chain; commit only after a successful open.
        let mut chain = self.recv_chain.clone();
        for _ in self.recv_count..counter {
            chain = chain.advanced();
        }

        let mut key = chain.message_key();
        let cipher =
            XChaCha20Poly1305::new_from_slice(&key).map_err(|_| SessionError::DecryptFailed)?;
        let plaintext = cipher
            .decrypt(
                &nonce_for(counter),
                Payload {
                    msg: envelope.ciphertext.as_slice(),
                    aad: &envelope.header.aad(),
                },
            )
            .map_err(|_| SessionError::DecryptFailed)?;
        key.zeroize();

        self.recv_chain = chain.advanced();
        self.recv_count = counter + 1;

        Ok(plaintext)
    }
}

/// Initiator half of the handshake: holds the ephemeral secret between
/// sending the init message and receiving the ack.
pub struct HandshakeInitiator {
    local_peer_id: PeerId,
    ephemeral: StaticSecret,
}

impl std::fmt::Debug for HandshakeInitiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeInitiator")
            .field("local_peer_id", &self.local_peer_id)
            .finish_non_exhaustive()
    }
}

impl HandshakeInitiator {
    pub fn new(local_peer_id: PeerId) -> Self {
        Self {
            local_peer_id,
            ephemeral: StaticSecret::random(),
        }
    }

    pub fn init_message(&self, identity: &IdentityKeys) -> HandshakeInit {
        HandshakeInit {
            peer_id: self.local_peer_id.clone(),
            identity: identity.public_bytes(),
            ephemeral: *PublicKey::from(&self.ephemeral).as_bytes(),
        }
    }

    /// Consume the ack and derive the established session.
    pub fn establish(self, identity: &IdentityKeys, ack: &HandshakeAck) -> RatchetSession {
        let remote_identity = PublicKey::from(ack.identity);
        let remote_ephemeral = PublicKey::from(ack.ephemeral);

        let dh1 = self.ephemeral.diffie_hellman(&remote_identity);
        let dh2 = identity.secret.diffie_hellman(&remote_ephemeral);
        let dh3 = self.ephemeral.diffie_hellman(&remote_ephemeral);
        let root = derive_root(dh1.as_bytes(), dh2.as_bytes(), dh3.as_bytes());
        let (initiator_chain, responder_chain) = derive_chains(&root);

        RatchetSession {
            local_peer_id: self.local_peer_id,
            peer_id: ack.peer_id.clone(),
            remote_identity: ack.identity,
            send_chain: initiator_chain,
            recv_chain: responder_chain,
            send_count: 0,
            recv_count: 0,
        }
    }
}

/// Responder side: answer an init message with an ack and the session.
pub fn respond(
    identity: &IdentityKeys,
    local_peer_id: &PeerId,
    init: &HandshakeInit,
) -> (HandshakeAck, RatchetSession) {
    let ephemeral = StaticSecret::random();
    let remote_identity = PublicKey::from(init.identity);
    let remote_ephemeral = PublicKey::from(init.ephemeral);

    let dh1 = identity.secret.diffie_hellman(&remote_ephemeral);
    let dh2 = ephemeral.diffie_hellman(&remote_identity);
    let dh3 = ephemeral.diffie_hellman(&remote_ephemeral);
    let root = derive_root(dh1.as_bytes(), dh2.as_bytes(), dh3.as_bytes());
    let (initiator_chain, responder_chain) = derive_chains(&root);

    let ack = HandshakeAck {
        peer_id: local_peer_id.clone(),
        identity: identity.public_bytes(),
        ephemeral: *PublicKey::from(&ephemeral).as_bytes(),
    };

    let session = RatchetSession {
        local_peer_id: local_peer_id.clone(),
        peer_id: init.peer_id.clone(),
        remote_identity: init.identity,
        send_chain: responder_chain,
        recv_chain: initiator_chain,
        send_count: 0,
        recv_count: 0,
    };

    (ack, session)
}
