//! Shared fixtures for the integration tests: a scripted ledger node that
//! speaks the wire protocol over in-memory pipes, and a fully wired
//! `StampService` pointed at it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{split, DuplexStream};
use tokio::sync::Mutex;

use docstamp_protocol::client::{MemoryConnector, MemoryListener};
use docstamp_protocol::config::StampConfig;
use docstamp_protocol::crypto::{hash, NetworkType, StampKeypair};
use docstamp_protocol::proof::{sign_stamp_request, StampRequest};
use docstamp_protocol::retriever::MemoryLedgerIndex;
use docstamp_protocol::store::SledMetadataStore;
use docstamp_protocol::transaction::verify_transaction;
use docstamp_protocol::wire::{read_frame, write_frame, MessageBody, ProtocolMessage, ResponseCode};
use docstamp_protocol::StampService;

pub const NETWORK: NetworkType = NetworkType::Devnet;

/// How the scripted node answers broadcasts.
#[derive(Debug, Clone, Copy)]
pub enum NodeBehaviour {
    /// Record valid transactions in the ledger and answer `Successful`.
    Accept,
    /// Like `Accept`, but answer after a delay.
    AcceptAfter(Duration),
    /// Read requests and never answer.
    Silent,
    /// Answer every request with this code and record nothing.
    Reject(ResponseCode),
    /// Answer `Successful`, but sign the envelope with a key nobody trusts.
    Impostor,
}

pub struct MockNode {
    pub keypair: StampKeypair,
    pub ledger: Arc<MemoryLedgerIndex>,
    received: Arc<AtomicUsize>,
}

impl MockNode {
    /// Broadcast requests read so far.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

pub fn spawn_node(listener: MemoryListener, behaviour: NodeBehaviour) -> MockNode {
    let node = MockNode {
        keypair: StampKeypair::generate(),
        ledger: Arc::new(MemoryLedgerIndex::new()),
        received: Arc::new(AtomicUsize::new(0)),
    };

    let keypair = node.keypair.clone();
    let ledger = Arc::clone(&node.ledger);
    let received = Arc::clone(&node.received);
    tokio::spawn(async move {
        while let Some(stream) = listener.accept().await {
            tokio::spawn(serve(
                stream,
                keypair.clone(),
                Arc::clone(&ledger),
                Arc::clone(&received),
                behaviour,
            ));
        }
    });
    node
}

async fn serve(
    stream: DuplexStream,
    keypair: StampKeypair,
    ledger: Arc<MemoryLedgerIndex>,
    received: Arc<AtomicUsize>,
    behaviour: NodeBehaviour,
) {
    let (mut reader, writer) = split(stream);
    let writer = Arc::new(Mutex::new(writer));

    while let Ok(Some(message)) = read_frame(&mut reader).await {
        if !message.verify(&message.sender, NETWORK) {
            continue;
        }
        let MessageBody::BroadcastTransactionRequest { transaction } = message.body else {
            continue;
        };
        received.fetch_add(1, Ordering::SeqCst);

        let (code, delay) = match behaviour {
            NodeBehaviour::Silent => continue,
            NodeBehaviour::Reject(code) => (code, Duration::ZERO),
            NodeBehaviour::Accept | NodeBehaviour::Impostor | NodeBehaviour::AcceptAfter(_) => {
                let code = if verify_transaction(&transaction).is_ok() {
                    ledger.insert(transaction, None);
                    ResponseCode::Successful
                } else {
                    ResponseCode::Failed
                };
                let delay = match behaviour {
                    NodeBehaviour::AcceptAfter(delay) => delay,
                    _ => Duration::ZERO,
                };
                (code, delay)
            }
        };
        let signer = match behaviour {
            NodeBehaviour::Impostor => StampKeypair::generate(),
            _ => keypair.clone(),
        };

        let writer = Arc::clone(&writer);
        let correlation_id = message.correlation_id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = ProtocolMessage::sign(
                MessageBody::BroadcastTransactionResponse {
                    response_code: code,
                },
                correlation_id,
                &signer,
                NETWORK,
            )
            .unwrap();
            let _ = write_frame(&mut *writer.lock().await, &reply).await;
        });
    }
}

pub type TestService = StampService<MemoryConnector, MemoryLedgerIndex, SledMetadataStore>;

pub struct Harness {
    pub service: TestService,
    pub node: MockNode,
    pub service_keypair: StampKeypair,
}

/// A service wired to a scripted node, with a submission timeout of
/// `timeout`.
pub fn harness(behaviour: NodeBehaviour, timeout: Duration) -> Harness {
    let (connector, listener) = MemoryConnector::pair();
    let node = spawn_node(listener, behaviour);
    let service_keypair = StampKeypair::generate();

    let config = StampConfig {
        node_public_key: node.keypair.public_key().to_base32(),
        service_secret_key: service_keypair.secret_key_base32(),
        network: NETWORK,
        submission_timeout_ms: timeout.as_millis() as u64,
        ..StampConfig::default()
    }
    .validate()
    .unwrap();

    let service = StampService::new(
        config,
        connector,
        Arc::clone(&node.ledger),
        SledMetadataStore::open_temporary().unwrap(),
    )
    .unwrap();

    Harness {
        service,
        node,
        service_keypair,
    }
}

/// A correctly signed request for a document with `contents`.
pub fn signed_request(user: &StampKeypair, contents: &[u8], file_name: &str) -> StampRequest {
    sign_stamp_request(user, hash(contents), file_name)
}
