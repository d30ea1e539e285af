use super::gateway::BridgeGateway;
use super::{BridgeOperation, BridgeRequest, BridgeResponse};
use crate::errors::{BridgeError, ErrorKind};
use crate::models::Envelope;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub type TransportFuture = Pin<Box<dyn Future<Output = Result<BridgeResponse, BridgeError>> + Send>>;

pub trait BridgeTransport: Send + Sync {
    fn send(&self, request: BridgeRequest) -> TransportFuture;
}

#[derive(Debug, Clone)]
pub struct LocalTransport {
    gateway: Arc<BridgeGateway>,
}

impl LocalTransport {
    pub fn new(gateway: Arc<BridgeGateway>) -> Self {
        Self { gateway }
    }
}

impl BridgeTransport for LocalTransport {
    fn send(&self, request: BridgeRequest) -> TransportFuture {
        let gateway = self.gateway.clone();
        Box::pin(async move { Ok::<_, BridgeError>(gateway.dispatch(request).await) })
    }
}

#[derive(Debug)]
struct BridgeMessage {
    payload: String,
    reply: oneshot::Sender<String>,
}

#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<BridgeMessage>,
}

// Exits once every ChannelTransport clone is dropped.
pub fn spawn_gateway(gateway: Arc<BridgeGateway>, capacity: usize) -> (ChannelTransport, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<BridgeMessage>(capacity.max(1));
    let handle = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            let response = gateway.handle_raw(&message.payload).await;
            if message.reply.send(response).is_err() {
                tracing::debug!("bridge caller dropped before response");
            }
        }
        tracing::debug!("bridge channel closed");
    });
    (ChannelTransport { sender }, handle)
}

impl BridgeTransport for ChannelTransport {
    fn send(&self, request: BridgeRequest) -> TransportFuture {
        let sender = self.sender.clone();
        Box::pin(async move {
            let payload = serde_json::to_string(&request)
                .map_err(|error| BridgeError::new(ErrorKind::Internal, error.to_string()))?;
            let (reply, response) = oneshot::channel();
            sender
                .send(BridgeMessage { payload, reply })
                .await
                .map_err(|_| BridgeError::new(ErrorKind::Internal, "Bridge channel closed"))?;
            let raw = response
                .await
                .map_err(|_| BridgeError::new(ErrorKind::Internal, "Bridge dropped the request"))?;
            serde_json::from_str::<BridgeResponse>(&raw)
                .map_err(|error| BridgeError::new(ErrorKind::Parse, error.to_string()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct BridgeClient<T: BridgeTransport> {
    transport: T,
}

impl<T: BridgeTransport> BridgeClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn save_data(&self, name: &str, value: Value) -> Envelope {
        let request = BridgeRequest::SaveData {
            name: name.to_string(),
            value,
        };
        self.envelope(BridgeOperation::SaveData, request).await
    }

    pub async fn load_data(&self, name: &str) -> Envelope {
        let request = BridgeRequest::LoadData { name: name.to_string() };
        self.envelope(BridgeOperation::LoadData, request).await
    }

    pub async fn get_app_version(&self) -> Result<String, BridgeError> {
        match self.transport.send(BridgeRequest::GetAppVersion).await? {
            BridgeResponse::Version(version) => Ok(version),
            BridgeResponse::Envelope(envelope) => Err(envelope.error.unwrap_or_else(|| {
                unexpected_response(BridgeOperation::GetAppVersion)
            })),
        }
    }

    async fn envelope(&self, operation: BridgeOperation, request: BridgeRequest) -> Envelope {
        match self.transport.send(request).await {
            Ok(BridgeResponse::Envelope(envelope)) => envelope,
            Ok(BridgeResponse::Version(_)) => Envelope::failed(unexpected_response(operation)),
            Err(error) => Envelope::failed(error),
        }
    }
}

fn unexpected_response(operation: BridgeOperation) -> BridgeError {
    BridgeError::new(
        ErrorKind::Internal,
        format!("Unexpected response shape for {}", operation.as_str()),
    )
}
