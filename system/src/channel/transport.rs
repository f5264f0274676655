use std::fmt;
use std::net::IpAddr;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub type TransportReceiver =
    mpsc::Receiver<(TransportRequest, oneshot::Sender<TransportResponse>)>;
pub type TransportSender = mpsc::Sender<(TransportRequest, oneshot::Sender<TransportResponse>)>;

pub type InboundReceiver = mpsc::Receiver<(Vec<u8>, oneshot::Sender<Option<Vec<u8>>>)>;
pub type InboundSender = mpsc::Sender<(Vec<u8>, oneshot::Sender<Option<Vec<u8>>>)>;

#[derive(Debug)]
pub enum TransportRequest {
    BindServer(IpAddr, u16, InboundSender),
    ConnectPeer(IpAddr, u16),
    SendPayload(Uuid, Vec<u8>),
    StopServer(Uuid),
    Shutdown,
}

#[derive(Clone, Debug)]
pub enum TransportResponse {
    Session(Uuid),
    Payload(Vec<u8>),
    Failed(String),
    Stopped,
}

impl TransportRequest {
    pub async fn build() -> (TransportSender, TransportReceiver) {
        let (transport_sender, transport_receiver) =
            mpsc::channel::<(TransportRequest, oneshot::Sender<TransportResponse>)>(64);

        (transport_sender, transport_receiver)
    }

    pub async fn build_inbound() -> (InboundSender, InboundReceiver) {
        let (inbound_sender, inbound_receiver) =
            mpsc::channel::<(Vec<u8>, oneshot::Sender<Option<Vec<u8>>>)>(64);

        (inbound_sender, inbound_receiver)
    }

    pub async fn bind_server(
        transport: &TransportSender,
        address: IpAddr,
        port: u16,
        inbound: InboundSender,
    ) -> Result<Uuid, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        transport
            .send((TransportRequest::BindServer(address, port, inbound), request))
            .await?;

        match response.await? {
            TransportResponse::Session(session) => Ok(session),
            TransportResponse::Failed(error) => Err(Box::from(error)),
            _ => Err(Box::from("unexpected transport bind server response!")),
        }
    }

    pub async fn connect_peer(
        transport: &TransportSender,
        address: IpAddr,
        port: u16,
    ) -> Result<Uuid, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        transport
            .send((TransportRequest::ConnectPeer(address, port), request))
            .await?;

        match response.await? {
            TransportResponse::Session(session) => Ok(session),
            TransportResponse::Failed(error) => Err(Box::from(error)),
            _ => Err(Box::from("unexpected transport connect peer response!")),
        }
    }

    pub async fn send_payload(
        transport: &TransportSender,
        session: Uuid,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        transport
            .send((TransportRequest::SendPayload(session, payload), request))
            .await?;

        match response.await? {
            TransportResponse::Payload(payload) => Ok(payload),
            TransportResponse::Failed(error) => Err(Box::from(error)),
            _ => Err(Box::from("unexpected transport send payload response!")),
        }
    }

    pub async fn stop_server(
        transport: &TransportSender,
        session: Uuid,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        transport
            .send((TransportRequest::StopServer(session), request))
            .await?;

        match response.await? {
            TransportResponse::Stopped => Ok(()),
            TransportResponse::Failed(error) => Err(Box::from(error)),
            _ => Err(Box::from("unexpected transport stop server response!")),
        }
    }

    pub async fn shutdown(transport: &TransportSender) -> Result<(), Box<dyn std::error::Error>> {
        let (_request, _response) = oneshot::channel();

        transport
            .send((TransportRequest::Shutdown, _request))
            .await?;

        Ok(())
    }
}

impl fmt::Display for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transport_response = "Transport Response |";

        match self {
            TransportResponse::Session(session) => {
                write!(f, "{} session -> {:?}", transport_response, session)
            }
            TransportResponse::Payload(payload) => {
                write!(f, "{} payload -> {} bytes", transport_response, payload.len())
            }
            TransportResponse::Failed(error) => {
                write!(f, "{} failed -> {}", transport_response, error)
            }
            TransportResponse::Stopped => write!(f, "{} stopped", transport_response),
        }
    }
}

impl std::error::Error for TransportResponse {}
