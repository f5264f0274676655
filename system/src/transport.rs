use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use crate::channel::transition::{Shutdown, ShutdownReceiver, ShutdownSender};
use crate::channel::transport::{
    InboundSender, TransportReceiver, TransportRequest, TransportResponse,
};
use crate::{error, info, warn};

pub const MAXIMUM_FRAME_SIZE: usize = 1024 * 1024;

struct ServerMetadata {
    address: IpAddr,
    port: u16,
    client: TcpStream,
    listener: Option<JoinHandle<()>>,
    listener_shutdown: Option<ShutdownSender>,
}

pub struct Transport {
    response_grace: Duration,
    active_servers: HashMap<Uuid, ServerMetadata>,
    receiver: TransportReceiver,
}

impl Transport {
    pub async fn init(
        response_grace: Duration,
        receiver: TransportReceiver,
    ) -> Result<Transport, Box<dyn std::error::Error>> {
        let active_servers = HashMap::with_capacity(10);

        info!("initialized!");

        Ok(Transport {
            response_grace,
            active_servers,
            receiver,
        })
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("running...");

        while let Some((request, response)) = self.receiver.recv().await {
            match request {
                TransportRequest::BindServer(address, port, inbound) => {
                    match self.bind_server(address, port, inbound).await {
                        Ok(session) => response.send(TransportResponse::Session(session))?,
                        Err(error) => {
                            error!("bind server -> {:?}", error);

                            response.send(TransportResponse::Failed(error.to_string()))?;
                        }
                    }
                }
                TransportRequest::ConnectPeer(address, port) => {
                    match self.connect_peer(address, port).await {
                        Ok(session) => response.send(TransportResponse::Session(session))?,
                        Err(error) => {
                            warn!("connect peer -> {:?}", error);

                            response.send(TransportResponse::Failed(error.to_string()))?;
                        }
                    }
                }
                TransportRequest::SendPayload(session, payload) => {
                    match self.send_payload(session, &payload).await {
                        Ok(payload) => response.send(TransportResponse::Payload(payload))?,
                        Err(error) => {
                            warn!("send payload -> {:?}", error);

                            response.send(TransportResponse::Failed(error.to_string()))?;
                        }
                    }
                }
                TransportRequest::StopServer(session) => {
                    match self.stop_server(session).await {
                        Ok(()) => response.send(TransportResponse::Stopped)?,
                        Err(error) => {
                            warn!("stop server -> {:?}", error);

                            response.send(TransportResponse::Failed(error.to_string()))?;
                        }
                    }
                }
                TransportRequest::Shutdown => {
                    info!("shutting down...");

                    self.shutdown_servers().await;
                    self.receiver.close();
                }
            }
        }

        Ok(())
    }

    async fn bind_server(
        &mut self,
        address: IpAddr,
        port: u16,
        inbound: InboundSender,
    ) -> Result<Uuid, Box<dyn std::error::Error>> {
        let mut stale_session = None;

        for (session, server) in &self.active_servers {
            if server.address == address && server.port == port {
                match &server.listener {
                    Some(listener) if !listener.is_finished() => {
                        info!("rebinding open server -> {:?}", session);

                        return Ok(*session);
                    }
                    Some(_) => {
                        stale_session = Some(*session);

                        break;
                    }
                    None => (),
                }
            }
        }

        if let Some(session) = stale_session {
            warn!("replacing stale server registration -> {:?}", &session);

            self.stop_server(session).await?;
        }

        let socket_address = SocketAddr::new(address, port);
        let tcp_socket = build_tcp_socket(&address).await?;

        tcp_socket.set_reuseaddr(true)?;
        tcp_socket.bind(socket_address)?;

        let backlog = 1024;
        let tcp_listener = tcp_socket.listen(backlog)?;

        info!("server ready to accept requests on {:?}", &socket_address);

        let listener_shutdown = Shutdown::build().await;
        let accept_shutdown = listener_shutdown.to_owned();
        let accept_stop = listener_shutdown.subscribe();

        let listener = tokio::spawn(async move {
            if let Err(error) =
                Transport::listen(tcp_listener, inbound, accept_shutdown, accept_stop).await
            {
                error!("transport listener -> {:?}", error);
            }
        });

        let client = TcpStream::connect(socket_address).await?;

        client.set_nodelay(true)?;

        let session = Uuid::new_v4();
        let server = ServerMetadata {
            address,
            port,
            client,
            listener: Some(listener),
            listener_shutdown: Some(listener_shutdown),
        };

        self.active_servers.insert(session, server);

        Ok(session)
    }

    async fn connect_peer(
        &mut self,
        address: IpAddr,
        port: u16,
    ) -> Result<Uuid, Box<dyn std::error::Error>> {
        let socket_address = SocketAddr::new(address, port);
        let client = TcpStream::connect(socket_address).await?;

        client.set_nodelay(true)?;

        info!("connected to peer -> {:?}", &socket_address);

        let session = Uuid::new_v4();
        let server = ServerMetadata {
            address,
            port,
            client,
            listener: None,
            listener_shutdown: None,
        };

        self.active_servers.insert(session, server);

        Ok(session)
    }

    async fn send_payload(
        &mut self,
        session: Uuid,
        payload: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let response_grace = self.response_grace;

        let server = match self.active_servers.get_mut(&session) {
            Some(server) => server,
            None => {
                return Err(Box::from(format!(
                    "no active server for session -> {:?}",
                    session,
                )))
            }
        };

        Transport::write_frame(&mut server.client, payload).await?;

        match timeout(response_grace, Transport::read_frame(&mut server.client)).await {
            Ok(Ok(Some(response))) => Ok(response),
            Ok(Ok(None)) => {
                info!("peer closed session -> {:?}", &session);

                Ok(Vec::with_capacity(0))
            }
            Ok(Err(error)) => Err(error),
            Err(_elapsed) => {
                warn!("response grace period elapsed for session -> {:?}", &session);

                Ok(Vec::with_capacity(0))
            }
        }
    }

    async fn stop_server(&mut self, session: Uuid) -> Result<(), Box<dyn std::error::Error>> {
        let server = match self.active_servers.remove(&session) {
            Some(server) => server,
            None => {
                return Err(Box::from(format!(
                    "no active server for session -> {:?}",
                    session,
                )))
            }
        };

        if let Some(listener_shutdown) = &server.listener_shutdown {
            if listener_shutdown.send(Shutdown::Run).is_err() {
                info!("listener already stopped -> {:?}", &session);
            }
        }

        if let Some(listener) = server.listener {
            if let Err(error) = listener.await {
                warn!("awaiting listener -> {:?}", error);
            }
        }

        drop(server.client);

        info!("stopped server -> {:?}", &session);

        Ok(())
    }

    async fn shutdown_servers(&mut self) {
        let mut sessions = Vec::with_capacity(self.active_servers.len());

        for session in self.active_servers.keys() {
            sessions.push(*session);
        }

        for session in sessions {
            if let Err(error) = self.stop_server(session).await {
                warn!("stopping server -> {:?}", error);
            }
        }
    }

    async fn listen(
        tcp_listener: TcpListener,
        inbound: InboundSender,
        shutdown: ShutdownSender,
        mut stop: ShutdownReceiver,
    ) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            tokio::select! {
                biased;
                _ = stop.recv() => {
                    info!("shutting down listener...");

                    break
                }
                result = tcp_listener.accept() => {
                    match result {
                        Ok((tcp_stream, peer_address)) => {
                            info!("accepted connection -> {:?}", &peer_address);

                            if let Err(error) = tcp_stream.set_nodelay(true) {
                                warn!("setting nodelay -> {:?}", error);
                            }

                            let connection_inbound = inbound.to_owned();
                            let mut connection_stop = shutdown.subscribe();

                            tokio::spawn(async move {
                                if let Err(error) = Transport::service(
                                    tcp_stream,
                                    connection_inbound,
                                    &mut connection_stop,
                                )
                                .await
                                {
                                    error!("transport connection -> {:?}", error);
                                }
                            });
                        }
                        Err(error) => error!("accepting connection -> {:?}", error),
                    }
                }
            }
        }

        Ok(())
    }

    async fn service(
        mut tcp_stream: TcpStream,
        inbound: InboundSender,
        stop: &mut ShutdownReceiver,
    ) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            tokio::select! {
                biased;
                _ = stop.recv() => {
                    info!("closing connection...");

                    break
                }
                result = Transport::read_frame(&mut tcp_stream) => {
                    match result {
                        Ok(Some(payload)) => {
                            match Transport::handle_payload(&inbound, payload).await {
                                Some(reply) => {
                                    Transport::write_frame(&mut tcp_stream, &reply).await?;
                                }
                                None => {
                                    let acknowledgment = Transport::timestamp().await?;

                                    Transport::write_frame(
                                        &mut tcp_stream,
                                        acknowledgment.as_bytes(),
                                    )
                                    .await?;
                                }
                            }
                        }
                        Ok(None) => {
                            info!("peer closed connection...");

                            break
                        }
                        Err(error) => {
                            error!("reading frame -> {:?}", error);

                            break
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_payload(inbound: &InboundSender, payload: Vec<u8>) -> Option<Vec<u8>> {
        let (request, response) = oneshot::channel();

        if let Err(error) = inbound.send((payload, request)).await {
            warn!("inbound handler unavailable -> {:?}", error);

            return None;
        }

        match response.await {
            Ok(reply) => reply,
            Err(error) => {
                warn!("inbound handler dropped response -> {:?}", error);

                None
            }
        }
    }

    async fn read_frame(
        tcp_stream: &mut TcpStream,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let mut length_bytes = [0; 4];

        match tcp_stream.read_exact(&mut length_bytes).await {
            Ok(_) => (),
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(error) => return Err(Box::new(error)),
        }

        let length = u32::from_be_bytes(length_bytes) as usize;

        if length > MAXIMUM_FRAME_SIZE {
            return Err(Box::from(format!(
                "frame length {} exceeds maximum {}",
                length, MAXIMUM_FRAME_SIZE,
            )));
        }

        let mut payload = vec![0; length];

        tcp_stream.read_exact(&mut payload).await?;

        Ok(Some(payload))
    }

    async fn write_frame(
        tcp_stream: &mut TcpStream,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let length = u32::try_from(payload.len())?;

        tcp_stream.write_all(&length.to_be_bytes()).await?;
        tcp_stream.write_all(payload).await?;
        tcp_stream.flush().await?;

        Ok(())
    }

    async fn timestamp() -> Result<String, Box<dyn std::error::Error>> {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH)?;

        Ok(since_epoch.as_millis().to_string())
    }
}

async fn build_tcp_socket(address: &IpAddr) -> Result<TcpSocket, Box<dyn std::error::Error>> {
    let tcp_socket = match address {
        IpAddr::V4(_) => TcpSocket::new_v4()?,
        IpAddr::V6(_) => TcpSocket::new_v6()?,
    };

    Ok(tcp_socket)
}
