use std::net::SocketAddr;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use uuid::Uuid;

use crate::channel::membership_group::{GroupRequest, GroupSender};
use crate::channel::transition::{Shutdown, ShutdownSender};
use crate::channel::transport::{TransportRequest, TransportSender};
use crate::membership::failure_detector::FailureDetector;
use crate::membership::group::{Group, GroupMember};
use crate::membership::message::Message;
use crate::membership::receiver::Receiver;
use crate::membership::{Epoch, Status};
use crate::node::Node;
use crate::transport::Transport;
use crate::{error, info, warn};

pub struct Member {
    node: Node,
    status: Status,
    session: Option<Uuid>,
    protocol_period: Duration,
    suspicion_period: Duration,
    response_grace: Duration,
    transport: Option<TransportSender>,
    group: Option<GroupSender>,
    shutdown: Option<ShutdownSender>,
    tasks: Vec<JoinHandle<()>>,
}

impl Member {
    pub async fn init(
        node: Node,
        protocol_period: Duration,
        suspicion_period: Duration,
        response_grace: Duration,
    ) -> Result<Member, Box<dyn std::error::Error>> {
        let tasks = Vec::with_capacity(4);

        info!("initialized!");

        Ok(Member {
            node,
            status: Status::Unknown,
            session: None,
            protocol_period,
            suspicion_period,
            response_grace,
            transport: None,
            group: None,
            shutdown: None,
            tasks,
        })
    }

    pub fn node(&self) -> Node {
        self.node
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn session(&self) -> Option<Uuid> {
        self.session
    }

    pub async fn launch(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.status {
            Status::Alive => {
                info!("member is already alive! skipping launch...");

                return Ok(());
            }
            Status::Dead => {
                warn!("member has been shut down! skipping launch...");

                return Ok(());
            }
            _ => (),
        }

        let (transport_sender, transport_receiver) = TransportRequest::build().await;
        let mut transport = Transport::init(self.response_grace, transport_receiver).await?;

        self.tasks.push(tokio::spawn(async move {
            if let Err(error) = transport.run().await {
                error!("transport -> {:?}", error);
            }
        }));

        let (group_sender, group_receiver) = GroupRequest::build().await;
        let mut group = Group::init(self.node, group_receiver).await?;

        self.tasks.push(tokio::spawn(async move {
            if let Err(error) = group.run().await {
                error!("membership group -> {:?}", error);
            }
        }));

        let shutdown = Shutdown::build().await;

        let (inbound_sender, inbound_receiver) = TransportRequest::build_inbound().await;
        let session = TransportRequest::bind_server(
            &transport_sender,
            self.node.address,
            self.node.port,
            inbound_sender,
        )
        .await?;

        GroupRequest::register_local(&group_sender, session).await?;

        let mut receiver = Receiver::init(
            self.node,
            inbound_receiver,
            group_sender.to_owned(),
            transport_sender.to_owned(),
            shutdown.to_owned(),
        )
        .await;

        self.tasks.push(tokio::spawn(async move {
            if let Err(error) = receiver.run().await {
                error!("membership receiver -> {:?}", error);
            }
        }));

        let mut failure_detector = FailureDetector::init(
            self.node,
            self.protocol_period,
            self.suspicion_period,
            group_sender.to_owned(),
            transport_sender.to_owned(),
            shutdown.to_owned(),
        )
        .await;

        self.tasks.push(tokio::spawn(async move {
            if let Err(error) = failure_detector.run().await {
                error!("failure detector -> {:?}", error);
            }
        }));

        self.transport = Some(transport_sender);
        self.group = Some(group_sender);
        self.shutdown = Some(shutdown);
        self.session = Some(session);
        self.status = Status::Alive;

        info!("member alive -> {:?}", &self.node.id);

        Ok(())
    }

    pub async fn join(&self, peers: Vec<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
        for peer_address in peers {
            if let Err(error) = self.contact(peer_address).await {
                warn!("joining {:?} -> {:?}", &peer_address, error);
            }
        }

        Ok(())
    }

    async fn contact(&self, peer_address: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
        let transport = self.transport.as_ref().ok_or("member is not alive!")?;
        let group = self.group.as_ref().ok_or("member is not alive!")?;

        let session =
            TransportRequest::connect_peer(transport, peer_address.ip(), peer_address.port())
                .await?;

        let epoch = GroupRequest::local_epoch(group).await?;
        let ping = Message::Ping {
            sender: self.node,
            epoch,
        }
        .build()
        .await?;

        let response = TransportRequest::send_payload(transport, session, ping).await?;

        if response.is_empty() {
            return Err(Box::from("no response from peer!"));
        }

        match Message::from_bytes(&response).await? {
            Message::Ack { sender, epoch } => {
                let member = GroupMember::init(sender, Status::Alive, epoch, session).await;

                GroupRequest::add_member(group, member).await?;

                info!("joined peer -> {:?}", &sender.id);

                Ok(())
            }
            message => Err(Box::from(format!(
                "unexpected join response -> {:?}",
                message,
            ))),
        }
    }

    pub async fn members(&self) -> Result<Vec<GroupMember>, Box<dyn std::error::Error>> {
        let group = self.group.as_ref().ok_or("member is not alive!")?;

        GroupRequest::members(group).await
    }

    pub async fn local_epoch(&self) -> Result<Epoch, Box<dyn std::error::Error>> {
        let group = self.group.as_ref().ok_or("member is not alive!")?;

        GroupRequest::local_epoch(group).await
    }

    pub async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.status {
            Status::Alive => (),
            Status::Dead => {
                info!("member is already shut down! skipping...");

                return Ok(());
            }
            _ => {
                info!("member was never launched! skipping shutdown...");

                return Ok(());
            }
        }

        if let Some(shutdown) = &self.shutdown {
            Shutdown::send(shutdown).await?;
        }

        if let (Some(transport), Some(session)) = (&self.transport, self.session) {
            TransportRequest::stop_server(transport, session).await?;
            TransportRequest::shutdown(transport).await?;
        }

        if let Some(group) = &self.group {
            GroupRequest::shutdown(group).await?;
        }

        for task in self.tasks.drain(..) {
            if let Err(error) = task.await {
                error!("awaiting task -> {:?}", error);
            }
        }

        self.transport = None;
        self.group = None;
        self.shutdown = None;
        self.session = None;
        self.status = Status::Dead;

        info!("member shut down -> {:?}", &self.node.id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::str::FromStr;
    use tokio::time::sleep;

    async fn build_member(port: u16) -> Result<Member, Box<dyn std::error::Error>> {
        let test_address = IpAddr::from_str("127.0.0.1")?;
        let test_node = Node::init(test_address, port).await?;

        Member::init(
            test_node,
            Duration::from_millis(200),
            Duration::from_millis(600),
            Duration::from_millis(100),
        )
        .await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init() -> Result<(), Box<dyn std::error::Error>> {
        let test_member = build_member(27001).await?;

        assert_eq!(test_member.status(), Status::Unknown);
        assert!(test_member.session().is_none());
        assert!(test_member.tasks.is_empty());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn launch_and_shutdown() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_member = build_member(27002).await?;

        test_member.launch().await?;

        assert_eq!(test_member.status(), Status::Alive);
        assert!(test_member.session().is_some());

        let test_members = test_member.members().await?;

        assert_eq!(test_members.len(), 1);

        test_member.shutdown().await?;

        assert_eq!(test_member.status(), Status::Dead);
        assert!(test_member.session().is_none());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn launch_is_reentrant_safe() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_member = build_member(27003).await?;

        test_member.launch().await?;

        let test_session = test_member.session();

        test_member.launch().await?;

        assert_eq!(test_member.session(), test_session);
        assert_eq!(test_member.status(), Status::Alive);

        test_member.shutdown().await?;

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_is_reentrant_safe() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_member = build_member(27004).await?;

        test_member.shutdown().await?;

        assert_eq!(test_member.status(), Status::Unknown);

        test_member.launch().await?;
        test_member.shutdown().await?;
        test_member.shutdown().await?;

        assert_eq!(test_member.status(), Status::Dead);

        test_member.launch().await?;

        assert_eq!(test_member.status(), Status::Dead);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_releases_port() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_member = build_member(27005).await?;

        test_member.launch().await?;
        test_member.shutdown().await?;

        let mut test_rebound_member = build_member(27005).await?;

        test_rebound_member.launch().await?;

        assert_eq!(test_rebound_member.status(), Status::Alive);

        test_rebound_member.shutdown().await?;

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_and_detect_failure() -> Result<(), Box<dyn std::error::Error>> {
        let mut test_member = build_member(27006).await?;
        let mut test_peer_member = build_member(27007).await?;

        test_member.launch().await?;
        test_peer_member.launch().await?;

        let test_peer_address = SocketAddr::from_str("127.0.0.1:27007")?;

        test_member.join(vec![test_peer_address]).await?;

        let test_members = test_member.members().await?;

        assert_eq!(test_members.len(), 2);

        sleep(Duration::from_millis(500)).await;

        test_peer_member.shutdown().await?;

        sleep(Duration::from_millis(3000)).await;

        let test_members = test_member.members().await?;
        let test_peer_id = test_peer_member.node().id;

        assert!(!test_members.iter().any(|member| member.node.id == test_peer_id));

        let test_local_epoch = test_member.local_epoch().await?;

        assert_eq!(test_local_epoch.version(), 1);

        test_member.shutdown().await?;

        Ok(())
    }
}
