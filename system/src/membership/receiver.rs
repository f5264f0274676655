use crate::channel::membership_group::{GroupRequest, GroupSender};
use crate::channel::transition::{ShutdownReceiver, ShutdownSender};
use crate::channel::transport::{InboundReceiver, TransportRequest, TransportSender};
use crate::membership::group::GroupMember;
use crate::membership::message::Message;
use crate::membership::{Epoch, Status};
use crate::node::Node;
use crate::{error, info, warn};

pub struct Receiver {
    node: Node,
    inbound: InboundReceiver,
    group: GroupSender,
    transport: TransportSender,
    shutdown: ShutdownReceiver,
}

impl Receiver {
    pub async fn init(
        node: Node,
        inbound: InboundReceiver,
        group: GroupSender,
        transport: TransportSender,
        shutdown: ShutdownSender,
    ) -> Receiver {
        let shutdown = shutdown.subscribe();

        info!("initialized!");

        Receiver {
            node,
            inbound,
            group,
            transport,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("running...");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    info!("shutting down...");

                    break
                }
                incoming = self.inbound.recv() => {
                    match incoming {
                        Some((payload, response)) => {
                            let reply = match self.process(&payload).await {
                                Ok(reply) => reply,
                                Err(error) => {
                                    error!("processing inbound payload -> {:?}", error);

                                    None
                                }
                            };

                            if response.send(reply).is_err() {
                                warn!("inbound response channel closed...");
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(())
    }

    async fn process(
        &self,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let message = match Message::from_bytes(payload).await {
            Ok(message) => message,
            Err(error) => {
                warn!("dropping malformed payload -> {:?}", error);

                return Ok(None);
            }
        };

        match message {
            Message::Ping { sender, epoch } => {
                info!("received ping -> {:?}", &sender.id);

                if let Err(error) = self.learn(sender, epoch, Status::Unknown).await {
                    warn!("learning sender -> {:?}", error);
                }

                GroupRequest::refute_suspicion(&self.group, sender.id, epoch).await?;

                let acknowledgment = self.acknowledgment().await?;

                Ok(Some(acknowledgment))
            }
            Message::Ack { sender, epoch } => {
                info!("received ack -> {:?}", &sender.id);

                if let Err(error) = self.learn(sender, epoch, Status::Alive).await {
                    warn!("learning sender -> {:?}", error);
                }

                GroupRequest::confirm_alive(&self.group, sender.id, epoch).await?;

                Ok(None)
            }
            Message::Suspect {
                sender_id: _,
                epoch,
                suspect_id,
            } => {
                info!("received suspect -> {:?}", &suspect_id);

                if suspect_id == self.node.id {
                    let refuted_epoch = GroupRequest::increment_epoch(&self.group).await?;

                    warn!("refuting suspicion of local member -> {:?}", &refuted_epoch);

                    let acknowledgment = self.acknowledgment_at(refuted_epoch).await?;

                    Ok(Some(acknowledgment))
                } else {
                    GroupRequest::apply_suspect(&self.group, suspect_id, epoch).await?;

                    Ok(None)
                }
            }
            Message::Failed {
                sender_id: _,
                epoch,
                failed_id,
            } => {
                info!("received failed -> {:?}", &failed_id);

                if failed_id == self.node.id {
                    let refuted_epoch = GroupRequest::increment_epoch(&self.group).await?;

                    warn!(
                        "failure notification names local member! refuting -> {:?}",
                        &refuted_epoch,
                    );

                    Ok(None)
                } else {
                    GroupRequest::apply_failure(&self.group, failed_id, epoch).await?;

                    Ok(None)
                }
            }
        }
    }

    async fn learn(
        &self,
        sender: Node,
        epoch: Epoch,
        status: Status,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if sender.id == self.node.id {
            return Ok(());
        }

        if GroupRequest::get_member(&self.group, sender.id).await?.is_some() {
            return Ok(());
        }

        let session =
            TransportRequest::connect_peer(&self.transport, sender.address, sender.port).await?;
        let member = GroupMember::init(sender, status, epoch, session).await;

        GroupRequest::add_member(&self.group, member).await?;

        info!("learned member -> {:?}", &sender.id);

        Ok(())
    }

    async fn acknowledgment(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let epoch = GroupRequest::local_epoch(&self.group).await?;

        self.acknowledgment_at(epoch).await
    }

    async fn acknowledgment_at(&self, epoch: Epoch) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Message::Ack {
            sender: self.node,
            epoch,
        }
        .build()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::transition::Shutdown;
    use crate::membership::group::Group;
    use crate::node::Id;
    use std::net::IpAddr;
    use std::str::FromStr;
    use tokio::sync::oneshot;
    use tokio::time::{sleep, Duration};

    async fn launch_harness(
        port: u16,
    ) -> Result<
        (Node, GroupSender, crate::channel::transport::InboundSender),
        Box<dyn std::error::Error>,
    > {
        let test_address = IpAddr::from_str("127.0.0.1")?;
        let test_node = Node::init(test_address, port).await?;

        let (test_transport_sender, test_transport_receiver) = TransportRequest::build().await;
        let mut test_transport =
            crate::transport::Transport::init(Duration::from_millis(100), test_transport_receiver)
                .await?;

        tokio::spawn(async move {
            if let Err(error) = test_transport.run().await {
                println!("test transport -> {:?}", error);
            }
        });

        let (test_group_sender, test_group_receiver) = GroupRequest::build().await;
        let mut test_group = Group::init(test_node, test_group_receiver).await?;

        tokio::spawn(async move {
            if let Err(error) = test_group.run().await {
                println!("test group -> {:?}", error);
            }
        });

        let (test_inbound_sender, test_inbound_receiver) = TransportRequest::build_inbound().await;
        let test_shutdown_signal = Shutdown::build().await;

        let test_session = TransportRequest::bind_server(
            &test_transport_sender,
            test_address,
            port,
            test_inbound_sender.to_owned(),
        )
        .await?;

        GroupRequest::register_local(&test_group_sender, test_session).await?;

        let mut test_receiver = Receiver::init(
            test_node,
            test_inbound_receiver,
            test_group_sender.to_owned(),
            test_transport_sender,
            test_shutdown_signal,
        )
        .await;

        tokio::spawn(async move {
            if let Err(error) = test_receiver.run().await {
                println!("test receiver -> {:?}", error);
            }
        });

        sleep(Duration::from_millis(50)).await;

        Ok((test_node, test_group_sender, test_inbound_sender))
    }

    async fn deliver(
        inbound: &crate::channel::transport::InboundSender,
        payload: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let (test_request, test_response) = oneshot::channel();

        inbound.send((payload, test_request)).await?;

        Ok(test_response.await?)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ping_learns_sender_and_acknowledges() -> Result<(), Box<dyn std::error::Error>> {
        let (test_node, test_group_sender, test_inbound_sender) = launch_harness(28001).await?;
        let (_test_peer_node, _test_peer_group_sender, _test_peer_inbound_sender) =
            launch_harness(28002).await?;

        let test_peer_address = IpAddr::from_str("127.0.0.1")?;
        let test_sender_node = Node::init(test_peer_address, 28002).await?;
        let test_ping = Message::Ping {
            sender: test_sender_node,
            epoch: Epoch::init().await,
        }
        .build()
        .await?;

        let test_reply = deliver(&test_inbound_sender, test_ping).await?;

        assert!(test_reply.is_some());

        match Message::from_bytes(&test_reply.unwrap()).await? {
            Message::Ack { sender, epoch } => {
                assert_eq!(sender.id, test_node.id);
                assert_eq!(epoch.version(), 0);
            }
            _ => panic!("expected an acknowledgment!"),
        }

        let test_member =
            GroupRequest::get_member(&test_group_sender, test_sender_node.id).await?;

        assert!(test_member.is_some());
        assert_eq!(test_member.unwrap().status, Status::Unknown);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_payload_dropped() -> Result<(), Box<dyn std::error::Error>> {
        let (_test_node, test_group_sender, test_inbound_sender) = launch_harness(28003).await?;

        let test_reply = deliver(&test_inbound_sender, b"not a protocol message!".to_vec()).await?;

        assert!(test_reply.is_none());

        let test_members = GroupRequest::members(&test_group_sender).await?;

        assert_eq!(test_members.len(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn suspect_of_local_member_refutes() -> Result<(), Box<dyn std::error::Error>> {
        let (test_node, test_group_sender, test_inbound_sender) = launch_harness(28004).await?;

        let test_suspect = Message::Suspect {
            sender_id: Id::build().await,
            epoch: Epoch::init().await,
            suspect_id: test_node.id,
        }
        .build()
        .await?;

        let test_reply = deliver(&test_inbound_sender, test_suspect).await?;

        assert!(test_reply.is_some());

        match Message::from_bytes(&test_reply.unwrap()).await? {
            Message::Ack { sender, epoch } => {
                assert_eq!(sender.id, test_node.id);
                assert_eq!(epoch.version(), 1);
            }
            _ => panic!("expected an acknowledgment!"),
        }

        let test_local_epoch = GroupRequest::local_epoch(&test_group_sender).await?;

        assert_eq!(test_local_epoch.version(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_gossip_removes_member() -> Result<(), Box<dyn std::error::Error>> {
        let (_test_node, test_group_sender, test_inbound_sender) = launch_harness(28005).await?;

        let test_peer_address = IpAddr::from_str("127.0.0.1")?;
        let test_failed_node = Node::init(test_peer_address, 28006).await?;
        let test_member = GroupMember::init(
            test_failed_node,
            Status::Alive,
            Epoch::init().await,
            uuid::Uuid::new_v4(),
        )
        .await;

        GroupRequest::add_member(&test_group_sender, test_member).await?;

        let test_failed = Message::Failed {
            sender_id: Id::build().await,
            epoch: Epoch::init().await.next().await,
            failed_id: test_failed_node.id,
        }
        .build()
        .await?;

        let test_reply = deliver(&test_inbound_sender, test_failed.to_owned()).await?;

        assert!(test_reply.is_none());

        let test_member =
            GroupRequest::get_member(&test_group_sender, test_failed_node.id).await?;

        assert!(test_member.is_none());

        let test_duplicate_reply = deliver(&test_inbound_sender, test_failed).await?;

        assert!(test_duplicate_reply.is_none());

        Ok(())
    }
}
