use std::collections::HashMap;

use rand::{thread_rng, Rng};
use tokio::time::{sleep, Duration, Instant};

use crate::channel::membership_group::{GroupRequest, GroupSender};
use crate::channel::transition::{ShutdownReceiver, ShutdownSender};
use crate::channel::transport::{TransportRequest, TransportSender};
use crate::membership::group::GroupMember;
use crate::membership::message::Message;
use crate::membership::Epoch;
use crate::node::{Id, Node};
use crate::{error, info, warn};

pub struct FailureDetector {
    node: Node,
    protocol_period: Duration,
    suspicion_period: Duration,
    suspected: HashMap<Id, (Epoch, Instant)>,
    group: GroupSender,
    transport: TransportSender,
    shutdown: Option<ShutdownReceiver>,
}

impl FailureDetector {
    pub async fn init(
        node: Node,
        protocol_period: Duration,
        suspicion_period: Duration,
        group: GroupSender,
        transport: TransportSender,
        shutdown: ShutdownSender,
    ) -> FailureDetector {
        let suspected = HashMap::with_capacity(10);
        let shutdown = Some(shutdown.subscribe());

        info!("initialized!");

        FailureDetector {
            node,
            protocol_period,
            suspicion_period,
            suspected,
            group,
            transport,
            shutdown,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut shutdown = match self.shutdown.take() {
            Some(shutdown) => shutdown,
            None => return Err(Box::from("shutdown signal already consumed!")),
        };

        info!("running...");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("shutting down...");

                    break
                }
                result = self.probe() => {
                    match result {
                        Ok(()) => info!("probe cycle complete!"),
                        Err(error) => error!("probe cycle -> {:?}", error),
                    }
                }
            }
        }

        Ok(())
    }

    async fn probe(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        sleep(self.protocol_period).await;

        self.sweep_suspicions().await?;

        let peers = GroupRequest::peers(&self.group).await?;

        if peers.is_empty() {
            return Ok(());
        }

        let target = {
            let mut rng = thread_rng();

            peers[rng.gen_range(0..peers.len())]
        };

        let epoch = GroupRequest::local_epoch(&self.group).await?;
        let ping = Message::Ping {
            sender: self.node,
            epoch,
        }
        .build()
        .await?;

        match TransportRequest::send_payload(&self.transport, target.session, ping).await {
            Ok(response) if !response.is_empty() => match Message::from_bytes(&response).await {
                Ok(Message::Ack { sender, epoch }) if sender.id == target.node.id => {
                    self.suspected.remove(&target.node.id);

                    GroupRequest::confirm_alive(&self.group, sender.id, epoch).await?;

                    info!("confirmed alive -> {:?}", &sender.id);
                }
                Ok(message) => {
                    warn!("unexpected probe response -> {:?}", message);

                    self.escalate(&target).await?;
                }
                Err(error) => {
                    warn!("undecodable probe response -> {:?}", error);

                    self.escalate(&target).await?;
                }
            },
            Ok(_empty) => {
                warn!("probe timed out -> {:?}", &target.node.id);

                self.escalate(&target).await?;
            }
            Err(error) => {
                warn!("probe failed -> {:?}", error);

                self.escalate(&target).await?;
            }
        }

        Ok(())
    }

    async fn escalate(&mut self, target: &GroupMember) -> Result<(), Box<dyn std::error::Error>> {
        if self.suspected.contains_key(&target.node.id) {
            return Ok(());
        }

        let marked = GroupRequest::mark_suspect(&self.group, target.node.id).await?;

        if let Some(epoch) = marked {
            warn!("marked suspect -> {:?}", &target.node.id);

            self.suspected
                .insert(target.node.id, (epoch, Instant::now()));

            let local_epoch = GroupRequest::local_epoch(&self.group).await?;
            let suspect = Message::Suspect {
                sender_id: self.node.id,
                epoch: local_epoch,
                suspect_id: target.node.id,
            }
            .build()
            .await?;

            self.disseminate(suspect, Some(target.node.id)).await?;
        }

        Ok(())
    }

    async fn sweep_suspicions(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.suspected.is_empty() {
            return Ok(());
        }

        let mut expired = Vec::with_capacity(self.suspected.len());

        for (id, (epoch, since)) in &self.suspected {
            if since.elapsed() >= self.suspicion_period {
                expired.push((*id, *epoch));
            }
        }

        for (id, epoch) in expired {
            self.suspected.remove(&id);

            let removed = GroupRequest::confirm_failure(&self.group, id, epoch).await?;

            if removed {
                let failed_epoch = GroupRequest::increment_epoch(&self.group).await?;

                warn!("confirmed failed -> {:?}", &id);

                let failed = Message::Failed {
                    sender_id: self.node.id,
                    epoch: failed_epoch,
                    failed_id: id,
                }
                .build()
                .await?;

                self.disseminate(failed, None).await?;
            } else {
                info!("suspicion refuted before expiry -> {:?}", &id);
            }
        }

        Ok(())
    }

    async fn disseminate(
        &self,
        payload: Vec<u8>,
        skip: Option<Id>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let peers = GroupRequest::peers(&self.group).await?;

        for peer in peers {
            if skip == Some(peer.node.id) {
                continue;
            }

            if let Err(error) =
                TransportRequest::send_payload(&self.transport, peer.session, payload.to_owned())
                    .await
            {
                warn!("disseminating to {:?} -> {:?}", &peer.node.id, error);
            }
        }

        Ok(())
    }
}
