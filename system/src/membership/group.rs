use std::collections::HashMap;

use uuid::Uuid;

use crate::channel::membership_group::{GroupReceiver, GroupRequest, GroupResponse};
use crate::membership::{Epoch, Status};
use crate::node::{Id, Node};
use crate::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupMember {
    pub node: Node,
    pub status: Status,
    pub epoch: Epoch,
    pub session: Uuid,
}

impl GroupMember {
    pub async fn init(node: Node, status: Status, epoch: Epoch, session: Uuid) -> GroupMember {
        GroupMember {
            node,
            status,
            epoch,
            session,
        }
    }
}

pub struct Group {
    local: Node,
    members: HashMap<Id, GroupMember>,
    receiver: GroupReceiver,
}

impl Group {
    pub async fn init(local: Node, receiver: GroupReceiver) -> Result<Group, Box<dyn std::error::Error>> {
        let members = HashMap::with_capacity(10);

        info!("initialized!");

        Ok(Group {
            local,
            members,
            receiver,
        })
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("running...");

        while let Some((request, response)) = self.receiver.recv().await {
            match request {
                GroupRequest::RegisterLocal(session) => {
                    self.register_local(session).await;

                    response.send(GroupResponse::Applied)?;
                }
                GroupRequest::AddMember(member) => {
                    self.add_member(member).await;

                    response.send(GroupResponse::Applied)?;
                }
                GroupRequest::GetMember(id) => {
                    let member = self.members.get(&id).copied();

                    response.send(GroupResponse::Member(member))?;
                }
                GroupRequest::GetLocal => {
                    let local = self.members.get(&self.local.id).copied();

                    response.send(GroupResponse::Member(local))?;
                }
                GroupRequest::Members => {
                    let mut members = Vec::with_capacity(self.members.len());

                    for member in self.members.values() {
                        members.push(member.to_owned());
                    }

                    response.send(GroupResponse::Members(members))?;
                }
                GroupRequest::Peers => {
                    let mut peers = Vec::with_capacity(self.members.len());

                    for member in self.members.values() {
                        if member.node.id != self.local.id {
                            peers.push(member.to_owned());
                        }
                    }

                    response.send(GroupResponse::Members(peers))?;
                }
                GroupRequest::ConfirmAlive(id, epoch) => {
                    self.confirm_alive(id, epoch).await;

                    response.send(GroupResponse::Applied)?;
                }
                GroupRequest::RefuteSuspicion(id, epoch) => {
                    self.refute_suspicion(id, epoch).await;

                    response.send(GroupResponse::Applied)?;
                }
                GroupRequest::MarkSuspect(id) => {
                    let marked = self.mark_suspect(id).await;

                    response.send(GroupResponse::Marked(marked))?;
                }
                GroupRequest::ApplySuspect(id, epoch) => {
                    self.apply_suspect(id, epoch).await;

                    response.send(GroupResponse::Applied)?;
                }
                GroupRequest::ConfirmFailure(id, epoch) => {
                    let removed = self.confirm_failure(id, epoch).await;

                    response.send(GroupResponse::Removed(removed))?;
                }
                GroupRequest::ApplyFailure(id, epoch) => {
                    let removed = self.apply_failure(id, epoch).await;

                    response.send(GroupResponse::Removed(removed))?;
                }
                GroupRequest::IncrementEpoch => {
                    let epoch = self.increment_epoch().await;

                    response.send(GroupResponse::Epoch(epoch))?;
                }
                GroupRequest::LocalEpoch => {
                    let epoch = match self.members.get(&self.local.id) {
                        Some(local) => local.epoch,
                        None => Epoch::init().await,
                    };

                    response.send(GroupResponse::Epoch(epoch))?;
                }
                GroupRequest::Shutdown => {
                    info!("shutting down...");

                    self.members.clear();
                    self.receiver.close();
                }
            }
        }

        Ok(())
    }

    async fn register_local(&mut self, session: Uuid) {
        let local = GroupMember::init(self.local, Status::Alive, Epoch::init().await, session).await;

        self.members.insert(self.local.id, local);

        info!("registered local member -> {:?}", &self.local.id);
    }

    async fn add_member(&mut self, member: GroupMember) {
        if let Some(existing) = self.members.get(&member.node.id) {
            if member.epoch < existing.epoch {
                info!("stale member record dropped -> {:?}", &member.node.id);

                return;
            }
        }

        match self.members.insert(member.node.id, member) {
            Some(_) => info!("updated member -> {:?}", &member.node.id),
            None => info!("added member -> {:?}", &member.node.id),
        }
    }

    async fn confirm_alive(&mut self, id: Id, epoch: Epoch) {
        if let Some(member) = self.members.get_mut(&id) {
            if epoch > member.epoch {
                member.epoch = epoch;
                member.status = Status::Alive;
            } else if epoch == member.epoch && member.status != Status::Dead {
                member.status = Status::Alive;
            }
        }
    }

    async fn refute_suspicion(&mut self, id: Id, epoch: Epoch) {
        if let Some(member) = self.members.get_mut(&id) {
            if epoch > member.epoch {
                member.epoch = epoch;
                member.status = Status::Alive;

                info!("refuted suspicion with fresh epoch -> {:?}", &id);
            } else if epoch == member.epoch && member.status == Status::Suspect {
                member.status = Status::Alive;

                info!("refuted suspicion -> {:?}", &id);
            }
        }
    }

    async fn mark_suspect(&mut self, id: Id) -> Option<Epoch> {
        if id == self.local.id {
            warn!("local member cannot be marked suspect!");

            return None;
        }

        match self.members.get_mut(&id) {
            Some(member) if member.status != Status::Dead => {
                member.status = Status::Suspect;

                Some(member.epoch)
            }
            _ => None,
        }
    }

    async fn apply_suspect(&mut self, id: Id, epoch: Epoch) {
        if id == self.local.id {
            return;
        }

        if let Some(member) = self.members.get_mut(&id) {
            if epoch > member.epoch {
                member.epoch = epoch;
                member.status = Status::Suspect;
            } else if epoch == member.epoch && member.status != Status::Dead {
                member.status = Status::Suspect;
            }
        }
    }

    async fn confirm_failure(&mut self, id: Id, epoch: Epoch) -> bool {
        let expired = matches!(
            self.members.get(&id),
            Some(member) if member.status == Status::Suspect && member.epoch == epoch,
        );

        if expired {
            self.members.remove(&id);

            warn!("removed failed member -> {:?}", &id);
        }

        expired
    }

    async fn apply_failure(&mut self, id: Id, epoch: Epoch) -> bool {
        if id == self.local.id {
            warn!("failure notification names the local member!");

            return false;
        }

        let removable = matches!(
            self.members.get(&id),
            Some(member) if member.epoch <= epoch,
        );

        if removable {
            self.members.remove(&id);

            info!("removed member from failure notification -> {:?}", &id);
        }

        removable
    }

    async fn increment_epoch(&mut self) -> Epoch {
        match self.members.get_mut(&self.local.id) {
            Some(local) => {
                let epoch = local.epoch.next().await;

                local.epoch = epoch;

                epoch
            }
            None => Epoch::init().await,
        }
    }
}
