use std::fmt;

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::membership::group::GroupMember;
use crate::membership::Epoch;
use crate::node::Id;

pub type GroupReceiver = mpsc::Receiver<(GroupRequest, oneshot::Sender<GroupResponse>)>;
pub type GroupSender = mpsc::Sender<(GroupRequest, oneshot::Sender<GroupResponse>)>;

#[derive(Clone, Debug)]
pub enum GroupRequest {
    RegisterLocal(Uuid),
    AddMember(GroupMember),
    GetMember(Id),
    GetLocal,
    Members,
    Peers,
    ConfirmAlive(Id, Epoch),
    RefuteSuspicion(Id, Epoch),
    MarkSuspect(Id),
    ApplySuspect(Id, Epoch),
    ConfirmFailure(Id, Epoch),
    ApplyFailure(Id, Epoch),
    IncrementEpoch,
    LocalEpoch,
    Shutdown,
}

#[derive(Clone, Debug)]
pub enum GroupResponse {
    Member(Option<GroupMember>),
    Members(Vec<GroupMember>),
    Epoch(Epoch),
    Marked(Option<Epoch>),
    Removed(bool),
    Applied,
}

impl GroupRequest {
    pub async fn build() -> (GroupSender, GroupReceiver) {
        let (group_sender, group_receiver) =
            mpsc::channel::<(GroupRequest, oneshot::Sender<GroupResponse>)>(64);

        (group_sender, group_receiver)
    }

    pub async fn register_local(
        group: &GroupSender,
        session: Uuid,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::RegisterLocal(session), request))
            .await?;

        match response.await? {
            GroupResponse::Applied => Ok(()),
            _ => Err(Box::from("unexpected group register local response!")),
        }
    }

    pub async fn add_member(
        group: &GroupSender,
        member: GroupMember,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::AddMember(member), request))
            .await?;

        match response.await? {
            GroupResponse::Applied => Ok(()),
            _ => Err(Box::from("unexpected group add member response!")),
        }
    }

    pub async fn get_member(
        group: &GroupSender,
        id: Id,
    ) -> Result<Option<GroupMember>, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::GetMember(id), request)).await?;

        match response.await? {
            GroupResponse::Member(member) => Ok(member),
            _ => Err(Box::from("unexpected group get member response!")),
        }
    }

    pub async fn get_local(
        group: &GroupSender,
    ) -> Result<Option<GroupMember>, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::GetLocal, request)).await?;

        match response.await? {
            GroupResponse::Member(member) => Ok(member),
            _ => Err(Box::from("unexpected group get local response!")),
        }
    }

    pub async fn members(
        group: &GroupSender,
    ) -> Result<Vec<GroupMember>, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::Members, request)).await?;

        match response.await? {
            GroupResponse::Members(members) => Ok(members),
            _ => Err(Box::from("unexpected group members response!")),
        }
    }

    pub async fn peers(group: &GroupSender) -> Result<Vec<GroupMember>, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::Peers, request)).await?;

        match response.await? {
            GroupResponse::Members(peers) => Ok(peers),
            _ => Err(Box::from("unexpected group peers response!")),
        }
    }

    pub async fn confirm_alive(
        group: &GroupSender,
        id: Id,
        epoch: Epoch,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::ConfirmAlive(id, epoch), request))
            .await?;

        match response.await? {
            GroupResponse::Applied => Ok(()),
            _ => Err(Box::from("unexpected group confirm alive response!")),
        }
    }

    pub async fn refute_suspicion(
        group: &GroupSender,
        id: Id,
        epoch: Epoch,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::RefuteSuspicion(id, epoch), request))
            .await?;

        match response.await? {
            GroupResponse::Applied => Ok(()),
            _ => Err(Box::from("unexpected group refute suspicion response!")),
        }
    }

    pub async fn mark_suspect(
        group: &GroupSender,
        id: Id,
    ) -> Result<Option<Epoch>, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::MarkSuspect(id), request)).await?;

        match response.await? {
            GroupResponse::Marked(epoch) => Ok(epoch),
            _ => Err(Box::from("unexpected group mark suspect response!")),
        }
    }

    pub async fn apply_suspect(
        group: &GroupSender,
        id: Id,
        epoch: Epoch,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::ApplySuspect(id, epoch), request))
            .await?;

        match response.await? {
            GroupResponse::Applied => Ok(()),
            _ => Err(Box::from("unexpected group apply suspect response!")),
        }
    }

    pub async fn confirm_failure(
        group: &GroupSender,
        id: Id,
        epoch: Epoch,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::ConfirmFailure(id, epoch), request))
            .await?;

        match response.await? {
            GroupResponse::Removed(removed) => Ok(removed),
            _ => Err(Box::from("unexpected group confirm failure response!")),
        }
    }

    pub async fn apply_failure(
        group: &GroupSender,
        id: Id,
        epoch: Epoch,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group
            .send((GroupRequest::ApplyFailure(id, epoch), request))
            .await?;

        match response.await? {
            GroupResponse::Removed(removed) => Ok(removed),
            _ => Err(Box::from("unexpected group apply failure response!")),
        }
    }

    pub async fn increment_epoch(
        group: &GroupSender,
    ) -> Result<Epoch, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::IncrementEpoch, request)).await?;

        match response.await? {
            GroupResponse::Epoch(epoch) => Ok(epoch),
            _ => Err(Box::from("unexpected group increment epoch response!")),
        }
    }

    pub async fn local_epoch(group: &GroupSender) -> Result<Epoch, Box<dyn std::error::Error>> {
        let (request, response) = oneshot::channel();

        group.send((GroupRequest::LocalEpoch, request)).await?;

        match response.await? {
            GroupResponse::Epoch(epoch) => Ok(epoch),
            _ => Err(Box::from("unexpected group local epoch response!")),
        }
    }

    pub async fn shutdown(group: &GroupSender) -> Result<(), Box<dyn std::error::Error>> {
        let (_request, _response) = oneshot::channel();

        group.send((GroupRequest::Shutdown, _request)).await?;

        Ok(())
    }
}

impl fmt::Display for GroupResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group_response = "Group Response |";

        match self {
            GroupResponse::Member(member) => {
                write!(f, "{} member -> {:?}", group_response, member)
            }
            GroupResponse::Members(members) => {
                write!(f, "{} members -> {:?}", group_response, members)
            }
            GroupResponse::Epoch(epoch) => write!(f, "{} epoch -> {:?}", group_response, epoch),
            GroupResponse::Marked(epoch) => write!(f, "{} marked -> {:?}", group_response, epoch),
            GroupResponse::Removed(removed) => {
                write!(f, "{} removed -> {}", group_response, removed)
            }
            GroupResponse::Applied => write!(f, "{} applied", group_response),
        }
    }
}

impl std::error::Error for GroupResponse {}
