use serde::{Deserialize, Serialize};

use crate::membership::Epoch;
use crate::node::{Id, Node};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Message {
    Ping {
        sender: Node,
        epoch: Epoch,
    },
    Ack {
        sender: Node,
        epoch: Epoch,
    },
    Suspect {
        sender_id: Id,
        epoch: Epoch,
        suspect_id: Id,
    },
    Failed {
        sender_id: Id,
        epoch: Epoch,
        failed_id: Id,
    },
}

impl Message {
    pub async fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let bytes = postcard::to_allocvec(self)?;

        Ok(bytes)
    }

    pub async fn from_bytes(bytes: &[u8]) -> Result<Message, Box<dyn std::error::Error>> {
        let message = postcard::from_bytes::<Message>(bytes)?;

        Ok(message)
    }

    pub async fn sender_id(&self) -> Id {
        match self {
            Message::Ping { sender, .. } => sender.id,
            Message::Ack { sender, .. } => sender.id,
            Message::Suspect { sender_id, .. } => *sender_id,
            Message::Failed { sender_id, .. } => *sender_id,
        }
    }

    pub async fn epoch(&self) -> Epoch {
        match self {
            Message::Ping { epoch, .. } => *epoch,
            Message::Ack { epoch, .. } => *epoch,
            Message::Suspect { epoch, .. } => *epoch,
            Message::Failed { epoch, .. } => *epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    async fn build_node(port: u16) -> Result<Node, Box<dyn std::error::Error>> {
        let address = std::net::IpAddr::from_str("127.0.0.1")?;

        Node::init(address, port).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_ping() -> Result<(), Box<dyn std::error::Error>> {
        let test_node = build_node(9001).await?;
        let test_message = Message::Ping {
            sender: test_node,
            epoch: Epoch::init().await,
        };

        let test_bytes = test_message.build().await?;
        let test_decoded = Message::from_bytes(&test_bytes).await?;

        assert_eq!(test_decoded, test_message);
        assert_eq!(test_decoded.sender_id().await, test_node.id);
        assert_eq!(test_decoded.epoch().await.version(), 0);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_ack() -> Result<(), Box<dyn std::error::Error>> {
        let test_node = build_node(9002).await?;
        let test_message = Message::Ack {
            sender: test_node,
            epoch: Epoch::init().await.next().await,
        };

        let test_bytes = test_message.build().await?;
        let test_decoded = Message::from_bytes(&test_bytes).await?;

        assert_eq!(test_decoded, test_message);
        assert_eq!(test_decoded.epoch().await.version(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_suspect() -> Result<(), Box<dyn std::error::Error>> {
        let test_sender_id = Id::build().await;
        let test_suspect_id = Id::build().await;
        let test_message = Message::Suspect {
            sender_id: test_sender_id,
            epoch: Epoch::init().await,
            suspect_id: test_suspect_id,
        };

        let test_bytes = test_message.build().await?;
        let test_decoded = Message::from_bytes(&test_bytes).await?;

        assert_eq!(test_decoded, test_message);
        assert_eq!(test_decoded.sender_id().await, test_sender_id);
        assert_ne!(test_decoded.sender_id().await, test_suspect_id);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_failed() -> Result<(), Box<dyn std::error::Error>> {
        let test_sender_id = Id::build().await;
        let test_failed_id = Id::build().await;
        let test_message = Message::Failed {
            sender_id: test_sender_id,
            epoch: Epoch::init().await.next().await,
            failed_id: test_failed_id,
        };

        let test_bytes = test_message.build().await?;
        let test_decoded = Message::from_bytes(&test_bytes).await?;

        assert_eq!(test_decoded, test_message);
        assert_eq!(test_decoded.sender_id().await, test_sender_id);
        assert_eq!(test_decoded.epoch().await.version(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn from_malformed_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let test_bytes = b"something unexpected!";
        let test_decoded = Message::from_bytes(test_bytes).await;

        assert!(test_decoded.is_err());

        Ok(())
    }
}
