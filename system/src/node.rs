use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(Uuid);

impl Id {
    pub async fn build() -> Id {
        Id(Uuid::new_v4())
    }

    pub fn version_num(&self) -> usize {
        self.0.get_version_num()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub address: IpAddr,
    pub port: u16,
}

impl Node {
    pub async fn init(address: IpAddr, port: u16) -> Result<Node, Box<dyn std::error::Error>> {
        let id = Id::build().await;

        Ok(Node { id, address, port })
    }

    pub async fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test(flavor = "multi_thread")]
    async fn id() -> Result<(), Box<dyn std::error::Error>> {
        let test_id = Id::build().await;
        let test_other_id = Id::build().await;

        assert_eq!(test_id.version_num(), 4);
        assert_ne!(test_id, test_other_id);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn init() -> Result<(), Box<dyn std::error::Error>> {
        let test_node_address = std::net::IpAddr::from_str("127.0.0.1")?;
        let test_node = Node::init(test_node_address, 9001).await?;

        assert_eq!(test_node.id.version_num(), 4);
        assert_eq!(test_node.address.to_string().as_str(), "127.0.0.1");
        assert_eq!(test_node.port, 9001);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn socket_address() -> Result<(), Box<dyn std::error::Error>> {
        let test_node_address = std::net::IpAddr::from_str("127.0.0.1")?;
        let test_node = Node::init(test_node_address, 9001).await?;
        let test_socket_address = test_node.socket_address().await;

        assert_eq!(&test_socket_address.to_string(), "127.0.0.1:9001");

        Ok(())
    }
}
