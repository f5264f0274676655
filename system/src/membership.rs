use serde::{Deserialize, Serialize};

pub mod failure_detector;
pub mod group;
pub mod message;
pub mod receiver;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Epoch(u64);

impl Epoch {
    pub async fn init() -> Epoch {
        Epoch(0)
    }

    pub async fn next(&self) -> Epoch {
        Epoch(self.0 + 1)
    }

    pub fn version(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Unknown,
    Alive,
    Suspect,
    Dead,
}
