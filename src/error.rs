use thiserror::Error as ThisError;

use crate::instance_lock::InstanceLockError;

#[derive(ThisError, Debug)]
pub enum AlarmError {
    #[error("Invalid enable flag contents: {0:?}")]
    InvalidFlag(String),

    #[error("No route for topic: {0}")]
    UnknownTopic(String),

    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),

    #[error(transparent)]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AlarmError>;
