use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TigraError {
    #[error("sensor fault: {0}")]
    SensorFault(String),
    #[error("invalid vehicle geometry: {0}")]
    InvalidGeometry(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("required joint missing: {0:?}")]
    MissingJoint(String),
    #[error("driver failure: {0}")]
    Driver(String),
}

pub type TigraResult<T> = std::result::Result<T, TigraError>;
