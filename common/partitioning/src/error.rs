use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("lease expired or keepalive stream closed")]
    LeaseLost,

    #[error("invalid member identifier: {0}")]
    InvalidMember(String),
}

pub type Result<T> = std::result::Result<T, Error>;
