use thiserror::Error;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The store's lock was poisoned by a panicking writer
    #[error("repository lock poisoned during {0}")]
    Poisoned(&'static str),

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
}
