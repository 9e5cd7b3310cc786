use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("heading level must be between 1 and 6 (received {0})")]
    OutOfRange(u8),
}
