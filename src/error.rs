use thiserror::Error;

/// Startup/configuration errors. These abort the server before the first
/// frame; nothing here is recoverable at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("key '{key}' is bound more than once")]
    DuplicateKey { key: String },

    #[error("control flag {flag} has no key bound to it")]
    UnboundFlag { flag: &'static str },

    #[error("no key bound to the reset action")]
    NoResetKey,
}

/// Per-frame step outcome. The frame driver logs these and keeps running;
/// no error here propagates past one frame.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("physics diverged: {bodies} body(ies) left the world bounds, rig was reset")]
    Diverged { bodies: usize },
}
