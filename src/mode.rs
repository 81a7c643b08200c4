//! Guards against loading the mock and a real client in the same process.

use std::sync::OnceLock;

use crate::error::{Result, SpreedlyError};

pub const MOCK: &str = "mock";
pub const REAL: &str = "real";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    Mock,
    Real,
}

impl ClientMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => MOCK,
            Self::Real => REAL,
        }
    }
}

static ACTIVE_MODE: OnceLock<ClientMode> = OnceLock::new();

/// Claims the process for `mode`. The first caller wins; later calls for the
/// same mode succeed, calls for the other mode fail.
pub fn activate(mode: ClientMode) -> Result<()> {
    let active = *ACTIVE_MODE.get_or_init(|| mode);
    match (active, mode) {
        (a, m) if a == m => Ok(()),
        (ClientMode::Real, ClientMode::Mock) => Err(SpreedlyError::RealClientActive),
        _ => Err(SpreedlyError::MockClientActive),
    }
}

pub fn active() -> Option<ClientMode> {
    ACTIVE_MODE.get().copied()
}
