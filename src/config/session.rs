//! Session identity attached to every backend request.

use uuid::Uuid;

/// Originator tag sent with every request.
pub const ORIGINATOR: &str = "tycho_cli_rs";

/// One logical conversation session: a stable identifier plus the model
/// driving it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub model: String,
}

impl Session {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            model: model.into(),
        }
    }

    /// Header values identifying this session: originator, crate version,
    /// session id.
    pub fn header_values(&self) -> [(&'static str, String); 3] {
        [
            ("originator", ORIGINATOR.to_string()),
            ("version", env!("CARGO_PKG_VERSION").to_string()),
            ("session_id", self.id.clone()),
        ]
    }
}
