use crate::db::indices::{ComponentId, ConnectionId};
use crate::geom::coord::GridPos;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("unknown component {0:?}")]
    UnknownComponent(ComponentId),
    #[error("no component named '{0}'")]
    UnknownComponentName(String),
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),
    #[error("connection id {0:?} is already in use")]
    DuplicateConnection(ConnectionId),
    #[error("footprint '{0}' not found in catalog")]
    UnknownFootprint(String),
    #[error("component '{component}' cannot be placed at {anchor}: {reason}")]
    PlacementBlocked {
        component: String,
        anchor: GridPos,
        reason: String,
    },
    #[error("invalid connection {id:?}: {reason}")]
    InvalidConnection { id: ConnectionId, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid project file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize project: {0}")]
    Serialize(#[from] toml::ser::Error),
}
