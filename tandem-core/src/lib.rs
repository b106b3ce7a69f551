pub mod model;

pub use model::{ClientId, ErrorKind, IceServerConfig, RoomId, SignalMessage};
