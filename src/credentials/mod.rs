pub mod federated;
pub mod jwt;

pub use federated::{Credentials, FederatedIdentity};
pub use jwt::{CachedJwt, DeviceConfig};
