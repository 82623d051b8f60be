//! Integration-style tests exercising whole delivery cycles and the
//! federated credential exchange against mock endpoints.

#[cfg(test)]
pub mod common;


#[cfg(test)]
mod federated_credentials;
