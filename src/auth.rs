use crate::{common::AuthMethod, config::ServerConfig};
use std::collections::HashSet;

/// Per-session authentication driver.
///
/// Picks the negotiated method out of the peer's offer and verifies
/// username/password credentials against the configured ones.
pub struct FerryAuthenticator {
    required_method: AuthMethod,
    username: Vec<u8>,
    password: Vec<u8>,
    selected_method: Option<AuthMethod>,
}

impl FerryAuthenticator {
    pub fn new(config: &ServerConfig) -> FerryAuthenticator {
        FerryAuthenticator {
            required_method: config.auth_method(),
            username: config.username().as_bytes().to_vec(),
            password: config.password().as_bytes().to_vec(),
            selected_method: None,
        }
    }

    /// The server insists on exactly one method. Negotiation succeeds
    /// only when the peer has offered it.
    pub fn select_auth_method(&mut self, peer_methods: &HashSet<AuthMethod>) -> Option<AuthMethod> {
        self.selected_method = peer_methods.contains(&self.required_method).then_some(self.required_method);
        self.selected_method
    }

    pub fn current_method(&self) -> Option<AuthMethod> {
        self.selected_method
    }

    /// Credentials match by byte equality.
    pub fn verify_credentials(&self, username: &[u8], password: &[u8]) -> bool {
        self.username == username && self.password == password
    }
}
