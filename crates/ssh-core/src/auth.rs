//! C4: user authentication (§4.4). Policy decisions (does this password
//! match, is this public key authorized...) are external collaborators;
//! this module owns method sequencing and the trivial-auth guard.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::error::{Error, Result};

/// One keyboard-interactive prompt (§4.4).
#[derive(Debug, Clone)]
pub struct KbdIntPrompt {
    pub text: String,
    pub echo: bool,
}

#[derive(Debug, Clone)]
pub struct KbdIntChallenge {
    pub name: String,
    pub instructions: String,
    pub prompts: Vec<KbdIntPrompt>,
}

/// Server-side authentication policy (§4.4, §6). Every method is async
/// because a real implementation may check a database, shell out to PAM,
/// or call a GSS library; a synchronous policy can simply return an
/// already-ready future.
#[async_trait]
pub trait AuthPolicy: Send + Sync {
    async fn validate_password(&self, username: &str, password: &str) -> bool {
        let _ = (username, password);
        false
    }

    /// Returning `true` here only means the key is authorized for this
    /// user; the signature itself is verified separately via
    /// [`crate::pubkey::PublicKey::verify`].
    async fn validate_public_key(&self, username: &str, key_type: &str, blob: &[u8]) -> bool {
        let _ = (username, key_type, blob);
        false
    }

    async fn get_kbdint_challenge(&self, username: &str) -> Option<KbdIntChallenge> {
        let _ = username;
        None
    }

    async fn validate_kbdint_response(&self, username: &str, responses: &[String]) -> bool {
        let _ = (username, responses);
        false
    }

    async fn validate_gss_principal(&self, username: &str, principal: &str) -> bool {
        let _ = (username, principal);
        false
    }

    /// Called when the requested username changes mid-session, letting a
    /// server re-evaluate `Match`-style configuration (§4.4).
    async fn reload_config(&self, username: &str) {
        let _ = username;
    }
}

/// Client-side policy: supplies credentials and answers interactive
/// prompts (§6).
#[async_trait]
pub trait ClientAuthPolicy: Send + Sync {
    async fn password(&self, username: &str) -> Option<String> {
        let _ = username;
        None
    }

    async fn change_password(&self, username: &str, prompt: &str) -> Option<String> {
        let _ = (username, prompt);
        None
    }

    async fn answer_kbdint(&self, challenge: &KbdIntChallenge) -> Vec<String> {
        vec![String::new(); challenge.prompts.len()]
    }
}

/// Outcome of processing one inbound message in the client auth state
/// machine.
pub enum ClientAuthStep {
    /// Emit this payload (a fully framed message body, type byte
    /// included) and keep waiting.
    Send(Vec<u8>),
    /// Authentication finished; `trivial` is true iff the only method
    /// that ran was `none` (§4.4 trivial-auth guard).
    Success { trivial: bool },
    /// All candidate methods exhausted.
    Exhausted,
}

/// Drives the client side of §4.4's method-sequencing state machine.
/// Construction seeds the candidate queue from the configured preference
/// order; `none` is always tried first to learn the server's allowed
/// method list.
pub struct ClientAuthDriver {
    username: String,
    candidates: VecDeque<String>,
    attempted_non_trivial: bool,
    disable_trivial_auth: bool,
}

impl ClientAuthDriver {
    pub fn new(username: &str, preferred: &[String], disable_trivial_auth: bool) -> Self {
        let mut candidates = VecDeque::new();
        candidates.push_back("none".to_owned());
        candidates.extend(preferred.iter().cloned());
        ClientAuthDriver {
            username: username.to_owned(),
            candidates,
            attempted_non_trivial: false,
            disable_trivial_auth,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The next method to try, or `None` if the queue is empty.
    pub fn next_method(&mut self) -> Option<String> {
        let method = self.candidates.pop_front()?;
        if method != "none" {
            self.attempted_non_trivial = true;
        }
        Some(method)
    }

    /// Called on `USERAUTH_FAILURE`: intersects the server's continuation
    /// list with what's still queued, preserving local preference order
    /// (§4.4).
    pub fn on_failure(&mut self, continue_with: &[String]) {
        let remaining: VecDeque<String> =
            self.candidates.iter().filter(|m| continue_with.iter().any(|c| c == *m)).cloned().collect();
        self.candidates = remaining;
    }

    pub fn on_success(&self) -> Result<ClientAuthStep> {
        if self.disable_trivial_auth && !self.attempted_non_trivial {
            return Err(Error::PermissionDenied);
        }
        Ok(ClientAuthStep::Success { trivial: !self.attempted_non_trivial })
    }

    pub fn is_exhausted(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_tried_first() {
        let mut driver = ClientAuthDriver::new("u", &["publickey".into(), "password".into()], false);
        assert_eq!(driver.next_method().as_deref(), Some("none"));
        assert_eq!(driver.next_method().as_deref(), Some("publickey"));
    }

    #[test]
    fn failure_intersects_continuation_list() {
        let mut driver = ClientAuthDriver::new(
            "u",
            &["publickey".into(), "password".into(), "keyboard-interactive".into()],
            false,
        );
        driver.next_method(); // consumes "none"
        driver.on_failure(&["password".to_owned(), "keyboard-interactive".to_owned()]);
        assert_eq!(driver.next_method().as_deref(), Some("password"));
        assert_eq!(driver.next_method().as_deref(), Some("keyboard-interactive"));
        assert!(driver.is_exhausted());
    }

    #[test]
    fn trivial_auth_guard_rejects_bare_none_success() {
        let driver = ClientAuthDriver::new("u", &["publickey".into()], true);
        assert!(driver.on_success().is_err());
    }

    #[test]
    fn trivial_auth_allowed_when_guard_disabled() {
        let driver = ClientAuthDriver::new("u", &["publickey".into()], false);
        match driver.on_success().unwrap() {
            ClientAuthStep::Success { trivial } => assert!(trivial),
            _ => panic!("expected success"),
        }
    }
}
