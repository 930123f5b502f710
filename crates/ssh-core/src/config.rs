//! Connection configuration (§6). Plain structs with `Default` impls, the
//! way the teacher's own `ConnectionConfig`/`ClientConfig` are consumed
//! from its CLI — no `serde`, no config-file parsing here.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// An ordered algorithm preference list with the `^`/`+`/`-` override
/// syntax accepted in user-supplied configuration (§6): `^list` prepends
/// to the default, `+list` appends, `-list` removes, anything else
/// replaces the default outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmList(pub Vec<String>);

impl AlgorithmList {
    pub fn apply_override(default: &[&str], spec: &str) -> AlgorithmList {
        let default: Vec<String> = default.iter().map(|s| s.to_string()).collect();
        if let Some(rest) = spec.strip_prefix('^') {
            let mut extra: Vec<String> = rest.split(',').map(str::to_owned).collect();
            extra.retain(|n| !default.contains(n));
            extra.extend(default);
            AlgorithmList(extra)
        } else if let Some(rest) = spec.strip_prefix('+') {
            let mut out = default;
            for name in rest.split(',') {
                if !out.iter().any(|n| n == name) {
                    out.push(name.to_owned());
                }
            }
            AlgorithmList(out)
        } else if let Some(rest) = spec.strip_prefix('-') {
            let remove: Vec<&str> = rest.split(',').collect();
            AlgorithmList(default.into_iter().filter(|n| !remove.contains(&n.as_str())).collect())
        } else {
            AlgorithmList(spec.split(',').map(str::to_owned).collect())
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub role: Role,
    pub software_version: String,

    pub kex_algorithms: AlgorithmList,
    pub server_host_key_algorithms: AlgorithmList,
    pub encryption_algorithms: AlgorithmList,
    pub mac_algorithms: AlgorithmList,
    pub compression_algorithms: AlgorithmList,
    pub signature_algorithms: AlgorithmList,

    pub rekey_bytes: u64,
    pub rekey_interval: Duration,

    pub login_timeout: Option<Duration>,
    pub keepalive_interval: Option<Duration>,
    pub keepalive_count_max: u32,

    pub disable_trivial_auth: bool,
    pub preferred_auth_methods: Vec<String>,

    /// Known peer-identification compatibility quirks (§9): the OpenSSH/
    /// paramiko SFTP SYMLINK argument swap and the Dropbear channel
    /// max-packet off-by-one live in `sftp`/`ssh-core` respectively, keyed
    /// off the banner string this connection observed.
    pub peer_version_string: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            role: Role::Client,
            software_version: "ssh-core_0.1".to_owned(),
            kex_algorithms: AlgorithmList(vec![
                "curve25519-sha256".into(),
                "diffie-hellman-group14-sha256".into(),
            ]),
            server_host_key_algorithms: AlgorithmList(vec![
                "ssh-ed25519".into(),
                "rsa-sha2-512".into(),
                "rsa-sha2-256".into(),
            ]),
            encryption_algorithms: AlgorithmList(vec![
                "chacha20-poly1305@openssh.com".into(),
                "aes128-gcm@openssh.com".into(),
                "aes128-ctr".into(),
            ]),
            mac_algorithms: AlgorithmList(vec!["hmac-sha2-256".into(), "hmac-sha2-512".into()]),
            compression_algorithms: AlgorithmList(vec!["none".into(), "zlib@openssh.com".into()]),
            signature_algorithms: AlgorithmList(vec![
                "rsa-sha2-512".into(),
                "rsa-sha2-256".into(),
                "ssh-ed25519".into(),
            ]),
            rekey_bytes: 1 << 30,
            rekey_interval: Duration::from_secs(3600),
            login_timeout: Some(Duration::from_secs(120)),
            keepalive_interval: None,
            keepalive_count_max: 3,
            disable_trivial_auth: false,
            preferred_auth_methods: vec![
                "publickey".into(),
                "keyboard-interactive".into(),
                "password".into(),
            ],
            peer_version_string: None,
        }
    }
}

impl ConnectionConfig {
    pub fn is_dropbear_peer(&self) -> bool {
        self.peer_version_string
            .as_deref()
            .is_some_and(|v| v.contains("dropbear"))
    }

    pub fn is_symlink_swap_peer(&self) -> bool {
        self.peer_version_string
            .as_deref()
            .is_some_and(|v| v.contains("OpenSSH") || v.contains("paramiko"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_override_keeps_defaults_after_extras() {
        let list = AlgorithmList::apply_override(&["a", "b"], "^z,a");
        assert_eq!(list.0, vec!["z", "a", "b"]);
    }

    #[test]
    fn append_override_skips_existing() {
        let list = AlgorithmList::apply_override(&["a", "b"], "+b,c");
        assert_eq!(list.0, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_override_filters() {
        let list = AlgorithmList::apply_override(&["a", "b", "c"], "-b");
        assert_eq!(list.0, vec!["a", "c"]);
    }

    #[test]
    fn replace_override_ignores_defaults() {
        let list = AlgorithmList::apply_override(&["a", "b"], "x,y");
        assert_eq!(list.0, vec!["x", "y"]);
    }
}
