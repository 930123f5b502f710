//! C3: KEX negotiation and key derivation (§4.3). The actual
//! Diffie-Hellman/ECDH math and the transcript hash are external
//! collaborators (§6) — this module only negotiates which [`KexMethod`]
//! runs, drives it to completion, and derives the six direction keys.

use ssh_proto::transport::KexInit;

use crate::error::{Error, Result};

/// One step of a KEX method's own message exchange (messages 30-49). The
/// concrete curve25519/DH/group-exchange implementation lives outside
/// this crate; `KexDriver` only needs to know when it produced an
/// outbound message and when it's finished.
pub enum KexStep {
    Send(Vec<u8>),
    Done(KexResult),
}

pub struct KexResult {
    pub shared_secret: Vec<u8>,
    pub exchange_hash: Vec<u8>,
    pub host_key_blob: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A pluggable key-exchange algorithm (curve25519-sha256,
/// diffie-hellman-group14-sha256, ...). Implementations own the group
/// math and the transcript hash function named in their `name()`.
pub trait KexMethod: Send {
    fn name(&self) -> &str;

    /// Produces this side's first KEX-specific message.
    fn initiate(&mut self) -> Vec<u8>;

    /// Feeds one inbound KEX-specific message (with its message-type byte
    /// still attached) and advances the method's internal state machine.
    fn process(&mut self, payload: &[u8]) -> Result<KexStep>;

    /// RFC 4253 §7.2 key-derivation PRF: `HASH(K || H || letter ||
    /// session_id)`, extended by chained re-hashing until `len` bytes are
    /// produced. The hash function is the one named by this KEX method.
    fn derive_key(&self, k: &[u8], h: &[u8], letter: u8, session_id: &[u8], len: usize) -> Vec<u8>;
}

/// The six direction keys derived once a KEX round completes (§4.3).
pub struct DerivedKeys {
    pub iv_c2s: Vec<u8>,
    pub iv_s2c: Vec<u8>,
    pub key_c2s: Vec<u8>,
    pub key_s2c: Vec<u8>,
    pub mac_key_c2s: Vec<u8>,
    pub mac_key_s2c: Vec<u8>,
}

pub fn derive_keys(
    method: &dyn KexMethod,
    k: &[u8],
    h: &[u8],
    session_id: &[u8],
    iv_len: usize,
    key_len: usize,
    mac_len: usize,
) -> DerivedKeys {
    DerivedKeys {
        iv_c2s: method.derive_key(k, h, b'A', session_id, iv_len),
        iv_s2c: method.derive_key(k, h, b'B', session_id, iv_len),
        key_c2s: method.derive_key(k, h, b'C', session_id, key_len),
        key_s2c: method.derive_key(k, h, b'D', session_id, key_len),
        mac_key_c2s: method.derive_key(k, h, b'E', session_id, mac_len),
        mac_key_s2c: method.derive_key(k, h, b'F', session_id, mac_len),
    }
}

/// The two OpenSSH pseudo-algorithms appended to every `kex_algorithms`
/// list (§4.3): willingness to exchange `EXT_INFO`, and opt-in to
/// strict-KEX sequence-number semantics.
pub fn ext_info_pseudo_algo(is_client: bool) -> &'static str {
    if is_client { "ext-info-c" } else { "ext-info-s" }
}

pub fn strict_kex_pseudo_algo(is_client: bool) -> &'static str {
    if is_client {
        "kex-strict-c-v00@openssh.com"
    } else {
        "kex-strict-s-v00@openssh.com"
    }
}

/// The outcome of negotiating one `KexInit` exchange (§4.3): the chosen
/// algorithm per category, plus the two extension flags that affect
/// framing rather than crypto.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub kex_algorithm: String,
    pub server_host_key_algorithm: String,
    pub encryption_c2s: String,
    pub encryption_s2c: String,
    pub mac_c2s: String,
    pub mac_s2c: String,
    pub compression_c2s: String,
    pub compression_s2c: String,
    pub peer_supports_ext_info: bool,
    pub strict_kex: bool,
}

/// Negotiates algorithms from a local and peer `KexInit`, client
/// preference wins (§4.3 "algorithm selection"). `local_is_client`
/// decides which namelists are "client to server" vs "server to client"
/// from the local side's point of view — the selection rule itself
/// always walks the client's list looking for the first server match.
pub fn negotiate(local_is_client: bool, local: &KexInit, peer: &KexInit) -> Result<Negotiated> {
    let (client, server) = if local_is_client { (local, peer) } else { (peer, local) };

    let pick = |name: &str, c: &ssh_proto::arch::NameList, s: &ssh_proto::arch::NameList| {
        c.first_match(s)
            .map(str::to_owned)
            .ok_or_else(|| Error::KeyExchangeFailed(format!("no overlap for {name}")))
    };

    let kex_algorithm = pick("kex", &client.kex_algorithms, &server.kex_algorithms)?;
    let server_host_key_algorithm = pick(
        "host key",
        &client.server_host_key_algorithms,
        &server.server_host_key_algorithms,
    )?;
    let encryption_c2s = pick(
        "enc c2s",
        &client.encryption_algorithms_client_to_server,
        &server.encryption_algorithms_client_to_server,
    )?;
    let encryption_s2c = pick(
        "enc s2c",
        &client.encryption_algorithms_server_to_client,
        &server.encryption_algorithms_server_to_client,
    )?;
    let mac_c2s = pick(
        "mac c2s",
        &client.mac_algorithms_client_to_server,
        &server.mac_algorithms_client_to_server,
    )?;
    let mac_s2c = pick(
        "mac s2c",
        &client.mac_algorithms_server_to_client,
        &server.mac_algorithms_server_to_client,
    )?;
    let compression_c2s = pick(
        "cmp c2s",
        &client.compression_algorithms_client_to_server,
        &server.compression_algorithms_client_to_server,
    )?;
    let compression_s2c = pick(
        "cmp s2c",
        &client.compression_algorithms_server_to_client,
        &server.compression_algorithms_server_to_client,
    )?;

    let peer_supports_ext_info = peer
        .kex_algorithms
        .contains(ext_info_pseudo_algo(!local_is_client));
    let strict_kex = local.kex_algorithms.contains(strict_kex_pseudo_algo(local_is_client))
        && peer.kex_algorithms.contains(strict_kex_pseudo_algo(!local_is_client));

    Ok(Negotiated {
        kex_algorithm,
        server_host_key_algorithm,
        encryption_c2s,
        encryption_s2c,
        mac_c2s,
        mac_s2c,
        compression_c2s,
        compression_s2c,
        peer_supports_ext_info,
        strict_kex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssh_proto::arch::NameList;

    fn make(kex: &[&str]) -> KexInit {
        let nl = |v: &[&str]| NameList(v.iter().map(|s| s.to_string()).collect());
        KexInit {
            cookie: [0; 16],
            kex_algorithms: nl(kex),
            server_host_key_algorithms: nl(&["ssh-ed25519"]),
            encryption_algorithms_client_to_server: nl(&["aes128-ctr"]),
            encryption_algorithms_server_to_client: nl(&["aes128-ctr"]),
            mac_algorithms_client_to_server: nl(&["hmac-sha2-256"]),
            mac_algorithms_server_to_client: nl(&["hmac-sha2-256"]),
            compression_algorithms_client_to_server: nl(&["none"]),
            compression_algorithms_server_to_client: nl(&["none"]),
            languages_client_to_server: nl(&[]),
            languages_server_to_client: nl(&[]),
            first_kex_packet_follows: false.into(),
        }
    }

    #[test]
    fn negotiates_first_client_match() {
        let client = make(&["curve25519-sha256", "diffie-hellman-group14-sha256"]);
        let server = make(&["diffie-hellman-group14-sha256", "curve25519-sha256"]);
        let n = negotiate(true, &client, &server).unwrap();
        assert_eq!(n.kex_algorithm, "curve25519-sha256");
    }

    #[test]
    fn no_overlap_is_an_error() {
        let client = make(&["curve25519-sha256"]);
        let server = make(&["diffie-hellman-group14-sha256"]);
        assert!(negotiate(true, &client, &server).is_err());
    }

    #[test]
    fn strict_kex_requires_both_sides() {
        let mut client = make(&["curve25519-sha256", "kex-strict-c-v00@openssh.com"]);
        let server = make(&["curve25519-sha256"]);
        let n = negotiate(true, &client, &server).unwrap();
        assert!(!n.strict_kex);

        client.kex_algorithms.0.push("curve25519-sha256".into());
        let mut server2 = make(&["curve25519-sha256", "kex-strict-s-v00@openssh.com"]);
        server2.kex_algorithms.0.push("curve25519-sha256".into());
        let n2 = negotiate(true, &client, &server2).unwrap();
        assert!(n2.strict_kex);
    }
}
