//! Public-key/signature collaborator interface (§6) and the RSA-SHA2
//! algorithm-selection rule (§4.4) that sits in front of it.

use std::io::Cursor;

use binrw::BinWrite;

use ssh_proto::arch::{Bool, Bytes, Utf8};

/// A key usable for `publickey`/`hostbased` authentication or host-key
/// verification. Signing/verifying is delegated entirely to the
/// implementation; this crate only needs the blob and the algorithm name
/// to build the signature base (§4.4: `session_id || USERAUTH_REQUEST
/// prefix || algorithm || blob`).
pub trait PublicKey: Send + Sync {
    /// The wire algorithm name this key was loaded as (e.g. `ssh-rsa`,
    /// `rsa-sha2-cert-v01@openssh.com`, `ssh-ed25519`).
    fn key_type(&self) -> &str;

    fn blob(&self) -> Vec<u8>;

    /// Signature algorithm names this key can produce, most preferred
    /// first. For a bare or certificate RSA key this is typically
    /// `["rsa-sha2-512", "rsa-sha2-256", "ssh-rsa"]`; for a key type with
    /// only one signature scheme it is a single-element list.
    fn signature_algorithms(&self) -> &[String];

    fn sign(&self, algorithm: &str, data: &[u8]) -> Vec<u8>;

    fn verify(&self, algorithm: &str, data: &[u8], signature: &[u8]) -> bool;
}

/// Picks which signature algorithm to use for `key`, given the `server
/// -sig-algs` extension (if the server sent one) and the local
/// acceptable set (§4.4).
///
/// Rule: walk the key's own algorithms in its preferred order; the first
/// one that is both locally acceptable and (if `server_sig_algs` is
/// known) present there wins. If nothing in `server_sig_algs` matches,
/// fall back to the key's least-preferred ("last") algorithm so older
/// servers that never sent the extension still get a chance via trial
/// and error at the call site.
pub fn pick_signature_algorithm(
    key: &dyn PublicKey,
    locally_acceptable: &[String],
    server_sig_algs: Option<&[String]>,
) -> String {
    for candidate in key.signature_algorithms() {
        if !locally_acceptable.iter().any(|a| a == candidate) {
            continue;
        }
        match server_sig_algs {
            Some(server) if server.iter().any(|a| a == candidate) => return candidate.clone(),
            None => return candidate.clone(),
            Some(_) => continue,
        }
    }
    key.signature_algorithms()
        .last()
        .cloned()
        .unwrap_or_else(|| key.key_type().to_owned())
}

/// Builds the exact byte sequence a `publickey` (or `hostbased`)
/// `USERAUTH_REQUEST` signs over (RFC 4252 §7):
/// `string(session_id) || byte(SSH_MSG_USERAUTH_REQUEST) ||
/// string(user_name) || string(service_name) || string("publickey") ||
/// boolean(true) || string(algorithm) || string(blob)`.
///
/// The caller signs this with [`PublicKey::sign`] to produce the
/// signature placed in the real request, and the server re-derives the
/// same bytes to call [`PublicKey::verify`].
pub fn signature_base(session_id: &[u8], user_name: &str, service_name: &str, algorithm: &str, blob: &[u8]) -> Vec<u8> {
    let mut w = Cursor::new(Vec::new());
    Bytes::from(session_id).write_be(&mut w).unwrap();
    50u8.write_be(&mut w).unwrap(); // SSH_MSG_USERAUTH_REQUEST
    Utf8::from(user_name).write_be(&mut w).unwrap();
    Utf8::from(service_name).write_be(&mut w).unwrap();
    Utf8::from("publickey").write_be(&mut w).unwrap();
    Bool::from(true).write_be(&mut w).unwrap();
    Utf8::from(algorithm).write_be(&mut w).unwrap();
    Bytes::from(blob).write_be(&mut w).unwrap();
    w.into_inner()
}

/// Signs a `publickey` auth request with `key`, returning the signature
/// bytes ready to place in the request's `method_data` (§4.4, §7). The
/// caller is responsible for assembling `method_data` itself (algorithm
/// name, key blob, `true`, then this signature) since that shape is
/// wire-format detail owned by the method, same as [`UserAuthRequest`]'s
/// `method_data` is left uninterpreted by `ssh-proto`.
///
/// [`UserAuthRequest`]: ssh_proto::auth::UserAuthRequest
pub fn sign_publickey_request(key: &dyn PublicKey, session_id: &[u8], user_name: &str, service_name: &str, algorithm: &str) -> Vec<u8> {
    let base = signature_base(session_id, user_name, service_name, algorithm, &key.blob());
    key.sign(algorithm, &base)
}

/// For an RSA certificate key, the retry names to attempt in order when
/// the first signed `USERAUTH_REQUEST` is rejected (§4.4): a server
/// advertising the plain `ssh-rsa-cert-v01@openssh.com` name but not the
/// RSA-SHA2 certificate variants needs the SHA-1 cert name specifically.
pub fn rsa_cert_retry_chain(cert_algorithm: &str) -> Vec<String> {
    match cert_algorithm {
        "rsa-sha2-256-cert-v01@openssh.com" | "rsa-sha2-512-cert-v01@openssh.com" => {
            vec![cert_algorithm.to_owned(), "ssh-rsa-cert-v01@openssh.com".to_owned()]
        }
        other => vec![other.to_owned()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRsaKey {
        algos: Vec<String>,
    }

    impl PublicKey for FakeRsaKey {
        fn key_type(&self) -> &str {
            "ssh-rsa"
        }
        fn blob(&self) -> Vec<u8> {
            Vec::new()
        }
        fn signature_algorithms(&self) -> &[String] {
            &self.algos
        }
        fn sign(&self, _algorithm: &str, _data: &[u8]) -> Vec<u8> {
            Vec::new()
        }
        fn verify(&self, _algorithm: &str, _data: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }

    #[test]
    fn prefers_sha2_512_when_server_supports_it() {
        let key = FakeRsaKey {
            algos: vec!["rsa-sha2-512".into(), "rsa-sha2-256".into(), "ssh-rsa".into()],
        };
        let local = vec!["rsa-sha2-512".into(), "rsa-sha2-256".into(), "ssh-rsa".into()];
        let server = vec!["rsa-sha2-256".into(), "ssh-rsa".into()];
        assert_eq!(pick_signature_algorithm(&key, &local, Some(&server)), "rsa-sha2-256");
    }

    #[test]
    fn falls_back_to_last_without_server_sig_algs_match() {
        let key = FakeRsaKey {
            algos: vec!["rsa-sha2-512".into(), "ssh-rsa".into()],
        };
        let local = vec!["rsa-sha2-512".into(), "ssh-rsa".into()];
        let server = vec!["ssh-dss".into()];
        assert_eq!(pick_signature_algorithm(&key, &local, Some(&server)), "ssh-rsa");
    }

    #[test]
    fn signature_base_matches_rfc4252_field_order() {
        let session_id = [0xabu8, 0xcd, 0xef];
        let blob = [1u8, 2, 3, 4];
        let base = signature_base(&session_id, "alice", "ssh-connection", "ssh-ed25519", &blob);

        let mut expected = Vec::new();
        expected.extend_from_slice(&(session_id.len() as u32).to_be_bytes());
        expected.extend_from_slice(&session_id);
        expected.push(50u8);
        expected.extend_from_slice(&(5u32).to_be_bytes());
        expected.extend_from_slice(b"alice");
        expected.extend_from_slice(&(14u32).to_be_bytes());
        expected.extend_from_slice(b"ssh-connection");
        expected.extend_from_slice(&(9u32).to_be_bytes());
        expected.extend_from_slice(b"publickey");
        expected.push(1u8); // boolean true
        expected.extend_from_slice(&(12u32).to_be_bytes());
        expected.extend_from_slice(b"ssh-ed25519");
        expected.extend_from_slice(&(blob.len() as u32).to_be_bytes());
        expected.extend_from_slice(&blob);

        assert_eq!(base, expected);
    }

    struct EchoKey {
        blob: Vec<u8>,
        algos: Vec<String>,
    }

    impl PublicKey for EchoKey {
        fn key_type(&self) -> &str {
            "ssh-ed25519"
        }
        fn blob(&self) -> Vec<u8> {
            self.blob.clone()
        }
        fn signature_algorithms(&self) -> &[String] {
            &self.algos
        }
        fn sign(&self, _algorithm: &str, data: &[u8]) -> Vec<u8> {
            data.to_vec()
        }
        fn verify(&self, _algorithm: &str, _data: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }

    #[test]
    fn sign_publickey_request_signs_over_the_signature_base() {
        let key = EchoKey {
            blob: vec![9, 9, 9],
            algos: vec!["ssh-ed25519".into()],
        };
        let session_id = [1u8, 2, 3];
        let signed = sign_publickey_request(&key, &session_id, "bob", "ssh-connection", "ssh-ed25519");
        let expected_base = signature_base(&session_id, "bob", "ssh-connection", "ssh-ed25519", &key.blob());
        assert_eq!(signed, expected_base);
    }
}
