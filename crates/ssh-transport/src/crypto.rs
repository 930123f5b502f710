//! Collaborator interfaces the transport consumes but never implements
//! (§6): cipher, MAC, and compression. Concrete algorithms (AES-GCM,
//! ChaCha20-Poly1305, HMAC-SHA2, zlib...) live outside this crate and are
//! plugged in as trait objects, mirroring how the teacher's `MessageSigner`
//! holds a `Box<dyn crypto::SigningAlgo>` rather than a concrete signer.

/// One direction's symmetric cipher. `is_aead` governs whether the MAC is
/// skipped (the cipher authenticates the packet itself) and whether the
/// 4-byte length field is visible in plaintext before decryption.
pub trait Cipher: Send {
    /// Bytes the cipher encrypts in its primitive block operation; packet
    /// padding is chosen so encrypted length is a multiple of this (or 8,
    /// whichever is larger).
    fn block_size(&self) -> usize;

    fn is_aead(&self) -> bool;

    /// Encrypts one packet's header+payload+padding. Returns the
    /// ciphertext, and for AEAD ciphers, the authentication tag appended
    /// to it already — the caller never sees it separately.
    fn encrypt(&mut self, sequence_number: u32, plaintext: &[u8]) -> Vec<u8>;

    /// Decrypts the leading block, revealing the `packet_length` field,
    /// for ciphers that encrypt the length header (i.e. not AEAD with a
    /// plaintext-length mode).
    fn decrypt_first_block(&mut self, sequence_number: u32, ciphertext_block: &[u8]) -> Vec<u8>;

    /// Decrypts the remainder of the packet once its total length is
    /// known. `authenticated_tag`, if `is_aead()`, must verify or this
    /// returns `None`.
    fn decrypt_rest(
        &mut self,
        sequence_number: u32,
        first_block_plain: &[u8],
        rest_ciphertext: &[u8],
        authenticated_tag: Option<&[u8]>,
    ) -> Option<Vec<u8>>;

    fn clone_box(&self) -> Box<dyn Cipher>;
}

pub trait Mac: Send {
    fn size(&self) -> usize;
    fn sign(&mut self, sequence_number: u32, data: &[u8]) -> Vec<u8>;
    fn verify(&mut self, sequence_number: u32, data: &[u8], tag: &[u8]) -> bool {
        self.sign(sequence_number, data) == tag
    }
    fn clone_box(&self) -> Box<dyn Mac>;
}

pub trait Compressor: Send {
    fn compress(&mut self, data: &[u8]) -> Vec<u8>;
    fn clone_box(&self) -> Box<dyn Compressor>;
}

pub trait Decompressor: Send {
    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, crate::TransportError>;
    fn clone_box(&self) -> Box<dyn Decompressor>;
}

/// The `none` cipher (RFC 4253 §6.3): used before the first `NEWKEYS` and
/// whenever `none` was negotiated (rare, debug-only deployments).
#[derive(Clone, Copy, Default)]
pub struct NoneCipher;

impl Cipher for NoneCipher {
    fn block_size(&self) -> usize {
        8
    }

    fn is_aead(&self) -> bool {
        false
    }

    fn encrypt(&mut self, _sequence_number: u32, plaintext: &[u8]) -> Vec<u8> {
        plaintext.to_vec()
    }

    fn decrypt_first_block(&mut self, _sequence_number: u32, ciphertext_block: &[u8]) -> Vec<u8> {
        ciphertext_block.to_vec()
    }

    fn decrypt_rest(
        &mut self,
        _sequence_number: u32,
        _first_block_plain: &[u8],
        rest_ciphertext: &[u8],
        _authenticated_tag: Option<&[u8]>,
    ) -> Option<Vec<u8>> {
        Some(rest_ciphertext.to_vec())
    }

    fn clone_box(&self) -> Box<dyn Cipher> {
        Box::new(*self)
    }
}

/// The `none` MAC: zero-length tag, used before the first key exchange.
#[derive(Clone, Copy, Default)]
pub struct NoneMac;

impl Mac for NoneMac {
    fn size(&self) -> usize {
        0
    }

    fn sign(&mut self, _sequence_number: u32, _data: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn verify(&mut self, _sequence_number: u32, _data: &[u8], tag: &[u8]) -> bool {
        tag.is_empty()
    }

    fn clone_box(&self) -> Box<dyn Mac> {
        Box::new(*self)
    }
}

/// The `none` compression algorithm.
#[derive(Clone, Copy, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&mut self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn clone_box(&self) -> Box<dyn Compressor> {
        Box::new(*self)
    }
}

impl Decompressor for NoneCompressor {
    fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, crate::TransportError> {
        Ok(data.to_vec())
    }

    fn clone_box(&self) -> Box<dyn Decompressor> {
        Box::new(*self)
    }
}
