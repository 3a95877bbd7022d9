#![forbid(unsafe_code)]

//! Key derivation and decryption for PKCS#12.
//!
//! - the PKCS#12 KDF (RFC 7292 Appendix B), used for the MAC key and the
//!   legacy `pbeWithSHAAnd3-KeyTripleDES-CBC` scheme
//! - PBES2 (PBKDF2 + AES-CBC), the OpenSSL 3.x default

use cipher::{block_padding::Pkcs7, BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use digest::{Digest, FixedOutputReset};
use hmac::{Hmac, Mac};
use sellado_core::Error;

/// PKCS#12 KDF diversifier for key material.
pub const ID_KEY: u8 = 1;
/// PKCS#12 KDF diversifier for IVs.
pub const ID_IV: u8 = 2;
/// PKCS#12 KDF diversifier for MAC keys.
pub const ID_MAC: u8 = 3;

/// Hash functions usable by the PKCS#12 KDF and the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pkcs12Hash {
    Sha1,
    Sha256,
}

impl Pkcs12Hash {
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

/// RFC 7292 Appendix B.2 key derivation.
///
/// `password` is the BMP-encoded password from [`password_to_bmp`].
pub fn pkcs12_kdf(
    hash: Pkcs12Hash,
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    match hash {
        Pkcs12Hash::Sha1 => derive::<sha1::Sha1>(id, password, salt, iterations, output_len),
        Pkcs12Hash::Sha256 => derive::<sha2::Sha256>(id, password, salt, iterations, output_len),
    }
}

fn derive<D>(id: u8, password: &[u8], salt: &[u8], iterations: u32, output_len: usize) -> Vec<u8>
where
    D: Digest + FixedOutputReset,
{
    // Both supported hashes have a 64-byte block.
    const V: usize = 64;
    let u = <D as Digest>::output_size();

    let diversifier = [id; V];
    let mut input = repeat_to_block(salt, V);
    input.extend_from_slice(&repeat_to_block(password, V));

    let mut out = Vec::with_capacity(output_len + u);
    let mut hasher = D::new();
    while out.len() < output_len {
        Digest::update(&mut hasher, diversifier);
        Digest::update(&mut hasher, &input);
        let mut a = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }
        out.extend_from_slice(&a);
        if out.len() >= output_len {
            break;
        }
        // I_j = (I_j + B + 1) mod 2^(8v) for every v-byte block of I.
        let b = repeat_to_block(&a, V);
        for chunk in input.chunks_mut(V) {
            let mut carry: u16 = 1;
            for k in (0..chunk.len()).rev() {
                let sum = u16::from(chunk[k]) + u16::from(b[k]) + carry;
                chunk[k] = sum as u8;
                carry = sum >> 8;
            }
        }
    }
    out.truncate(output_len);
    out
}

/// Repeat `data` up to the next multiple of `v` bytes; empty stays empty.
fn repeat_to_block(data: &[u8], v: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(v) * v;
    data.iter().copied().cycle().take(len).collect()
}

/// Encode a password as BMPString (UTF-16BE) with a trailing NUL, as the
/// PKCS#12 KDF expects. The empty password encodes to the NUL alone.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
    for c in password.encode_utf16() {
        bmp.extend_from_slice(&c.to_be_bytes());
    }
    bmp.extend_from_slice(&[0, 0]);
    bmp
}

/// HMAC of `data` under `key` with the given hash.
pub fn hmac(hash: Pkcs12Hash, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    fn run<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut mac = <M as Mac>::new_from_slice(key)
            .map_err(|e| Error::Key(format!("HMAC key rejected: {e}")))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
    match hash {
        Pkcs12Hash::Sha1 => run::<Hmac<sha1::Sha1>>(key, data),
        Pkcs12Hash::Sha256 => run::<Hmac<sha2::Sha256>>(key, data),
    }
}

/// Decrypt with `pbeWithSHAAnd3-KeyTripleDES-CBC`.
pub fn decrypt_pbe_sha1_3des(
    ciphertext: &[u8],
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let key = pkcs12_kdf(Pkcs12Hash::Sha1, ID_KEY, bmp_password, salt, iterations, 24);
    let iv = pkcs12_kdf(Pkcs12Hash::Sha1, ID_IV, bmp_password, salt, iterations, 8);
    cbc_decrypt::<des::TdesEde3>(&key, &iv, ciphertext, "3DES-CBC")
}

/// PRF used by PBKDF2 inside PBES2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pbkdf2Prf {
    HmacSha1,
    HmacSha256,
}

/// Decrypt with PBES2: PBKDF2 (`prf`) then AES-CBC with a `key_len` key.
pub fn decrypt_pbes2_aes_cbc(
    ciphertext: &[u8],
    password: &str,
    prf: Pbkdf2Prf,
    salt: &[u8],
    iterations: u32,
    key_len: usize,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = vec![0u8; key_len];
    match prf {
        Pbkdf2Prf::HmacSha1 => {
            pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password.as_bytes(), salt, iterations, &mut key)
        }
        Pbkdf2Prf::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
    }
    match key_len {
        16 => cbc_decrypt::<aes::Aes128>(&key, iv, ciphertext, "AES-128-CBC"),
        24 => cbc_decrypt::<aes::Aes192>(&key, iv, ciphertext, "AES-192-CBC"),
        32 => cbc_decrypt::<aes::Aes256>(&key, iv, ciphertext, "AES-256-CBC"),
        n => Err(Error::Key(format!("unsupported AES key length {n}"))),
    }
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8], label: &str) -> Result<Vec<u8>, Error>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| Error::Key(format!("{label} init failed: {e}")))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Key(format!("{label} decryption failed (wrong password?)")))
}
