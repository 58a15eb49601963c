//! RSA key material shared by the crate's tests

use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::sync::OnceLock;

static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

pub(crate) fn private_key() -> &'static RsaPrivateKey {
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap())
}

pub(crate) fn pkcs1_pem() -> String {
    private_key().to_pkcs1_pem(LineEnding::LF).unwrap().to_string()
}

pub(crate) fn pkcs8_pem() -> String {
    private_key().to_pkcs8_pem(LineEnding::LF).unwrap().to_string()
}
