//! Password authentication: MD5 and SCRAM-SHA-256 (RFC 5802 / RFC 7677).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use datagate_core::{ConnectionErrorKind, Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// `"md5" + md5(md5(password + user) + salt)`, hex encoded.
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = md5::compute(format!("{password}{user}").as_bytes());
    let mut outer_input = format!("{inner:x}").into_bytes();
    outer_input.extend_from_slice(&salt);
    format!("md5{:x}", md5::compute(&outer_input))
}

/// Client side of a SCRAM-SHA-256 exchange without channel binding.
pub struct ScramClient {
    password: String,
    client_first_bare: String,
    client_nonce: String,
    server_signature: Option<[u8; 32]>,
}

impl std::fmt::Debug for ScramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScramClient")
            .field("client_nonce", &self.client_nonce)
            .finish_non_exhaustive()
    }
}

impl ScramClient {
    /// Start an exchange with a random 18-byte nonce.
    pub fn new(user: &str, password: &str) -> Self {
        let nonce: [u8; 18] = rand::random();
        Self::with_nonce(user, password, &STANDARD.encode(nonce))
    }

    /// Start an exchange with a caller-chosen nonce.
    pub fn with_nonce(user: &str, password: &str, nonce: &str) -> Self {
        Self {
            password: password.to_string(),
            client_first_bare: format!("n={},r={nonce}", escape_username(user)),
            client_nonce: nonce.to_string(),
            server_signature: None,
        }
    }

    /// The client-first message, `n,,` GS2 header included.
    pub fn client_first(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Consume the server-first message and produce the client-final message.
    pub fn process_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let server_first = std::str::from_utf8(data)
            .map_err(|_| auth_error("SCRAM server-first message is not UTF-8"))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            match attr.split_once('=') {
                Some(("r", v)) => nonce = Some(v),
                Some(("s", v)) => salt = Some(v),
                Some(("i", v)) => iterations = Some(v),
                _ => {}
            }
        }
        let nonce = nonce.ok_or_else(|| auth_error("SCRAM server-first lacks a nonce"))?;
        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(auth_error("SCRAM server nonce does not extend the client nonce"));
        }
        let salt = STANDARD
            .decode(salt.ok_or_else(|| auth_error("SCRAM server-first lacks a salt"))?)
            .map_err(|_| auth_error("SCRAM salt is not valid base64"))?;
        let iterations: u32 = iterations
            .and_then(|i| i.parse().ok())
            .filter(|i| *i > 0)
            .ok_or_else(|| auth_error("SCRAM iteration count is missing or invalid"))?;

        let mut salted = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), &salt, iterations, &mut salted);

        let client_key = hmac(&salted, b"Client Key")?;
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();

        // "biws" is base64("n,,").
        let client_final_bare = format!("c=biws,r={nonce}");
        let auth_message = format!(
            "{},{server_first},{client_final_bare}",
            self.client_first_bare
        );

        let client_signature = hmac(&stored_key, auth_message.as_bytes())?;
        let mut proof = client_key;
        for (p, s) in proof.iter_mut().zip(client_signature) {
            *p ^= s;
        }

        let server_key = hmac(&salted, b"Server Key")?;
        self.server_signature = Some(hmac(&server_key, auth_message.as_bytes())?);

        Ok(format!("{client_final_bare},p={}", STANDARD.encode(proof)).into_bytes())
    }

    /// Check the server-final message against the expected server signature.
    pub fn verify_server_final(&self, data: &[u8]) -> Result<()> {
        let server_final = std::str::from_utf8(data)
            .map_err(|_| auth_error("SCRAM server-final message is not UTF-8"))?;
        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(auth_error(format!("SCRAM authentication rejected: {err}")));
        }
        let verifier = server_final
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .ok_or_else(|| auth_error("SCRAM server-final lacks a verifier"))?;
        let verifier = STANDARD
            .decode(verifier)
            .map_err(|_| auth_error("SCRAM verifier is not valid base64"))?;
        let expected = self
            .server_signature
            .ok_or_else(|| auth_error("SCRAM server-final received before server-first"))?;

        if bool::from(expected.as_slice().ct_eq(verifier.as_slice())) {
            Ok(())
        } else {
            Err(auth_error("SCRAM server signature mismatch"))
        }
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| auth_error("invalid HMAC key length"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

fn escape_username(user: &str) -> String {
    user.replace('=', "=3D").replace(',', "=2C")
}

fn auth_error(message: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Authentication, message)
}
