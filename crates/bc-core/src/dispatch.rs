//! Typed request/response surface for a platform bridge.
//!
//! A bridge parses the incoming channel method with [`Method::from_str`],
//! builds the matching [`Request`] from its arguments and hands it to
//! [`CryptoService::handle`]. Byte payloads stay opaque binary throughout.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::errors::ErrorReply;
use crate::service::CryptoService;

/// Channel the bridge registers the methods under.
pub const CHANNEL_NAME: &str = "bharatconnect.crypto";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GenerateIdentityKeyPair,
    GetIdentityPublicKey,
    EncryptMessage,
    DecryptMessage,
    WrapMasterKey,
    UnwrapMasterKey,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::GenerateIdentityKeyPair,
        Method::GetIdentityPublicKey,
        Method::EncryptMessage,
        Method::DecryptMessage,
        Method::WrapMasterKey,
        Method::UnwrapMasterKey,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::GenerateIdentityKeyPair => "generateIdentityKeyPair",
            Method::GetIdentityPublicKey => "getIdentityPublicKey",
            Method::EncryptMessage => "encryptMessage",
            Method::DecryptMessage => "decryptMessage",
            Method::WrapMasterKey => "wrapMasterKey",
            Method::UnwrapMasterKey => "unwrapMasterKey",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("method not implemented: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

pub enum Request {
    GenerateIdentity,
    GetPublicKey,
    Encrypt {
        recipient: Vec<u8>,
        plaintext: Vec<u8>,
    },
    Decrypt {
        envelope: Vec<u8>,
    },
    WrapMasterKey {
        recipient: Vec<u8>,
        master_key: Zeroizing<Vec<u8>>,
    },
    UnwrapMasterKey {
        wrapped: Vec<u8>,
    },
}

impl Request {
    pub fn method(&self) -> Method {
        match self {
            Request::GenerateIdentity => Method::GenerateIdentityKeyPair,
            Request::GetPublicKey => Method::GetIdentityPublicKey,
            Request::Encrypt { .. } => Method::EncryptMessage,
            Request::Decrypt { .. } => Method::DecryptMessage,
            Request::WrapMasterKey { .. } => Method::WrapMasterKey,
            Request::UnwrapMasterKey { .. } => Method::UnwrapMasterKey,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request::{}", self.method())
    }
}

pub enum Response {
    PublicKey(Vec<u8>),
    Envelope(Vec<u8>),
    Plaintext(Vec<u8>),
    MasterKey(Zeroizing<Vec<u8>>),
}

impl Response {
    /// The payload as it goes back over the bridge.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Response::PublicKey(b) | Response::Envelope(b) | Response::Plaintext(b) => b.as_slice(),
            Response::MasterKey(b) => b.as_slice(),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::PublicKey(b) => write!(f, "PublicKey({})", hex::encode(b)),
            Response::Envelope(b) => write!(f, "Envelope({} bytes)", b.len()),
            Response::Plaintext(b) => write!(f, "Plaintext({} bytes)", b.len()),
            Response::MasterKey(_) => f.write_str("MasterKey([REDACTED])"),
        }
    }
}

impl CryptoService {
    /// Run one bridge request.
    pub fn handle(&self, request: Request) -> Result<Response, ErrorReply> {
        let method = request.method();
        debug!(channel = CHANNEL_NAME, %method, "dispatch");
        let response = match request {
            Request::GenerateIdentity => Response::PublicKey(self.generate_identity()?.to_vec()),
            Request::GetPublicKey => Response::PublicKey(self.public_key()?.to_vec()),
            Request::Encrypt {
                recipient,
                plaintext,
            } => Response::Envelope(self.encrypt(&recipient, &plaintext)?),
            Request::Decrypt { envelope } => Response::Plaintext(self.decrypt(&envelope)?),
            Request::WrapMasterKey {
                recipient,
                master_key,
            } => Response::Envelope(self.wrap_key(&recipient, &master_key)?),
            Request::UnwrapMasterKey { wrapped } => {
                let key = self.unwrap_key(&wrapped)?;
                Response::MasterKey(Zeroizing::new(key.as_bytes().to_vec()))
            }
        };
        Ok(response)
    }
}
