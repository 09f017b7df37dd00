//! Tagged transcript used for envelope associated data.
//!
//! Each field is appended as `(tag u32 be, len u32 be, bytes)` so two
//! different field sequences can never serialize to the same byte string.

use bytes::{BufMut, BytesMut};

/// Field tags used when binding envelope metadata.
pub mod tags {
    pub const DOMAIN: u32 = 0;
    pub const SUITE: u32 = 1;
    pub const PURPOSE: u32 = 2;
    pub const EPHEMERAL_KEY: u32 = 3;
    pub const RECIPIENT_KEY: u32 = 4;
    pub const NONCE: u32 = 5;
}

#[derive(Clone, Debug, Default)]
pub struct Transcript {
    buf: BytesMut,
}

impl Transcript {
    /// Start a transcript under a domain separator.
    pub fn new(domain: &'static str) -> Self {
        let mut t = Self { buf: BytesMut::with_capacity(160) };
        t.append_bytes(tags::DOMAIN, domain.as_bytes());
        t
    }

    pub fn append_bytes(&mut self, tag: u32, data: &[u8]) -> &mut Self {
        self.buf.put_u32(tag);
        self.buf.put_u32(data.len() as u32);
        self.buf.extend_from_slice(data);
        self
    }

    pub fn append_u8(&mut self, tag: u32, v: u8) -> &mut Self {
        self.buf.put_u32(tag);
        self.buf.put_u32(1);
        self.buf.put_u8(v);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
