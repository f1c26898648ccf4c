//! Chunk-based savestate container and the explicit-width field packer.
//!
//! A savestate is a flat list of named chunks: a four-byte ASCII id plus a
//! little-endian length and payload. Components pack their mutable state
//! into chunks with explicit per-field widths so the on-disk layout is
//! independent of Rust struct layout. Restoring is atomic at the component
//! level: decode everything into temporaries first, then commit.

use crate::error::Error;

pub const CONTAINER_MAGIC: &[u8; 4] = b"FCS\x1a";
pub const CONTAINER_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: [u8; 4],
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveState {
    chunks: Vec<Chunk>,
}

impl SaveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the chunk named `id`.
    pub fn put_chunk(&mut self, id: &str, data: Vec<u8>) {
        let id = chunk_id(id);
        if let Some(c) = self.chunks.iter_mut().find(|c| c.id == id) {
            c.data = data;
        } else {
            self.chunks.push(Chunk { id, data });
        }
    }

    pub fn find_chunk(&self, id: &str) -> Option<&[u8]> {
        let id = chunk_id(id);
        self.chunks
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.data.as_slice())
    }

    /// Like [`find_chunk`] but an absent chunk is a savestate error.
    pub fn require_chunk(&self, id: &'static str) -> Result<&[u8], Error> {
        self.find_chunk(id).ok_or(Error::BadSaveState {
            id,
            reason: "chunk missing".into(),
        })
    }

    pub fn chunk_ids(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.chunks.iter().map(|c| c.id)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(CONTAINER_MAGIC);
        out.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.chunks.len() as u32).to_le_bytes());
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.id);
            out.extend_from_slice(&(chunk.data.len() as u32).to_le_bytes());
            out.extend_from_slice(&chunk.data);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Unpacker::new(bytes);
        let magic = r.bytes(4).map_err(|_| bad_container("short header"))?;
        if magic != CONTAINER_MAGIC {
            return Err(bad_container("bad magic"));
        }
        let version = r.u32().map_err(|_| bad_container("short header"))?;
        if version != CONTAINER_VERSION {
            return Err(bad_container("unsupported version"));
        }
        let count = r.u32().map_err(|_| bad_container("short header"))? as usize;
        let mut chunks = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let id_bytes = r.bytes(4).map_err(|_| bad_container("truncated chunk id"))?;
            let id = [id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]];
            let len = r.u32().map_err(|_| bad_container("truncated chunk size"))? as usize;
            let data = r
                .bytes(len)
                .map_err(|_| bad_container("truncated chunk data"))?
                .to_vec();
            chunks.push(Chunk { id, data });
        }
        Ok(Self { chunks })
    }
}

fn bad_container(reason: &str) -> Error {
    Error::BadContainer(reason.into())
}

fn chunk_id(id: &str) -> [u8; 4] {
    let mut out = [b' '; 4];
    for (dst, src) in out.iter_mut().zip(id.bytes()) {
        *dst = src;
    }
    out
}

/// Little-endian field writer.
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Little-endian field reader over a chunk payload.
#[derive(Debug)]
pub struct Unpacker<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Raised by [`Unpacker`] when a chunk runs out of bytes; callers convert it
/// into [`Error::BadSaveState`] with the chunk id attached.
#[derive(Debug, Clone, Copy)]
pub struct ShortChunk;

impl<'a> Unpacker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn u8(&mut self) -> Result<u8, ShortChunk> {
        let b = *self.data.get(self.pos).ok_or(ShortChunk)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn bool(&mut self) -> Result<bool, ShortChunk> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> Result<u16, ShortChunk> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ShortChunk> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, ShortChunk> {
        let b = self.bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ShortChunk> {
        let end = self.pos.checked_add(len).ok_or(ShortChunk)?;
        let s = self.data.get(self.pos..end).ok_or(ShortChunk)?;
        self.pos = end;
        Ok(s)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The whole payload must have been consumed for a well-formed chunk.
    pub fn expect_end(&self) -> Result<(), ShortChunk> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(ShortChunk)
        }
    }
}

/// Map a truncated-chunk failure onto the richer savestate error.
pub fn chunk_err(id: &'static str) -> impl Fn(ShortChunk) -> Error + Copy {
    move |_| Error::BadSaveState {
        id,
        reason: "unexpected chunk size".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_round_trip() {
        let mut st = SaveState::new();
        st.put_chunk("BRD ", vec![1, 2, 3]);
        st.put_chunk("M2 ", vec![0xff; 16]);
        let bytes = st.to_bytes();
        let back = SaveState::from_bytes(&bytes).unwrap();
        assert_eq!(back.find_chunk("BRD "), Some(&[1u8, 2, 3][..]));
        assert_eq!(back.find_chunk("M2 ").map(|c| c.len()), Some(16));
        assert_eq!(back.find_chunk("A12 "), None);
    }

    #[test]
    fn put_chunk_replaces() {
        let mut st = SaveState::new();
        st.put_chunk("BRD ", vec![1]);
        st.put_chunk("BRD ", vec![2, 3]);
        assert_eq!(st.find_chunk("BRD "), Some(&[2u8, 3][..]));
        assert_eq!(st.chunk_ids().count(), 1);
    }

    #[test]
    fn truncated_container_is_rejected() {
        let mut st = SaveState::new();
        st.put_chunk("BRD ", vec![0; 32]);
        let mut bytes = st.to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(SaveState::from_bytes(&bytes).is_err());
    }

    #[test]
    fn packer_layout_is_little_endian() {
        let mut p = Packer::new();
        p.u8(0x11).u16(0x2233).u32(0x44556677).i32(-2);
        let bytes = p.finish();
        assert_eq!(bytes[..3], [0x11, 0x33, 0x22]);
        let mut u = Unpacker::new(&bytes);
        assert_eq!(u.u8().unwrap(), 0x11);
        assert_eq!(u.u16().unwrap(), 0x2233);
        assert_eq!(u.u32().unwrap(), 0x44556677);
        assert_eq!(u.i32().unwrap(), -2);
        u.expect_end().unwrap();
    }
}
