//! Fixed, versioned, little-endian wire types for the containment exchange.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 2;

/// Message kinds carried in [`WireHdr::kind`].
pub const KIND_GATHER_BLOCK: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    /// Payload length in bytes.
    pub len_le: u32,
    /// Collective epoch the frame belongs to; frames of aborted rounds carry
    /// an older epoch than the round that reads them.
    pub epoch_le: u32,
}

impl WireHdr {
    pub fn new(kind: u16, epoch: u32, len: usize) -> Result<Self, String> {
        let len = u32::try_from(len)
            .map_err(|_| format!("payload of {len} bytes does not fit the frame header"))?;
        Ok(Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            len_le: len.to_le(),
            epoch_le: epoch.to_le(),
        })
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn len(&self) -> usize {
        u32::from_le(self.len_le) as usize
    }
    pub fn epoch(&self) -> u32 {
        u32::from_le(self.epoch_le)
    }
}

pub const HDR_BYTES: usize = size_of::<WireHdr>();

const_assert_eq!(HDR_BYTES, 12);

/// Header followed by `payload`, ready for `isend`.
pub fn encode_block(kind: u16, epoch: u32, payload: &[u8]) -> Result<Vec<u8>, String> {
    let hdr = WireHdr::new(kind, epoch, payload.len())?;
    let mut out = Vec::with_capacity(HDR_BYTES + payload.len());
    out.extend_from_slice(cast_slice(std::slice::from_ref(&hdr)));
    out.extend_from_slice(payload);
    Ok(out)
}

/// Validate header and length of a received block; returns its epoch and payload.
pub fn decode_block(kind: u16, expected_len: usize, data: &[u8]) -> Result<(u32, &[u8]), String> {
    expect_exact_len(data.len(), HDR_BYTES + expected_len)?;
    let mut hdr = WireHdr::zeroed();
    cast_slice_mut(std::slice::from_mut(&mut hdr)).copy_from_slice(&data[..HDR_BYTES]);
    if hdr.version() != WIRE_VERSION {
        return Err(format!(
            "wire version {} does not match {WIRE_VERSION}",
            hdr.version()
        ));
    }
    if hdr.kind() != kind {
        return Err(format!("unexpected message kind {}", hdr.kind()));
    }
    if hdr.len() != expected_len {
        return Err(format!(
            "header announces {} payload bytes, expected {expected_len}",
            hdr.len()
        ));
    }
    Ok((hdr.epoch(), &data[HDR_BYTES..]))
}
