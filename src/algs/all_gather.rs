//! All-gather of equally sized byte blocks over point-to-point messages.
//!
//! Used by backends without a native collective (serial and in-process
//! communicators). Every rank posts a receive from every peer, sends its own
//! block to every peer, then waits. All handles are drained before returning,
//! even if an error occurs.
//!
//! Frames carry the round's epoch. Frames of an older epoch are left over from
//! an aborted round and are skipped; a failed round aborts the tag so its
//! frames never satisfy a later call.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{HDR_BYTES, KIND_GATHER_BLOCK, decode_block, encode_block};
use crate::source_error::SourceError;

/// Gather `local` from all ranks; rank `r`'s block lands at `r * local.len()`.
pub fn all_gather_p2p<C>(comm: &C, tag: CommTag, local: &[u8]) -> Result<Vec<u8>, SourceError>
where
    C: Communicator + ?Sized,
{
    let size = comm.size();
    let me = comm.rank();
    let block = local.len();
    let mut out = vec![0u8; block * size];
    out[me * block..(me + 1) * block].copy_from_slice(local);
    if size == 1 {
        return Ok(out);
    }
    let epoch = comm.collective_epoch(tag);
    let msg = encode_block(KIND_GATHER_BLOCK, epoch, local).map_err(|e| SourceError::CommError {
        neighbor: me,
        source: e.into(),
    })?;

    // 1) post all receives
    let mut buf = vec![0u8; HDR_BYTES + block];
    let mut recvs = Vec::with_capacity(size - 1);
    for peer in (0..size).filter(|&p| p != me) {
        recvs.push((peer, comm.irecv(peer, tag.as_u16(), &mut buf)));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(size - 1);
    for peer in (0..size).filter(|&p| p != me) {
        pending_sends.push(comm.isend(peer, tag.as_u16(), &msg));
    }

    // 3) wait for all recvs (but do not early-return)
    let mut maybe_err = None;
    for (peer, mut h) in recvs {
        if maybe_err.is_some() {
            let _ = h.wait();
            continue;
        }
        loop {
            let Some(data) = h.wait() else {
                maybe_err = Some(SourceError::CommError {
                    neighbor: peer,
                    source: format!("no containment block received from rank {peer}").into(),
                });
                break;
            };
            match decode_block(KIND_GATHER_BLOCK, block, &data) {
                Ok((e, _)) if e < epoch => {
                    log::debug!("rank {me}: skipping stale frame of epoch {e} from rank {peer}");
                    h = comm.irecv(peer, tag.as_u16(), &mut buf);
                }
                Ok((e, payload)) if e == epoch => {
                    out[peer * block..(peer + 1) * block].copy_from_slice(payload);
                    break;
                }
                Ok((e, _)) => {
                    maybe_err = Some(SourceError::CommError {
                        neighbor: peer,
                        source: format!("frame of epoch {e} received in epoch {epoch}").into(),
                    });
                    break;
                }
                Err(msg) => {
                    maybe_err = Some(SourceError::CommError {
                        neighbor: peer,
                        source: msg.into(),
                    });
                    break;
                }
            }
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => {
            comm.abort_collective(tag);
            Err(err)
        }
        None => Ok(out),
    }
}
