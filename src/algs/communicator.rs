//! Thin façade over intra-process (Rayon) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Receive handles are **waitable**: the data only becomes available through
//! [`Wait::wait`], never through the buffer passed to `irecv`, which only fixes
//! the expected length.
//!
//! The only collective the source pipeline needs is [`Communicator::all_gather`].
//! It is a barrier in disguise: **every rank of the communicator must call it
//! with the same tag and the same block length**, otherwise peers block.
//!
//! A round that fails on one rank is aborted with
//! [`Communicator::abort_collective`]; backends that keep messages across
//! calls move the tag to a new epoch so the next round never reads frames of
//! the failed one.

use crate::source_error::SourceError;
use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Typed message tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Non-blocking point-to-point interface plus the one collective we rely on.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Rank of this process within the communicator.
    fn rank(&self) -> usize;
    /// Number of participating ranks.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Gather `local` from every rank; the result holds rank `r`'s block at
    /// `r * local.len()`.
    ///
    /// All ranks must enter this call. The default implementation is built from
    /// `isend`/`irecv`; backends with a native collective override it.
    fn all_gather(&self, tag: CommTag, local: &[u8]) -> Result<Vec<u8>, SourceError> {
        crate::algs::all_gather::all_gather_p2p(self, tag, local)
    }

    /// Epoch of the next collective round on `tag`.
    fn collective_epoch(&self, _tag: CommTag) -> u32 {
        0
    }

    /// Abandon the current round on `tag` after a failure.
    fn abort_collective(&self, _tag: CommTag) {}
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    ///
    /// `None` from a receive handle means the message never arrived.
    fn wait(self) -> Option<Vec<u8>>;
}

/// Compile-time no-op comm for serial runs: a world of one rank.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> Self::SendHandle {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {}

    fn all_gather(&self, _tag: CommTag, local: &[u8]) -> Result<Vec<u8>, SourceError> {
        Ok(local.to_vec())
    }
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);
static EPOCHS: Lazy<DashMap<u16, u32>> = Lazy::new(DashMap::new);

fn take_message(key: &Key) -> Option<Bytes> {
    let mut slot = MAILBOX.get_mut(key)?;
    slot.pop_front()
}

/// Receive handle for [`RayonComm`]; polls the shared mailbox on `wait`.
pub struct LocalHandle {
    key: Key,
    len: usize,
    deadline: Option<Instant>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(bytes) = take_message(&self.key) {
                let n = self.len.min(bytes.len());
                return Some(bytes[..n].to_vec());
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: each rank is a thread sharing one mailbox.
///
/// Messages between the same `(src, dst, tag)` triple are delivered in FIFO order.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    timeout: Option<Duration>,
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            timeout: None,
        }
    }

    /// Bound every receive by `timeout`; an expired receive yields `None`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            len: buf.len(),
            deadline: self.timeout.map(|t| Instant::now() + t),
        }
    }

    fn collective_epoch(&self, tag: CommTag) -> u32 {
        EPOCHS.get(&tag.as_u16()).map_or(0, |e| *e)
    }

    /// Bumps the tag's epoch and drops every queued frame to or from this rank.
    fn abort_collective(&self, tag: CommTag) {
        let tag = tag.as_u16();
        {
            let mut epoch = EPOCHS.entry(tag).or_insert(0);
            *epoch = epoch.wrapping_add(1);
        }
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            MAILBOX.remove(&(self.rank, peer, tag));
            MAILBOX.remove(&(peer, self.rank, tag));
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use crate::source_error::CommFailure;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// `MPI_COMM_WORLD` wrapper.
    ///
    /// `isend`/`irecv` are blocking here (`send_with_tag`,
    /// `receive_vec_with_tag`): the handles are already complete when
    /// returned. [`all_gather_p2p`](crate::algs::all_gather::all_gather_p2p)
    /// posts every receive before its sends and would deadlock on this
    /// backend, so `all_gather` is the native `MPI_Allgather` and must not be
    /// replaced by the point-to-point default.
    pub struct MpiComm {
        _universe: Option<Universe>,
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialise MPI and wrap the world communicator.
        pub fn new() -> Result<Self, SourceError> {
            let universe = mpi::initialize().ok_or_else(|| SourceError::CommError {
                neighbor: 0,
                source: CommFailure::from("MPI was already initialised"),
            })?;
            let world = universe.world();
            let mut comm = Self::from_world(world);
            comm._universe = Some(universe);
            Ok(comm)
        }

        /// Wrap a world communicator owned by the driver.
        pub fn from_world(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: None,
                world,
                rank,
                size,
            }
        }
    }

    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
            MpiHandle(None)
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            let n = buf.len().min(data.len());
            MpiHandle(Some(data[..n].to_vec()))
        }

        fn all_gather(&self, _tag: CommTag, local: &[u8]) -> Result<Vec<u8>, SourceError> {
            let mut out = vec![0u8; local.len() * self.size];
            self.world.all_gather_into(local, &mut out[..]);
            Ok(out)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn rayon_roundtrip_two_ranks() {
        // Simulate rank 0 and rank 1 in the same process:
        let comm0 = RayonComm::new(0, 2);
        let comm1 = RayonComm::new(1, 2);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        comm0.isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    #[serial]
    fn rayon_fifo_order() {
        let c0 = RayonComm::new(0, 2);
        let c1 = RayonComm::new(1, 2);
        for i in 0..10u8 {
            c0.isend(1, 11, &[i]);
        }
        let mut out = Vec::new();
        for _ in 0..10 {
            let mut b = [0u8; 1];
            out.push(c1.irecv(0, 11, &mut b).wait().unwrap()[0]);
        }
        assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
    }

    #[test]
    #[serial]
    fn timed_out_receive_yields_none() {
        let c1 = RayonComm::new(1, 2).with_timeout(Some(Duration::from_millis(20)));
        let mut b = [0u8; 1];
        assert!(c1.irecv(0, 13, &mut b).wait().is_none());
    }

    #[test]
    #[serial]
    fn abort_drops_queued_frames_and_bumps_epoch() {
        let tag = CommTag::new(17);
        let c0 = RayonComm::new(0, 2).with_timeout(Some(Duration::from_millis(20)));
        let c1 = RayonComm::new(1, 2).with_timeout(Some(Duration::from_millis(20)));
        let before = c0.collective_epoch(tag);
        c0.isend(1, tag.as_u16(), &[1]);
        c1.isend(0, tag.as_u16(), &[2]);
        c0.abort_collective(tag);
        assert_eq!(c1.collective_epoch(tag), before.wrapping_add(1));
        let mut b = [0u8; 1];
        assert!(c1.irecv(0, tag.as_u16(), &mut b).wait().is_none());
        assert!(c0.irecv(1, tag.as_u16(), &mut b).wait().is_none());
    }

    #[test]
    fn nocomm_is_a_single_rank_world() {
        let comm = NoComm;
        assert_eq!((comm.rank(), comm.size()), (0, 1));
        assert_eq!(comm.all_gather(CommTag::new(1), &[1, 0, 1]).unwrap(), vec![1, 0, 1]);
    }
}
