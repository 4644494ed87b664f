use std::num::NonZeroU16;
use std::sync::atomic::{AtomicU16, Ordering};

/// Monotonic packet identifier sequence shared by all in-flight QoS > 0
/// exchanges of the owning endpoint.
///
/// Identifiers wrap from 65,535 directly to 1; 0 is reserved and never issued.
#[derive(Debug)]
pub struct PacketIdProvider {
    next: AtomicU16,
}

impl Default for PacketIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIdProvider {
    pub fn new() -> Self {
        Self { next: AtomicU16::new(1) }
    }

    #[inline]
    pub fn next_id(&self) -> NonZeroU16 {
        loop {
            // skips the reserved id 0 on wrap-around
            if let Some(id) = NonZeroU16::new(self.next.fetch_add(1, Ordering::SeqCst)) {
                return id;
            }
        }
    }
}
