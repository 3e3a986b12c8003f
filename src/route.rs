//! Passive source-route cache.
//!
//! The target periodically (and always after a network topology change)
//! emits an unsolicited route-record indication listing the chain of
//! intermediate radios between it and the local gateway. This module
//! remembers the most recently observed chain and flags it dirty so the
//! next gateway-mode send can prepend a "Create Source Route" frame.

use crate::error::Error;
use crate::frame::FrameRequest;

/// Maximum intermediate hops a route-record indication may carry.
pub const MAX_HOPS: usize = 40;

/// Base application chunk size before any source-route reduction.
pub const BASE_CHUNK: usize = 54;

/// Tracks the last-known path from the gateway to the target.
#[derive(Debug, Default)]
pub struct RouteCache {
    /// `None` means no route has been learned yet (`hops == -1`).
    route: Option<Vec<[u8; 2]>>,
    dirty: bool,
}

impl RouteCache {
    pub fn new() -> Self {
        RouteCache {
            route: None,
            dirty: false,
        }
    }

    /// Number of intermediate hops in the current route, or `-1` if none
    /// has been learned yet.
    pub fn hops(&self) -> i32 {
        match &self.route {
            Some(r) => r.len() as i32,
            None => -1,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a newly observed route. If it differs from the stored one,
    /// marks the cache dirty (provided the new route has at least one
    /// intermediate hop).
    pub fn update(&mut self, intermediates: Vec<[u8; 2]>) {
        let intermediates: Vec<[u8; 2]> = intermediates.into_iter().take(MAX_HOPS).collect();
        if self.route.as_deref() != Some(intermediates.as_slice()) {
            let hops = intermediates.len();
            self.route = Some(intermediates);
            if hops >= 1 {
                self.dirty = true;
            }
        }
    }

    /// Clears the dirty flag after a route-set frame has been emitted.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// The maximum application-data chunk size for an outbound stream
    /// frame, reduced by `2*hops + 2` bytes when a multi-hop route is
    /// known. Falls back to [`BASE_CHUNK`] if the reduction would leave a
    /// non-positive limit.
    pub fn chunk_limit(&self) -> usize {
        let hops = self.hops();
        if hops >= 1 {
            let reduced = BASE_CHUNK as i32 - (2 * hops + 2);
            if reduced > 0 {
                return reduced as usize;
            }
        }
        BASE_CHUNK
    }

    /// Builds the wire bytes for the "Create Source Route" frame for the
    /// current route, if one has been learned with at least one hop. Does
    /// not clear the dirty flag — callers should do so only once the frame
    /// has actually been queued for transmission.
    pub fn route_set_wire_frame(&self, addr: &[u8; 10]) -> Result<Option<Vec<u8>>, Error> {
        let route = match &self.route {
            Some(r) if !r.is_empty() => r,
            _ => return Ok(None),
        };

        let mut data = Vec::with_capacity(1 + route.len() * 2);
        data.push(route.len() as u8);
        for hop in route {
            data.extend_from_slice(hop);
        }

        let req = FrameRequest {
            api_type: 0x21,
            address: Some(addr),
            pre_payload1: Some(0x00),
            data: &data,
            ..Default::default()
        };
        let mut wire = Vec::new();
        req.encode(&mut wire)?;
        Ok(Some(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_no_route() {
        let cache = RouteCache::new();
        assert_eq!(cache.hops(), -1);
        assert!(!cache.is_dirty());
        assert_eq!(cache.chunk_limit(), BASE_CHUNK);
    }

    #[test]
    fn learning_a_route_marks_dirty_and_shrinks_chunk() {
        let mut cache = RouteCache::new();
        cache.update(vec![[0x11, 0x22], [0x33, 0x44]]);
        assert_eq!(cache.hops(), 2);
        assert!(cache.is_dirty());
        assert_eq!(cache.chunk_limit(), BASE_CHUNK - (2 * 2 + 2));
    }

    #[test]
    fn identical_route_does_not_redirty() {
        let mut cache = RouteCache::new();
        cache.update(vec![[0x11, 0x22]]);
        cache.clear_dirty();
        cache.update(vec![[0x11, 0x22]]);
        assert!(!cache.is_dirty());
    }

    #[test]
    fn changed_route_redirties() {
        let mut cache = RouteCache::new();
        cache.update(vec![[0x11, 0x22]]);
        cache.clear_dirty();
        cache.update(vec![[0x99, 0x99]]);
        assert!(cache.is_dirty());
    }

    #[test]
    fn huge_reduction_falls_back_to_base_chunk() {
        let mut cache = RouteCache::new();
        cache.update((0..30).map(|i| [i, i]).collect());
        assert_eq!(cache.chunk_limit(), BASE_CHUNK);
    }

    #[test]
    fn route_set_frame_matches_s4_layout() {
        use crate::address::RemoteAddress;

        let mut cache = RouteCache::new();
        cache.update(vec![[0x11, 0x22], [0x33, 0x44]]);
        let target = RemoteAddress::new([0, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        let addr = target.wire_bytes();
        let wire = cache.route_set_wire_frame(&addr).unwrap().unwrap();

        // 0x21 | addr(10) | reserved(0x00) | 02 | 11 22 33 44
        assert_eq!(wire[3], 0x21);
        let route_area = &wire[wire.len() - 6..];
        assert_eq!(route_area, &[0x00, 0x02, 0x11, 0x22, 0x33, 0x44]);
    }
}
