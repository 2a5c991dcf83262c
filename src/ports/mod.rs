//! Ephemeral port allocation
//!
//! One process-wide pool hands out channel ports to every conference.
//! Candidates are shuffled once at construction so repeated allocations do
//! not bias toward the low end of the range, and every grant is backed by a
//! real bind probe so a port held by an unrelated process is skipped rather
//! than handed out.

use std::collections::HashSet;
use std::net::IpAddr;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::error::{Error, Result};

/// Collision-free port pool over an inclusive range
///
/// The pool itself is synchronous; callers serialize `allocate`/`release`
/// behind a mutex so the never-double-allocate invariant holds across
/// concurrent conference creation.
#[derive(Debug)]
pub struct PortPool {
    /// Shuffled candidate order, fixed for the pool's lifetime
    candidates: Vec<u16>,
    /// Ports currently granted and not yet released
    in_use: HashSet<u16>,
    /// Address the bind probe targets
    probe_ip: IpAddr,
}

impl PortPool {
    /// Create a pool over `start..=end`, probing against `probe_ip`
    pub fn new(start: u16, end: u16, probe_ip: IpAddr) -> Self {
        let mut candidates: Vec<u16> = (start..=end).collect();
        candidates.shuffle(&mut thread_rng());
        PortPool {
            candidates,
            in_use: HashSet::new(),
            probe_ip,
        }
    }

    /// Allocate exactly `n` distinct verified-free ports.
    ///
    /// Fails atomically: if fewer than `n` candidates survive the in-use
    /// filter and the bind probe, every speculatively reserved port is
    /// returned before the error, leaving the pool unchanged.
    pub fn allocate(&mut self, n: usize) -> Result<Vec<u16>> {
        let mut granted = Vec::with_capacity(n);

        for &port in &self.candidates {
            if self.in_use.contains(&port) {
                continue;
            }
            if !probe_free(self.probe_ip, port) {
                tracing::debug!(port = port, "port occupied by another process, skipping");
                continue;
            }
            self.in_use.insert(port);
            granted.push(port);
            if granted.len() == n {
                return Ok(granted);
            }
        }

        for port in granted {
            self.in_use.remove(&port);
        }
        Err(Error::PortsExhausted)
    }

    /// Return ports to the pool. Releasing a port not currently held is a
    /// no-op, so double release after teardown races is harmless.
    pub fn release(&mut self, ports: &[u16]) {
        for port in ports {
            self.in_use.remove(port);
        }
    }

    /// Number of ports currently granted
    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    /// Whether a specific port is currently granted
    pub fn is_in_use(&self, port: u16) -> bool {
        self.in_use.contains(&port)
    }
}

/// Bind-and-release probe confirming the OS will actually let us take the
/// port right now.
fn probe_free(ip: IpAddr, port: u16) -> bool {
    std::net::TcpListener::bind((ip, port)).is_ok()
}
