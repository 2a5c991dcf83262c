//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::relay::RelaySettings;

/// Configuration for the control-plane server and the relays it spawns
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the control-plane listener binds to; channel listeners bind
    /// on the same IP
    pub bind_addr: SocketAddr,

    /// Inclusive bounds of the ephemeral port pool shared by all
    /// conferences
    pub port_range: (u16, u16),

    /// Compositor cycle cadence (default 50 ms, ~20 Hz)
    pub compositor_interval: Duration,

    /// Per-sender camera FIFO depth
    pub camera_buffer_capacity: usize,

    /// Composited output frame dimensions
    pub canvas_width: u32,
    pub canvas_height: u32,

    /// How long the cancel sentinel gets to drain before teardown
    pub cancel_flush_delay: Duration,

    /// Enable TCP_NODELAY on every accepted connection
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8888".parse().unwrap(),
            port_range: (50000, 60000),
            compositor_interval: Duration::from_millis(50),
            camera_buffer_capacity: 10,
            canvas_width: 640,
            canvas_height: 360,
            cancel_flush_delay: Duration::from_millis(250),
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a config with a custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the port pool bounds (inclusive)
    pub fn port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range = (start, end);
        self
    }

    /// Set the compositor cadence
    pub fn compositor_interval(mut self, interval: Duration) -> Self {
        self.compositor_interval = interval;
        self
    }

    /// Set the camera buffer depth
    pub fn camera_buffer_capacity(mut self, capacity: usize) -> Self {
        self.camera_buffer_capacity = capacity.max(1);
        self
    }

    /// Set the composited output dimensions
    pub fn canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Set the cancel sentinel flush delay
    pub fn cancel_flush_delay(mut self, delay: Duration) -> Self {
        self.cancel_flush_delay = delay;
        self
    }

    /// The subset of settings a conference relay needs
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            bind_ip: self.bind_addr.ip(),
            compositor_interval: self.compositor_interval,
            camera_buffer_capacity: self.camera_buffer_capacity,
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            cancel_flush_delay: self.cancel_flush_delay,
            tcp_nodelay: self.tcp_nodelay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8888);
        assert_eq!(config.port_range, (50000, 60000));
        assert_eq!(config.compositor_interval, Duration::from_millis(50));
        assert_eq!(config.camera_buffer_capacity, 10);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "0.0.0.0:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .port_range(40000, 41000)
            .compositor_interval(Duration::from_millis(100))
            .camera_buffer_capacity(4)
            .canvas(320, 180)
            .cancel_flush_delay(Duration::from_millis(50));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.port_range, (40000, 41000));
        assert_eq!(config.compositor_interval, Duration::from_millis(100));
        assert_eq!(config.camera_buffer_capacity, 4);
        assert_eq!((config.canvas_width, config.canvas_height), (320, 180));
        assert_eq!(config.cancel_flush_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_camera_capacity_floor_is_one() {
        let config = ServerConfig::default().camera_buffer_capacity(0);
        assert_eq!(config.camera_buffer_capacity, 1);
    }

    #[test]
    fn test_relay_settings_inherit_bind_ip() {
        let config = ServerConfig::with_addr("10.1.2.3:8888".parse().unwrap());
        let settings = config.relay_settings();
        assert_eq!(settings.bind_ip.to_string(), "10.1.2.3");
        assert_eq!(settings.camera_buffer_capacity, 10);
    }
}
