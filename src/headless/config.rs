//=========================================================================
// Headless Configuration
//=========================================================================

/// Logic-thread settings for a [`super::HeadlessFactory`].
///
/// # Default Values
///
/// - **TPS**: 60.0 (logic updates per second)
/// - **Command capacity**: 64 queued scene commands
///
/// # Examples
///
/// ```
/// use aetheric_bridge::headless::HeadlessConfig;
///
/// let config = HeadlessConfig::new()
///     .with_tps(120.0)
///     .with_command_capacity(16);
///
/// assert_eq!(config.tps(), 120.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessConfig {
    tps: f64,
    command_capacity: usize,
}

impl HeadlessConfig {
    pub fn new() -> Self {
        Self {
            tps: 60.0,
            command_capacity: 64,
        }
    }

    /// Sets the target ticks per second for the logic thread.
    ///
    /// Default: 60.0
    ///
    /// # Panics
    ///
    /// Panics if `tps <= 0.0`.
    pub fn with_tps(mut self, tps: f64) -> Self {
        assert!(tps > 0.0, "TPS must be positive, got {}", tps);
        self.tps = tps;
        self
    }

    /// Sets how many scene commands may be queued between ticks.
    ///
    /// Requests made while the queue is full are refused, not blocked.
    ///
    /// Default: 64
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Command capacity must be positive");
        self.command_capacity = capacity;
        self
    }

    pub fn tps(&self) -> f64 {
        self.tps
    }

    pub fn command_capacity(&self) -> usize {
        self.command_capacity
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
