use bitflags::bitflags;

bitflags! {
    /// Encoding stages active for a session.
    ///
    /// The two flags are independent: any combination is a valid
    /// session mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EncodingMode: u8 {
        /// Frames are sign-bitmap deltas against the previous frame.
        const DELTA = 0b0000_0001;
        /// Payloads are LZ4 block compressed.
        const COMPRESSION = 0b0000_0010;
    }
}

impl EncodingMode {
    pub fn from_flags(delta_enabled: bool, compression_enabled: bool) -> Self {
        let mut mode = EncodingMode::empty();
        mode.set(EncodingMode::DELTA, delta_enabled);
        mode.set(EncodingMode::COMPRESSION, compression_enabled);
        mode
    }

    pub fn delta(self) -> bool {
        self.contains(EncodingMode::DELTA)
    }

    pub fn compression(self) -> bool {
        self.contains(EncodingMode::COMPRESSION)
    }
}

impl std::fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.delta(), self.compression()) {
            (true, true) => write!(f, "delta+lz4"),
            (true, false) => write!(f, "delta"),
            (false, true) => write!(f, "lz4"),
            (false, false) => write!(f, "raw"),
        }
    }
}
