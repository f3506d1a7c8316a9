/// A thin wrapper around a `Vec<u8>` with the writers the wire format needs.
pub struct WireBytes {
    bytes: Vec<u8>,
}

impl WireBytes {
    /// Constructs an empty `WireBytes` with at least the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Consumes the `WireBytes` and returns the underlying `Vec<u8>`.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    pub fn write_u32_le(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, n: i64) {
        self.write(&n.to_le_bytes());
    }

    /// Writes an unsigned LEB128 varint.
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80; // More bytes follow
            }
            self.bytes.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Writes a varint length prefix followed by the bytes.
    pub fn write_prefixed(&mut self, buf: &[u8]) {
        self.write_varint(buf.len() as u64);
        self.write(buf);
    }
}
