//! Building and reading the datagrams used by the query protocols.

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ReadError {
    #[error("tried to read {wanted} bytes but only {remaining} were left")]
    UnexpectedEof { wanted: usize, remaining: usize },
}

#[derive(Clone, Debug, Default)]
pub struct PacketWriter {
    order: ByteOrder,
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            buffer: Vec::new(),
        }
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.write_raw(&bytes)
    }

    /// Empty the buffer so it can be reused for the next packet. The byte
    /// order is kept.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// A cursor over a received datagram.
pub struct PacketReader<'a> {
    order: ByteOrder,
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            order,
            data,
            position: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(ReadError::UnexpectedEof {
                wanted: N,
                remaining,
            });
        }
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.data[self.position..self.position + N]);
        self.position += N;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        let bytes = self.take::<4>()?;
        Ok(match self.order {
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
        })
    }

    /// Read up to the next null byte and consume it.
    ///
    /// If there's no terminator left, the rest of the packet is returned, and
    /// at the end of the packet this returns an empty string. Callers that
    /// treat an empty string as the end of a section will therefore always
    /// stop.
    pub fn read_string(&mut self) -> String {
        let rest = &self.data[self.position..];
        let (string, consumed) = match rest.iter().position(|&b| b == 0) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.position += consumed;
        String::from_utf8_lossy(string).into_owned()
    }

    /// Skip `n` bytes without looking at them, stopping at the end of the
    /// packet.
    pub fn forward(&mut self, n: usize) {
        self.position = self.position.saturating_add(n).min(self.data.len());
    }
}
