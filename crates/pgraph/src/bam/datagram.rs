//! Little-endian byte records and a cursor for reading them back

use super::BamError;

/// A growable byte record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datagram {
    data: Vec<u8>,
}

impl Datagram {
    /// An empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Raw bytes written so far
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn add_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn add_bool(&mut self, value: bool) {
        self.add_u8(u8::from(value));
    }

    pub fn add_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn add_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn add_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn add_f32(&mut self, value: f32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a u16 count, failing if `count` doesn't fit
    pub fn add_count(&mut self, count: usize) -> Result<(), BamError> {
        let count = u16::try_from(count).map_err(|_| BamError::TooLong { len: count, max: usize::from(u16::MAX) })?;
        self.add_u16(count);
        Ok(())
    }

    /// Append a u16-length-prefixed UTF-8 string
    pub fn add_string(&mut self, value: &str) -> Result<(), BamError> {
        self.add_count(value.len())?;
        self.data.extend_from_slice(value.as_bytes());
        Ok(())
    }
}

/// Reads values back out of a [`Datagram`] in the order they were added
#[derive(Debug, Clone)]
pub struct DatagramIterator<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DatagramIterator<'a> {
    /// Start reading at the beginning of `datagram`
    pub fn new(datagram: &'a Datagram) -> Self {
        Self {
            data: datagram.get_data(),
            pos: 0,
        }
    }

    /// Bytes not yet read
    pub fn get_remaining_size(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], BamError> {
        let bytes = self.take_slice(N)?;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_slice(&mut self, len: usize) -> Result<&'a [u8], BamError> {
        let remaining = self.get_remaining_size();
        if len > remaining {
            return Err(BamError::Truncated { needed: len, remaining });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, BamError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, BamError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, BamError> {
        self.take().map(u16::from_le_bytes)
    }

    pub fn get_u32(&mut self) -> Result<u32, BamError> {
        self.take().map(u32::from_le_bytes)
    }

    pub fn get_i32(&mut self) -> Result<i32, BamError> {
        self.take().map(i32::from_le_bytes)
    }

    pub fn get_f32(&mut self) -> Result<f32, BamError> {
        self.take().map(f32::from_le_bytes)
    }

    /// Read a u16-length-prefixed UTF-8 string
    pub fn get_string(&mut self) -> Result<String, BamError> {
        let len = usize::from(self.get_u16()?);
        let bytes = self.take_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BamError::InvalidString)
    }
}
