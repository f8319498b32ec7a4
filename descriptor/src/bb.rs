use std::str;

/// A descriptor-set byte buffer meant for reading.
///
/// Example usage:
///
/// ```
/// let mut bb = entigen_descriptor::bb::ByteBuffer::new(&[99, 111, 117, 110, 116, 101, 114, 0, 3]);
/// assert_eq!(bb.read_string(), Ok("counter"));
/// assert_eq!(bb.read_var_uint(), Ok(3));
/// ```
///
pub struct ByteBuffer<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &[u8]) -> ByteBuffer {
        ByteBuffer { data, index: 0 }
    }

    /// Retrieves the current index into the underlying byte slice. This starts
    /// off as 0 and ends up as `self.data().len()` when everything has been
    /// read.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, ()> {
        if self.index >= self.data.len() {
            Err(())
        } else {
            let value = self.data[self.index];
            self.index += 1;
            Ok(value)
        }
    }

    /// Try to read a fixed number of bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ()> {
        if self.index + len > self.data.len() {
            Err(())
        } else {
            let value = &self.data[self.index..self.index + len];
            self.index += len;
            Ok(value)
        }
    }

    /// Try to read a variable-length unsigned 32-bit integer starting at the
    /// current index.
    pub fn read_var_uint(&mut self) -> Result<u32, ()> {
        let mut shift: u8 = 0;
        let mut result: u32 = 0;

        loop {
            let byte = self.read_byte()?;
            result |= ((byte & 127) as u32) << shift;
            shift += 7;

            if (byte & 128) == 0 || shift >= 35 {
                break;
            }
        }

        Ok(result)
    }

    /// Try to read a zero-terminated UTF-8 string starting at the current
    /// index. The string is returned as a slice so it just aliases the
    /// underlying memory. Invalid UTF-8 is an error, not a lossy decode.
    pub fn read_string(&mut self) -> Result<&'a str, ()> {
        let start = self.index;

        while self.index < self.data.len() {
            if self.data[self.index] == 0 {
                self.index += 1;
                return str::from_utf8(&self.data[start..self.index - 1]).map_err(|_| ());
            }

            self.index += 1;
        }

        Err(())
    }
}

#[test]
fn read_byte() {
    let read = |bytes| ByteBuffer::new(bytes).read_byte();
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[254]), Ok(254));
}

#[test]
fn read_var_uint() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_uint();
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[127]), Ok(127));
    assert_eq!(read(&[128, 1]), Ok(128));
    assert_eq!(read(&[255, 255, 255, 255, 15]), Ok(u32::MAX));
}

#[test]
fn read_string() {
    let read = |bytes| ByteBuffer::new(bytes).read_string();
    assert_eq!(read(&[]), Err(()));
    assert_eq!(read(&[0]), Ok(""));
    assert_eq!(read(&[97, 98, 99, 0]), Ok("abc"));
    // Missing terminator
    assert_eq!(read(&[97, 98, 99]), Err(()));
    // Invalid UTF-8
    assert_eq!(read(&[0xFF, 0xFE, 0]), Err(()));
}

/// A descriptor-set byte buffer meant for writing.
///
/// Example usage:
///
/// ```
/// let mut bb = entigen_descriptor::bb::ByteBufferMut::new();
/// bb.write_string("counter");
/// bb.write_var_uint(3);
/// assert_eq!(bb.data(), [99, 111, 117, 110, 116, 101, 114, 0, 3]);
/// ```
///
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Write a byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    /// Write a variable-length unsigned 32-bit integer to the end of the buffer.
    pub fn write_var_uint(&mut self, mut value: u32) {
        loop {
            let byte = value as u8 & 127;
            value >>= 7;

            if value == 0 {
                self.write_byte(byte);
                return;
            }

            self.write_byte(byte | 128);
        }
    }

    /// Write a zero-terminated UTF-8 string to the end of the buffer.
    pub fn write_string(&mut self, value: &str) {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
    }
}

impl Default for ByteBufferMut {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn write_var_uint_round_trip() {
    for value in [0u32, 1, 127, 128, 16383, 16384, u32::MAX] {
        let mut bb = ByteBufferMut::new();
        bb.write_var_uint(value);
        let data = bb.data();
        assert_eq!(ByteBuffer::new(&data).read_var_uint(), Ok(value));
    }
}

#[test]
fn write_string_round_trip() {
    let mut bb = ByteBufferMut::new();
    bb.write_string("CounterService");
    bb.write_string("");
    let data = bb.data();
    let mut reader = ByteBuffer::new(&data);
    assert_eq!(reader.read_string(), Ok("CounterService"));
    assert_eq!(reader.read_string(), Ok(""));
    assert_eq!(reader.index(), data.len());
}
