//! Raw element streams.
//!
//! The lowest layer of tensor serialization: a run of elements written to, or read from, a
//! caller-supplied stream in one of two encodings.
//!
//! - [`Encoding::Binary`] writes the in-memory representation of every element, byte-swapped
//!   when the requested [`Endianness`] differs from the host's.
//! - [`Encoding::Text`] writes the elements in decimal separated by single spaces, with a
//!   newline after the run. Floats are printed in the shortest form that reads back to the
//!   same value. `u8` and `i8` runs are written as raw bytes even in text mode.
//!
//! [`write_storage`] and [`read_storage`] frame a whole storage as its element count, one
//! `i64` in the same encoding, followed by the elements.
//!
//! A stream ending before the requested count is a resource error, like any other I/O
//! failure.

use std::io::{BufRead, ErrorKind, Write};

use crate::error::{raise, Result, TensorError};
use crate::scalars::{Kind, Numeric};
use crate::storage::Storage;

/// Byte order of binary element streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary(Endianness),
    Text,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Binary(Endianness::native())
    }
}

fn io_error(context: String, source: std::io::Error) -> TensorError {
    raise(TensorError::io(context, source))
}

fn short_read(read: usize, wanted: usize) -> TensorError {
    io_error(
        format!("read error: read {} blocks instead of {}", read, wanted),
        std::io::Error::from(ErrorKind::UnexpectedEof),
    )
}

fn swaps(encoding: Encoding) -> bool {
    matches!(encoding, Encoding::Binary(order) if order != Endianness::native())
}

fn is_raw_text<T: Numeric>() -> bool {
    matches!(T::KIND, Kind::Byte | Kind::Char)
}

/// Views the elements as bytes. Every kind is plain data without padding.
fn as_bytes<T: Numeric>(data: &[T]) -> &[u8] {
    unsafe { core::slice::from_raw_parts(data.as_ptr() as *const u8, core::mem::size_of_val(data)) }
}

fn as_bytes_mut<T: Numeric>(data: &mut [T]) -> &mut [u8] {
    unsafe { core::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut u8, core::mem::size_of_val(data)) }
}

fn reverse_elements(bytes: &mut [u8], width: usize) {
    if width > 1 {
        bytes.chunks_exact_mut(width).for_each(|element| element.reverse());
    }
}

// region: Writing

/// Writes every element of `data` to `writer`. Returns the number of elements written.
pub fn write_raw<T: Numeric, W: Write>(writer: &mut W, data: &[T], encoding: Encoding) -> Result<usize> {
    let n = data.len();
    let written = match encoding {
        Encoding::Binary(_) if swaps(encoding) => {
            let mut buffer = as_bytes(data).to_vec();
            reverse_elements(&mut buffer, T::KIND.element_size());
            writer.write_all(&buffer)
        }
        Encoding::Binary(_) => writer.write_all(as_bytes(data)),
        Encoding::Text if is_raw_text::<T>() => writer.write_all(as_bytes(data)).and_then(|_| {
            if n > 0 {
                writer.write_all(b"\n")
            } else {
                Ok(())
            }
        }),
        Encoding::Text => write_text(writer, data),
    };
    written.map_err(|source| io_error(format!("write error: failed writing {} blocks", n), source))?;
    tracing::trace!(kind = %T::KIND, elements = n, ?encoding, "wrote raw elements");
    Ok(n)
}

fn write_text<T: Numeric, W: Write>(writer: &mut W, data: &[T]) -> std::io::Result<()> {
    for (i, value) in data.iter().enumerate() {
        if i > 0 {
            writer.write_all(b" ")?;
        }
        write!(writer, "{}", value)?;
    }
    if !data.is_empty() {
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Writes the element count of `storage` followed by its elements.
pub fn write_storage<T: Numeric, W: Write>(writer: &mut W, storage: &Storage<T>, encoding: Encoding) -> Result<()> {
    let elements = storage.to_vec();
    write_raw(writer, &[elements.len() as i64], encoding)?;
    write_raw(writer, &elements, encoding)?;
    Ok(())
}

// endregion: Writing

// region: Reading

/// Fills `out` from `reader`. Returns the number of elements read, which is `out.len()`.
pub fn read_raw<T: Numeric, R: BufRead>(reader: &mut R, out: &mut [T], encoding: Encoding) -> Result<usize> {
    let n = out.len();
    match encoding {
        Encoding::Binary(_) => {
            let width = T::KIND.element_size();
            let bytes = as_bytes_mut(out);
            let filled = fill_bytes(reader, bytes)?;
            if filled < bytes.len() {
                return Err(short_read(filled / width, n));
            }
            if swaps(encoding) {
                reverse_elements(bytes, width);
            }
        }
        Encoding::Text if is_raw_text::<T>() => {
            let bytes = as_bytes_mut(out);
            let filled = fill_bytes(reader, bytes)?;
            if filled < n {
                return Err(short_read(filled, n));
            }
            if n > 0 {
                skip_newline(reader)?;
            }
        }
        Encoding::Text => {
            for (i, slot) in out.iter_mut().enumerate() {
                let token = next_token(reader)?;
                *slot = match parse::<T>(&token) {
                    Some(value) => value,
                    None => return Err(short_read(i, n)),
                };
            }
        }
    }
    tracing::trace!(kind = %T::KIND, elements = n, ?encoding, "read raw elements");
    Ok(n)
}

/// Reads an element count and that many elements into a new storage.
pub fn read_storage<T: Numeric, R: BufRead>(reader: &mut R, encoding: Encoding) -> Result<Storage<T>> {
    let mut count = [0i64];
    read_raw(reader, &mut count, encoding)?;
    let size = usize::try_from(count[0]).map_err(|_| {
        io_error(
            format!("invalid element count {}", count[0]),
            std::io::Error::from(ErrorKind::InvalidData),
        )
    })?;
    let storage = Storage::try_new(size)?;
    read_raw(reader, unsafe { storage.as_mut_slice() }, encoding)?;
    Ok(storage)
}

fn fill_bytes<R: BufRead>(reader: &mut R, bytes: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < bytes.len() {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read error".to_string(), err)),
        }
    }
    Ok(filled)
}

fn peek<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    loop {
        match reader.fill_buf() {
            Ok(buffer) => return Ok(buffer.first().copied()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("read error".to_string(), err)),
        }
    }
}

fn skip_newline<R: BufRead>(reader: &mut R) -> Result<()> {
    if peek(reader)? == Some(b'\n') {
        reader.consume(1);
    }
    Ok(())
}

/// Next whitespace-delimited token; empty at the end of the stream.
fn next_token<R: BufRead>(reader: &mut R) -> Result<String> {
    while let Some(byte) = peek(reader)? {
        if !byte.is_ascii_whitespace() {
            break;
        }
        reader.consume(1);
    }
    let mut token = String::new();
    while let Some(byte) = peek(reader)? {
        if byte.is_ascii_whitespace() {
            break;
        }
        token.push(byte as char);
        reader.consume(1);
    }
    Ok(token)
}

fn parse<T: Numeric>(token: &str) -> Option<T> {
    if T::KIND.is_floating() {
        token.parse::<f64>().ok().map(T::from_f64)
    } else {
        token.parse::<i64>().ok().map(T::from_i64)
    }
}

// endregion: Reading

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::tests::HANDLER_LOCK;
    use crate::error::{reset_error_handlers, set_resource_error_handler, Disposition};
    use crate::scalars::f16;

    #[test]
    fn binary_respects_endianness() {
        let mut big = Vec::new();
        write_raw(&mut big, &[1i32, 0x0102], Encoding::Binary(Endianness::Big)).unwrap();
        assert_eq!(big, vec![0, 0, 0, 1, 0, 0, 1, 2]);

        let mut little = Vec::new();
        write_raw(&mut little, &[1i16], Encoding::Binary(Endianness::Little)).unwrap();
        assert_eq!(little, vec![1, 0]);

        let mut back = [0i32; 2];
        read_raw(&mut big.as_slice(), &mut back, Encoding::Binary(Endianness::Big)).unwrap();
        assert_eq!(back, [1, 0x0102]);
    }

    #[test]
    fn text_is_space_separated() {
        let mut out = Vec::new();
        write_raw(&mut out, &[1.5f64, -2.0, 0.1], Encoding::Text).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "1.5 -2 0.1\n");

        let mut back = [0.0f64; 3];
        read_raw(&mut out.as_slice(), &mut back, Encoding::Text).unwrap();
        assert_eq!(back, [1.5, -2.0, 0.1]);

        let mut ints = [0i64; 3];
        read_raw(&mut "  7\n-8\t9 ".as_bytes(), &mut ints, Encoding::Text).unwrap();
        assert_eq!(ints, [7, -8, 9]);
    }

    #[test]
    fn text_bytes_are_raw() {
        let mut out = Vec::new();
        write_raw(&mut out, b"ab", Encoding::Text).unwrap();
        assert_eq!(out, b"ab\n");

        let mut reader = "ab\ncd".as_bytes();
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        read_raw(&mut reader, &mut first, Encoding::Text).unwrap();
        read_raw(&mut reader, &mut second, Encoding::Text).unwrap();
        assert_eq!((&first, &second), (b"ab", b"cd"));
    }

    #[test]
    fn storage_round_trip() {
        for encoding in [Encoding::Text, Encoding::Binary(Endianness::Big), Encoding::default()] {
            let storage = Storage::from_vec(vec![f16::from_f32(0.5), f16::from_f32(-3.0)]);
            let mut out = Vec::new();
            write_storage(&mut out, &storage, encoding).unwrap();
            let back: Storage<f16> = read_storage(&mut out.as_slice(), encoding).unwrap();
            assert_eq!(back.to_vec(), storage.to_vec());
        }
    }

    #[test]
    fn short_stream_is_a_resource_error() {
        let _guard = HANDLER_LOCK.lock();
        set_resource_error_handler(|_| Disposition::Propagate);
        let mut values = [0i32; 3];
        let binary = read_raw(&mut [1u8, 0, 0, 0, 2].as_slice(), &mut values, Encoding::default());
        let text = read_raw(&mut "1 2 x".as_bytes(), &mut values, Encoding::Text);
        reset_error_handlers();

        let binary = binary.unwrap_err();
        assert!(matches!(binary, TensorError::Io { .. }));
        assert!(binary.to_string().contains("read 1 blocks instead of 3"));
        assert!(text.unwrap_err().to_string().contains("read 2 blocks instead of 3"));
    }
}
