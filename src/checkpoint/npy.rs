//! Minimal reader/writer for 2-D little-endian `f64` arrays in the NumPy `.npy` format
//!
//! Only what the Q-table needs: dtype `<f8`, C order, exactly two dimensions. Written files use
//! format version 1.0 with the header padded to a 64 byte boundary.

use std::io::{self, Read, Write};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const ALIGN: usize = 64;

/// A row-major 2-D array
#[derive(Debug, Clone, PartialEq)]
pub struct Array2 {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

pub fn write<W: Write>(writer: &mut W, rows: usize, cols: usize, data: &[f64]) -> io::Result<()> {
    assert_eq!(data.len(), rows * cols, "array data does not match its shape");

    let mut header =
        format!("{{'descr': '<f8', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    header.extend(std::iter::repeat(' ').take((ALIGN - unpadded % ALIGN) % ALIGN));
    header.push('\n');
    let header_len = u16::try_from(header.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "npy header too long"))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(header.as_bytes())?;
    for value in data {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

pub fn read<R: Read>(reader: &mut R) -> io::Result<Array2> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(invalid("not an .npy file"));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => return Err(invalid(format!("unsupported .npy version {v}"))),
    };

    let mut header = Vec::new();
    reader
        .by_ref()
        .take(header_len as u64)
        .read_to_end(&mut header)?;
    if header.len() != header_len {
        return Err(invalid("truncated .npy header"));
    }
    let header = String::from_utf8(header).map_err(|_| invalid("non UTF-8 .npy header"))?;

    let descr = quoted_value(&header, "descr")?;
    if descr != "<f8" {
        return Err(invalid(format!("unsupported dtype {descr}, expected <f8")));
    }
    if !value_after(&header, "fortran_order")?.starts_with("False") {
        return Err(invalid("Fortran-ordered arrays are not supported"));
    }
    let (rows, cols) = shape(&header)?;

    let bytes = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(8))
        .ok_or_else(|| invalid("array shape overflows"))?;
    let mut raw = Vec::new();
    reader.take(bytes as u64).read_to_end(&mut raw)?;
    if raw.len() != bytes {
        return Err(invalid(format!(
            "truncated .npy data: expected {bytes} bytes, found {}",
            raw.len()
        )));
    }
    let data = raw
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect();

    Ok(Array2 { rows, cols, data })
}

/// Text following `'key':` in the header dict
fn value_after<'a>(header: &'a str, key: &str) -> io::Result<&'a str> {
    let pattern = format!("'{key}':");
    let start = header
        .find(&pattern)
        .ok_or_else(|| invalid(format!("missing `{key}` in .npy header")))?;
    Ok(header[start + pattern.len()..].trim_start())
}

fn quoted_value<'a>(header: &'a str, key: &str) -> io::Result<&'a str> {
    let rest = value_after(header, key)?;
    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| invalid(format!("`{key}` is not a string")))?;
    let rest = &rest[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| invalid(format!("unterminated `{key}`")))?;
    Ok(&rest[..end])
}

fn shape(header: &str) -> io::Result<(usize, usize)> {
    let rest = value_after(header, "shape")?;
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.find(')').map(|end| &r[..end]))
        .ok_or_else(|| invalid("malformed `shape`"))?;
    let dims = inner
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.parse::<usize>().map_err(|_| invalid(format!("bad dimension `{d}`"))))
        .collect::<io::Result<Vec<_>>>()?;
    match dims[..] {
        [rows, cols] => Ok((rows, cols)),
        _ => Err(invalid(format!(
            "expected a 2-D array, found {} dimensions",
            dims.len()
        ))),
    }
}
