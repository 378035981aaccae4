// crates/ledger/src/codec.rs
//! Wire helpers for native-contract arguments: compact varuints and
//! length-prefixed strings, plus the `Params` list exchanged with the
//! global-params contract.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of input")]
    Eof,
    #[error("varuint is not minimally encoded")]
    NonCanonicalVarUint,
    #[error("string is not valid utf-8")]
    Utf8,
    #[error("length {0} exceeds input")]
    Oversized(u64),
}

/// Compact varuint: `< 0xfd` one byte, then 0xfd+u16, 0xfe+u32, 0xff+u64,
/// all little-endian.
pub fn write_var_uint(out: &mut Vec<u8>, v: u64) {
    if v < 0xfd {
        out.push(v as u8);
    } else if v <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(v as u16).to_le_bytes());
    } else if v <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(v as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

pub fn read_var_uint(input: &mut &[u8]) -> Result<u64, CodecError> {
    let (&tag, rest) = input.split_first().ok_or(CodecError::Eof)?;
    *input = rest;
    let v = match tag {
        0xfd => {
            let b = take(input, 2)?;
            u16::from_le_bytes([b[0], b[1]]) as u64
        }
        0xfe => {
            let b = take(input, 4)?;
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as u64
        }
        0xff => {
            let b = take(input, 8)?;
            u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        }
        n => return Ok(n as u64),
    };
    let min = match tag {
        0xfd => 0xfd,
        0xfe => 0x1_0000,
        _ => 0x1_0000_0000,
    };
    if v < min {
        return Err(CodecError::NonCanonicalVarUint);
    }
    Ok(v)
}

pub fn write_string(out: &mut Vec<u8>, s: &str) {
    write_var_uint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

pub fn read_string(input: &mut &[u8]) -> Result<String, CodecError> {
    let len = read_var_uint(input)?;
    let bytes = take(input, len as usize)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Utf8)
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::Oversized(n as u64));
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

/// Key/value list as serialized by the global-params native contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params(pub Vec<(String, String)>);

impl Params {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_var_uint(&mut out, self.0.len() as u64);
        for (key, value) in &self.0 {
            write_string(&mut out, key);
            write_string(&mut out, value);
        }
        out
    }

    pub fn deserialize(mut input: &[u8]) -> Result<Params, CodecError> {
        let count = read_var_uint(&mut input)?;
        let mut params = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = read_string(&mut input)?;
            let value = read_string(&mut input)?;
            params.push((key, value));
        }
        Ok(Params(params))
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Request body for `getGlobalParam`: varuint count plus the names.
pub fn serialize_param_names(names: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    write_var_uint(&mut out, names.len() as u64);
    for name in names {
        write_string(&mut out, name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varuint_roundtrip_at_boundaries() {
        for v in [0u64, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 1 << 40] {
            let mut out = Vec::new();
            write_var_uint(&mut out, v);
            let mut s = out.as_slice();
            assert_eq!(read_var_uint(&mut s).unwrap(), v);
            assert!(s.is_empty());
        }
    }

    #[test]
    fn non_canonical_varuint_rejected() {
        // 0xfd prefix for a value that fits in one byte
        let raw = [0xfdu8, 0x05, 0x00];
        let mut s = raw.as_slice();
        assert!(matches!(
            read_var_uint(&mut s),
            Err(CodecError::NonCanonicalVarUint)
        ));
    }

    #[test]
    fn params_roundtrip() {
        let params = Params(vec![
            ("contract.create".into(), "500000".into()),
            ("invoke.codeLen".into(), "".into()),
        ]);
        let bytes = params.serialize();
        assert_eq!(Params::deserialize(&bytes).unwrap(), params);
        assert_eq!(params.get("contract.create"), Some("500000"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn truncated_params_error() {
        let params = Params(vec![("a".into(), "b".into())]);
        let bytes = params.serialize();
        assert!(Params::deserialize(&bytes[..bytes.len() - 1]).is_err());
    }
}
