use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use brine_capnp_schema::format_capnp_id;
use lazy_static::lazy_static;
use rand::RngCore;
use regex::Regex;

lazy_static! {
    static ref FILE_ID_LINE: Regex = Regex::new(r"^@0x([0-9a-fA-F]{1,16})\s*;").unwrap();
}

/// Cap'n Proto requires bit 63 of every ID to be set.
pub const ID_HIGH_BIT: u64 = 1 << 63;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME:        u64 = 0x0000_0100_0000_01b3;

/// A fresh file-level ID from four 32-bit draws.
pub fn random_id() -> u64 {
    let mut rng = rand::thread_rng();
    let (r1, r2, r3, r4) = (
        rng.next_u32() as u64,
        rng.next_u32() as u64,
        rng.next_u32() as u64,
        rng.next_u32() as u64,
    );
    let hi = (r1 << 32) ^ r2;
    let lo = (r3 << 32) ^ r4;
    ((hi << 32) ^ lo) | ID_HIGH_BIT
}

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(FNV_PRIME)
    })
}

/// ID of a child node: FNV-1a over the parent ID (big-endian) followed by
/// the child's name. The same file ID and name always give the same result.
pub fn derive_id(parent_id: u64, name: &str) -> u64 {
    let mut bytes = Vec::with_capacity(8 + name.len());
    bytes.extend_from_slice(&parent_id.to_be_bytes());
    bytes.extend_from_slice(name.as_bytes());
    fnv1a_64(&bytes) | ID_HIGH_BIT
}

pub fn format_id_as_hex(id: u64) -> String {
    format_capnp_id(id)
}

/// Read the `@0x...;` file ID from the first line of a previously generated
/// schema. Missing or unreadable files, a first line without an ID, and an
/// ID of zero all yield `None`. Only the first line is read, so bytes further
/// down never affect the result.
pub fn extract_file_id(path: &Path) -> Option<u64> {
    let mut reader = BufReader::new(File::open(path).ok()?);
    let mut first_line = Vec::new();
    reader.read_until(b'\n', &mut first_line).ok()?;
    let first_line = String::from_utf8_lossy(&first_line);
    let captures = FILE_ID_LINE.captures(&first_line)?;
    match u64::from_str_radix(&captures[1], 16) {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}

/// The file ID to write into `path`: the existing one if present, so derived
/// IDs survive regeneration, otherwise a new random one.
pub fn resolve_file_id(path: &Path) -> u64 {
    match extract_file_id(path) {
        Some(id) => {
            tracing::debug!(path = %path.display(), id = %format_id_as_hex(id), "reusing file id");
            id
        }
        None => {
            let id = random_id();
            tracing::debug!(path = %path.display(), id = %format_id_as_hex(id), "minted new file id");
            id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_derive_id_is_stable_and_high_bit_set() {
        let file_id = 0xdead_beef_cafe_f00d;
        let a = derive_id(file_id, "Foo");
        assert_eq!(a, derive_id(file_id, "Foo"));
        assert_ne!(a, derive_id(file_id, "Bar"));
        assert_ne!(a, derive_id(file_id ^ 1, "Foo"));
        assert_ne!(a & ID_HIGH_BIT, 0);

        let mut bytes = file_id.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"Foo");
        assert_eq!(a, fnv1a_64(&bytes) | ID_HIGH_BIT);
    }

    #[test]
    fn test_random_ids_have_high_bit() {
        for _ in 0..64 {
            assert_ne!(random_id() & ID_HIGH_BIT, 0);
        }
    }

    #[test]
    fn test_format_id_as_hex() {
        assert_eq!(format_id_as_hex(0xabc), "@0x0000000000000abc");
        assert_eq!(format_id_as_hex(u64::MAX), "@0xffffffffffffffff");
    }

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_extract_file_id() {
        let file = file_with("@0xDEADBEEF00000001;\nusing Cxx = import \"/capnp/c++.capnp\";\n");
        assert_eq!(extract_file_id(file.path()), Some(0xdeadbeef00000001));

        let file = file_with("@0x1f ;\n");
        assert_eq!(extract_file_id(file.path()), Some(0x1f));
    }

    #[test]
    fn test_extract_file_id_rejects() {
        for contents in ["", "@0x0;\n", "# @0x1234;\n", "\n@0x1234;\n", "@0x12345678901234567;\n", "@0x1234\n"] {
            let file = file_with(contents);
            assert_eq!(extract_file_id(file.path()), None, "{:?}", contents);
        }
        assert_eq!(extract_file_id(Path::new("/definitely/not/here.capnp")), None);
    }

    #[test]
    fn test_extract_file_id_reads_only_first_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"@0x8000000000000abc;\n# caf\xe9 note\n").unwrap();
        assert_eq!(extract_file_id(file.path()), Some(0x8000000000000abc));
        assert_eq!(resolve_file_id(file.path()), 0x8000000000000abc);
    }

    #[test]
    fn test_resolve_file_id_reuses_existing() {
        let file = file_with("@0x8000000000000abc;\n");
        assert_eq!(resolve_file_id(file.path()), 0x8000000000000abc);

        let dir = tempfile::tempdir().unwrap();
        let fresh = resolve_file_id(&dir.path().join("new.capnp"));
        assert_ne!(fresh & ID_HIGH_BIT, 0);
    }
}
