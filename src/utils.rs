//! Small helpers shared by the session store, the brute-force guard and the handlers.

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Length in bytes of a session identifier before hex encoding.
pub const SESSION_ID_BYTES: usize = 32;

/// Length of the anti-cache query parameter appended to links.
pub const NO_CACHE_ID_LENGTH: usize = 10;

/// Random alphanumeric string (`[a-zA-Z0-9]`) of exactly `length` characters.
#[must_use]
pub fn random_id(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Random uppercase hex string built from `bytes` random bytes (`2 * bytes` characters).
#[must_use]
pub fn random_hex_id(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode_upper(buf)
}

/// One-way hash used to store and compare passwords.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    hex::encode(digest)
}

/// Human readable file size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(size: u64) -> String {
    const KIB: f64 = 1024.0;
    let fsize = size as f64;
    if size < 10_000 {
        format!("{size} bytes")
    } else if fsize < KIB * KIB {
        format!("{:.2} KiB", fsize / KIB)
    } else if fsize < KIB * KIB * KIB {
        format!("{:.2} MiB", fsize / (KIB * KIB))
    } else if fsize < KIB * KIB * KIB * KIB {
        format!("{:.2} GiB", fsize / (KIB * KIB * KIB))
    } else {
        format!("{:.1} TiB", fsize / (KIB * KIB * KIB * KIB))
    }
}

/// Strip trailing `/` and `\` characters.
#[must_use]
pub fn trim_trailing_slashes(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
}

/// Every directory below `root`, as sorted forward-slash paths relative to `root`.
///
/// # Errors
/// Returns the first I/O error met while walking the tree.
pub fn dir_tree(root: &Path) -> std::io::Result<Vec<String>> {
    let mut directories = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let path = entry.path();
                if let Ok(relative) = path.strip_prefix(root) {
                    directories.push(relative.to_string_lossy().replace('\\', "/"));
                }
                pending.push(path);
            }
        }
    }

    directories.sort();
    Ok(directories)
}
