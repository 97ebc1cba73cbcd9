use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read};
use std::path::Path;
use twox_hash::XxHash64;

const READ_CHUNK_LENGTH: usize = 64 * 1024;

/// Content checksum for a local file: XxHash64 (seed 0) over the whole file,
/// rendered as 16 lowercase hex digits.
///
/// Files are streamed in 64KB chunks so large videos never sit in memory.
pub fn content_checksum(file: &Path) -> io::Result<String> {
    let mut f = File::open(file)?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buffer = vec![0; READ_CHUNK_LENGTH];
    loop {
        let bytes_read = f.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.write(&buffer[..bytes_read]);
    }
    Ok(format!("{:016x}", hasher.finish()))
}
