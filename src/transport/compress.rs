use std::io::{self, Write};

use flate2::{Compression, write::GzEncoder};

/// Gzip-encode `data` at the default compression level.
pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
