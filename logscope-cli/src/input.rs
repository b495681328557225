use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

pub async fn read_log_file(path: &Path) -> Result<String> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    debug!("Read {} bytes from {}", data.len(), path.display());

    let (text, encoding) = decode_bytes(&data);
    info!("Decoded {} as {}", path.display(), encoding.name());
    Ok(text)
}

pub async fn read_stdin() -> Result<String> {
    let mut data = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut data)
        .await
        .context("Failed to read log text from stdin")?;
    Ok(decode_bytes(&data).0)
}

/// Decodes log bytes: a BOM wins, then a UTF-16 guess from NUL byte
/// placement, then valid UTF-8, and finally Windows-1252, which never fails.
pub fn decode_bytes(data: &[u8]) -> (String, &'static Encoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(data) {
        let (text, _) = encoding.decode_without_bom_handling(&data[bom_len..]);
        return (text.into_owned(), encoding);
    }

    if let Some(encoding) = utf16_guess(data) {
        let (text, _) = encoding.decode_without_bom_handling(data);
        return (text.into_owned(), encoding);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        return (text.to_string(), UTF_8);
    }

    let (text, _) = WINDOWS_1252.decode_without_bom_handling(data);
    (text.into_owned(), WINDOWS_1252)
}

fn utf16_guess(data: &[u8]) -> Option<&'static Encoding> {
    let sample = &data[..data.len().min(1024)];
    if sample.len() < 4 {
        return None;
    }
    let pairs = sample.len() / 2;
    let even_nuls = sample.iter().step_by(2).filter(|b| **b == 0).count();
    let odd_nuls = sample.iter().skip(1).step_by(2).filter(|b| **b == 0).count();

    if odd_nuls * 10 > pairs * 4 && even_nuls * 10 < pairs {
        Some(UTF_16LE)
    } else if even_nuls * 10 > pairs * 4 && odd_nuls * 10 < pairs {
        Some(UTF_16BE)
    } else {
        None
    }
}
