//! Media <-> bit-text conversion

use std::path::{Path, PathBuf};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use vidpir_core::codec;
use vidpir_core::constants::ITEM_SUFFIX;
use vidpir_core::ItemId;

/// File extensions treated as video, compared case-insensitively
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "mkv", "avi", "wmv", "flv", "webm", "m4v", "mpg", "mpeg",
];

/// One converted file
#[derive(Debug, Clone)]
pub struct Converted {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Bits written when encoding, bytes written when decoding
    pub units: u64,
}

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Regular files in `dir` accepted by `filter`, sorted by name
fn list_files(dir: &Path, filter: impl Fn(&Path) -> bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && filter(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn progress(len: usize) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

fn file_name(path: &Path) -> anyhow::Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))
}

/// Encode one media file as `<out_dir>/<file name>.binary.txt`
pub fn encode_file(src: &Path, out_dir: &Path, chunk_bytes: usize) -> anyhow::Result<Converted> {
    let output = out_dir.join(format!("{}{}", file_name(src)?, ITEM_SUFFIX));
    let bits = codec::bytes_file_to_bit_text(src, &output, chunk_bytes)?;
    Ok(Converted {
        source: src.to_path_buf(),
        output,
        units: bits,
    })
}

/// Encode every video file in `src_dir` into `out_dir`
pub fn encode_dir(src_dir: &Path, out_dir: &Path, chunk_bytes: usize) -> anyhow::Result<Vec<Converted>> {
    let files = list_files(src_dir, is_video)?;
    if files.is_empty() {
        tracing::warn!(dir = %src_dir.display(), "No video files found");
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(out_dir)?;

    let pb = progress(files.len())?;
    let mut converted = Vec::with_capacity(files.len());
    for path in &files {
        pb.set_message(file_name(path)?.to_string());
        let result = encode_file(path, out_dir, chunk_bytes)?;
        tracing::info!(
            src = %result.source.display(),
            output = %result.output.display(),
            bits = result.units,
            "Encoded media file"
        );
        converted.push(result);
        pb.inc(1);
    }
    pb.finish_with_message("Done");
    Ok(converted)
}

/// Decode one `*.binary.txt` item back into `<out_dir>/<item name>`
///
/// A bit count that is not a multiple of 8 is zero-padded in the last byte.
pub fn decode_file(src: &Path, out_dir: &Path, chunk_bits: usize) -> anyhow::Result<Converted> {
    let item = ItemId::from_file_name(file_name(src)?)
        .with_context(|| format!("{} is not a bit-text item", src.display()))?;
    let output = out_dir.join(item.name());
    let bytes = codec::bit_text_file_to_bytes(src, &output, chunk_bits)?;
    Ok(Converted {
        source: src.to_path_buf(),
        output,
        units: bytes,
    })
}

/// Decode every bit-text item in `src_dir` into `out_dir`
pub fn decode_dir(src_dir: &Path, out_dir: &Path, chunk_bits: usize) -> anyhow::Result<Vec<Converted>> {
    let files = list_files(src_dir, |path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(ItemId::from_file_name)
            .is_some()
    })?;
    if files.is_empty() {
        tracing::warn!(dir = %src_dir.display(), "No bit-text items found");
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(out_dir)?;

    let pb = progress(files.len())?;
    let mut converted = Vec::with_capacity(files.len());
    for path in &files {
        pb.set_message(file_name(path)?.to_string());
        let result = decode_file(path, out_dir, chunk_bits)?;
        tracing::info!(
            src = %result.source.display(),
            output = %result.output.display(),
            bytes = result.units,
            "Decoded bit-text item"
        );
        converted.push(result);
        pb.inc(1);
    }
    pb.finish_with_message("Done");
    Ok(converted)
}
