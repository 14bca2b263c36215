// File: src/persistence.rs
use crate::core::lexicon::Lexicon;
use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes the lexicon next to `path` first and renames it over the target, so
/// a crash never leaves a half-written file behind.
pub fn save_lexicon(lexicon: &Lexicon, path: &Path) -> Result<()> {
    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        bincode::serialize_into(&mut writer, lexicon)?;
        writer.flush()?;
    }
    temp_file.persist(path)?;

    debug!(path = %path.display(), terms = lexicon.term_count(), "lexicon saved");
    Ok(())
}

pub fn load_lexicon(path: &Path) -> Result<Lexicon> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lexicon: Lexicon = bincode::deserialize_from(reader)?;
    debug!(path = %path.display(), terms = lexicon.term_count(), "lexicon loaded");
    Ok(lexicon)
}
