use super::write_atomic;
use crate::error::{Result, SyncError};
use crate::format::{self, TranslationFormat};
use crate::model::{Fingerprint, Unit};
use crate::units::UnitStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One translation file: its path, format, parsed units and the fingerprint
/// captured when the bytes were last read or written.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    format: Box<dyn TranslationFormat>,
    fingerprint: Fingerprint,
    units: UnitStore,
}

impl FileHandle {
    /// Opens and parses `path`, picking the format from its extension or content.
    pub fn open(path: &Path, ignore_suffixes: &[&str]) -> Result<Self> {
        let (fingerprint, bytes) = read_fingerprinted(path)?;
        let format = format::detect(path, &bytes, ignore_suffixes)
            .ok_or_else(|| SyncError::UnsupportedFormat(path.to_path_buf()))?;
        Self::from_bytes(path, format, fingerprint, &bytes)
    }

    pub fn with_format(path: &Path, format: Box<dyn TranslationFormat>) -> Result<Self> {
        let (fingerprint, bytes) = read_fingerprinted(path)?;
        Self::from_bytes(path, format, fingerprint, &bytes)
    }

    /// Writes `units` to a new file at `path` and returns its handle.
    pub fn create(path: &Path, format: Box<dyn TranslationFormat>, units: Vec<Unit>) -> Result<Self> {
        let bytes = serialize(path, format.as_ref(), &units)?;
        write_atomic(path, &bytes)?;
        let fingerprint = stat(path)?;
        debug!(path = %path.display(), units = units.len(), "created translation file");
        Ok(Self {
            path: path.to_path_buf(),
            format,
            fingerprint,
            units: UnitStore::new(units),
        })
    }

    fn from_bytes(
        path: &Path,
        format: Box<dyn TranslationFormat>,
        fingerprint: Fingerprint,
        bytes: &[u8],
    ) -> Result<Self> {
        let parsed = format.parse(bytes).map_err(|source| SyncError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), format = format.name(), units = parsed.units.len(), "parsed translation file");
        Ok(Self {
            path: path.to_path_buf(),
            format,
            fingerprint,
            units: UnitStore::from(parsed),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &dyn TranslationFormat {
        self.format.as_ref()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn units(&self) -> &UnitStore {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut UnitStore {
        &mut self.units
    }

    pub fn generation(&self) -> u64 {
        self.units.generation()
    }

    /// Re-reads and re-parses the file unconditionally.
    ///
    /// The in-memory units are replaced only when the parse succeeds.
    pub fn load(&mut self) -> Result<()> {
        let (fingerprint, bytes) = read_fingerprinted(&self.path)?;
        let parsed = self.format.parse(&bytes).map_err(|source| SyncError::Parse {
            path: self.path.clone(),
            source,
        })?;
        self.units = UnitStore::from(parsed);
        self.fingerprint = fingerprint;
        debug!(path = %self.path.display(), generation = self.units.generation(), "reloaded translation file");
        Ok(())
    }

    /// Compares the on-disk `(mtime, size)` with the fingerprint of the last load.
    pub fn is_stale(&self) -> Result<bool> {
        Ok(stat(&self.path)? != self.fingerprint)
    }

    /// Re-parses only when the file changed on disk. Returns whether it did.
    pub fn reload_if_stale(&mut self) -> Result<bool> {
        if !self.is_stale()? {
            return Ok(false);
        }
        self.load()?;
        Ok(true)
    }

    /// Serializes the in-memory units and atomically replaces the file.
    pub fn save(&mut self) -> Result<()> {
        let bytes = serialize(&self.path, self.format.as_ref(), self.units.units())?;
        write_atomic(&self.path, &bytes)?;
        self.fingerprint = stat(&self.path)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "saved translation file");
        Ok(())
    }

    /// Like [`FileHandle::save`], but a failed save also drops the unsaved
    /// in-memory edits so the units match the disk again.
    pub fn save_or_reload(&mut self) -> Result<()> {
        let err = match self.save() {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        self.discard_changes();
        Err(err)
    }

    /// Re-reads the file, replacing in-memory edits that never reached the disk.
    pub fn discard_changes(&mut self) {
        if let Err(err) = self.load() {
            warn!(path = %self.path.display(), error = %err, "could not reload translation file");
        }
    }

    /// The bytes currently on disk.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| SyncError::from_io(&self.path, e))
    }

    /// Puts `bytes` back on disk and reloads from them.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path, bytes)?;
        self.load()
    }

    /// Serialized form of the in-memory units.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize(&self.path, self.format.as_ref(), self.units.units())
    }
}

/// Stats first: a write landing during the read leaves the fingerprint stale.
fn read_fingerprinted(path: &Path) -> Result<(Fingerprint, Vec<u8>)> {
    let fingerprint = stat(path)?;
    let bytes = fs::read(path).map_err(|e| SyncError::from_io(path, e))?;
    Ok((fingerprint, bytes))
}

fn stat(path: &Path) -> Result<Fingerprint> {
    let meta = fs::metadata(path).map_err(|e| SyncError::from_io(path, e))?;
    Fingerprint::from_metadata(&meta).map_err(SyncError::Io)
}

fn serialize(path: &Path, format: &dyn TranslationFormat, units: &[Unit]) -> Result<Vec<u8>> {
    format.serialize(units).map_err(|source| SyncError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FormatError, PoFormat};
    use crate::model::ParsedFile;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const PO: &str = "msgid \"One fish\"\nmsgstr \"\"\n\nmsgid \"Two fish\"\nmsgstr \"Samaki wawili\"\n";

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sw.po");
        fs::write(&path, PO).unwrap();
        (dir, path)
    }

    fn bump_mtime(path: &Path) {
        let later = SystemTime::now() + Duration::from_secs(10);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(later)
            .unwrap();
    }

    #[test]
    fn test_open_parses_units() {
        let (_dir, path) = setup();
        let handle = FileHandle::open(&path, &[]).unwrap();
        assert_eq!(handle.format().name(), "po");
        assert_eq!(handle.units().len(), 2);
        assert!(!handle.is_stale().unwrap());
    }

    #[test]
    fn test_missing_file_is_reported_as_missing() {
        let dir = TempDir::new().unwrap();
        let err = FileHandle::open(&dir.path().join("gone.po"), &[]).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.po");
        fs::write(&path, "msgid \"open\n").unwrap();
        let err = FileHandle::open(&path, &[]).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
    }

    #[test]
    fn test_external_edit_is_detected_and_reloaded() {
        let (_dir, path) = setup();
        let mut handle = FileHandle::open(&path, &[]).unwrap();
        let generation = handle.generation();

        assert!(!handle.reload_if_stale().unwrap());
        assert_eq!(handle.generation(), generation);

        fs::write(&path, format!("{}\nmsgid \"Red fish\"\nmsgstr \"\"\n", PO)).unwrap();
        bump_mtime(&path);

        assert!(handle.is_stale().unwrap());
        assert!(handle.reload_if_stale().unwrap());
        assert_ne!(handle.generation(), generation);
        assert_eq!(handle.units().position_of("Red fish"), Some(2));
        assert!(!handle.is_stale().unwrap());
    }

    #[test]
    fn test_same_size_edit_detected_by_mtime() {
        let (_dir, path) = setup();
        let handle = FileHandle::open(&path, &[]).unwrap();
        fs::write(&path, PO.replace("One", "Uno")).unwrap();
        bump_mtime(&path);
        assert!(handle.is_stale().unwrap());
    }

    #[test]
    fn test_save_refreshes_fingerprint() {
        let (_dir, path) = setup();
        let mut handle = FileHandle::open(&path, &[]).unwrap();
        handle.units_mut().get_mut(0).unwrap().target = "Samaki mmoja".into();
        handle.save().unwrap();

        assert!(!handle.is_stale().unwrap());
        let reread = FileHandle::with_format(&path, Box::new(PoFormat)).unwrap();
        assert_eq!(reread.units().get(0).unwrap().target.first(), "Samaki mmoja");
    }

    #[test]
    fn test_failed_reparse_keeps_previous_units() {
        let (_dir, path) = setup();
        let mut handle = FileHandle::open(&path, &[]).unwrap();
        fs::write(&path, "msgid \"broken\n").unwrap();
        bump_mtime(&path);

        assert!(handle.reload_if_stale().is_err());
        assert_eq!(handle.units().len(), 2);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let (_dir, path) = setup();
        let mut handle = FileHandle::open(&path, &[]).unwrap();
        let snapshot = handle.snapshot().unwrap();

        handle.units_mut().push(Unit::new("Blue fish"));
        handle.save().unwrap();
        assert_eq!(handle.units().len(), 3);

        handle.restore(&snapshot).unwrap();
        assert_eq!(handle.units().len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), PO);
    }

    #[test]
    fn test_fingerprint_describes_loaded_bytes() {
        let (_dir, path) = setup();
        let mut handle = FileHandle::open(&path, &[]).unwrap();
        assert_eq!(handle.fingerprint().size, PO.len() as u64);

        let longer = format!("{}\nmsgid \"Red fish\"\nmsgstr \"\"\n", PO);
        fs::write(&path, &longer).unwrap();
        handle.load().unwrap();
        assert_eq!(handle.fingerprint().size, longer.len() as u64);
        assert_eq!(handle.units().len(), 3);
        assert!(!handle.is_stale().unwrap());
    }

    struct BrokenWriter;

    impl TranslationFormat for BrokenWriter {
        fn name(&self) -> &'static str {
            "po"
        }

        fn parse(&self, bytes: &[u8]) -> std::result::Result<ParsedFile, FormatError> {
            PoFormat.parse(bytes)
        }

        fn serialize(&self, _units: &[Unit]) -> std::result::Result<Vec<u8>, FormatError> {
            Err(FormatError::Syntax {
                line: 0,
                message: "disk full".into(),
            })
        }
    }

    #[test]
    fn test_failed_save_reloads_from_disk() {
        let (_dir, path) = setup();
        let mut handle = FileHandle::with_format(&path, Box::new(BrokenWriter)).unwrap();
        handle.units_mut().get_mut(0).unwrap().target = "Samaki mmoja".into();

        assert!(handle.save_or_reload().is_err());
        assert!(handle.units().get(0).unwrap().target.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), PO);
    }

    #[test]
    fn test_create_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.po");
        let handle = FileHandle::create(&path, Box::new(PoFormat), vec![Unit::new("Hello")]).unwrap();
        assert_eq!(handle.units().len(), 1);
        assert!(fs::read_to_string(&path).unwrap().contains("msgid \"Hello\""));
    }
}
