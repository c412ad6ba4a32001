//! Source buffers and location resolution
//!
//! Every buffer registered with the [`SourceManager`] occupies a contiguous
//! range of one shared address space, so a [`SourceLocation`] is a single
//! integer that can be decomposed back into a file and an offset.

use ccfront_api::{FrontendError, FrontendResult};

/// Identifies a buffer registered with a [`SourceManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

/// Encoded position in the source manager's address space
///
/// The zero value is the invalid location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceLocation(u32);

impl SourceLocation {
    pub fn invalid() -> Self {
        Self(0)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Location `delta` bytes further into the same buffer
    pub fn offset_by(&self, delta: u32) -> Self {
        if self.is_valid() {
            Self(self.0 + delta)
        } else {
            *self
        }
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Half-open range of source locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRange {
    pub begin: SourceLocation,
    pub end: SourceLocation,
}

/// Human-readable position: file name plus 1-based line and column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresumedLoc {
    pub filename: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug)]
struct SLocEntry {
    name: String,
    buffer: String,
    base: u32,
    line_starts: Vec<u32>,
}

impl SLocEntry {
    fn contains(&self, raw: u32) -> bool {
        raw >= self.base && raw <= self.base + self.buffer.len() as u32
    }
}

/// Owner of all source buffers of a session
#[derive(Debug)]
pub struct SourceManager {
    entries: Vec<SLocEntry>,
    next_offset: u32,
    main_file: Option<FileId>,
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            // Offset 0 is reserved for the invalid location
            next_offset: 1,
            main_file: None,
        }
    }

    /// Copy `buffer` into the manager under `name`
    ///
    /// Fails once the 32-bit location space is exhausted, which repeated
    /// entry of unguarded headers can reach.
    pub fn create_file_id(&mut self, name: &str, buffer: &str) -> FrontendResult<FileId> {
        let next_offset = u32::try_from(buffer.len())
            .ok()
            .and_then(|len| self.next_offset.checked_add(len)?.checked_add(1))
            .ok_or_else(|| {
                FrontendError::Engine(format!("source location space exhausted by '{name}'"))
            })?;

        let mut owned = String::new();
        owned.try_reserve_exact(buffer.len())?;
        owned.push_str(buffer);

        let mut line_starts = Vec::new();
        line_starts.try_reserve(owned.bytes().filter(|b| *b == b'\n').count() + 1)?;
        line_starts.push(0);
        line_starts.extend(
            owned
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        );

        self.entries.try_reserve(1)?;
        let id = FileId(self.entries.len() as u32);
        let base = self.next_offset;
        self.next_offset = next_offset;
        self.entries.push(SLocEntry {
            name: name.to_string(),
            buffer: owned,
            base,
            line_starts,
        });

        Ok(id)
    }

    pub fn set_main_file_id(&mut self, file: FileId) {
        self.main_file = Some(file);
    }

    pub fn main_file_id(&self) -> Option<FileId> {
        self.main_file
    }

    pub fn buffer_data(&self, file: FileId) -> Option<&str> {
        self.entry(file).map(|e| e.buffer.as_str())
    }

    pub fn file_name(&self, file: FileId) -> Option<&str> {
        self.entry(file).map(|e| e.name.as_str())
    }

    /// Number of registered buffers
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Location of byte `offset` in `file`
    pub fn location_for(&self, file: FileId, offset: u32) -> SourceLocation {
        match self.entry(file) {
            Some(entry) if offset as usize <= entry.buffer.len() => {
                SourceLocation(entry.base + offset)
            }
            _ => SourceLocation::invalid(),
        }
    }

    /// Location of the first byte of `file`
    pub fn start_of_file(&self, file: FileId) -> SourceLocation {
        self.location_for(file, 0)
    }

    /// Split a location into its buffer and byte offset
    pub fn decomposed_loc(&self, loc: SourceLocation) -> Option<(FileId, u32)> {
        if !loc.is_valid() {
            return None;
        }

        let index = self
            .entries
            .partition_point(|entry| entry.base <= loc.0)
            .checked_sub(1)?;
        let entry = &self.entries[index];

        entry
            .contains(loc.0)
            .then(|| (FileId(index as u32), loc.0 - entry.base))
    }

    pub fn file_id(&self, loc: SourceLocation) -> Option<FileId> {
        self.decomposed_loc(loc).map(|(file, _)| file)
    }

    pub fn is_in_main_file(&self, loc: SourceLocation) -> bool {
        self.main_file.is_some() && self.file_id(loc) == self.main_file
    }

    /// Resolve a location to file name, line and column
    pub fn presumed_loc(&self, loc: SourceLocation) -> Option<PresumedLoc> {
        let (file, offset) = self.decomposed_loc(loc)?;
        let entry = self.entry(file)?;
        let line_index = entry.line_starts.partition_point(|start| *start <= offset) - 1;

        Some(PresumedLoc {
            filename: entry.name.clone(),
            line: line_index + 1,
            column: (offset - entry.line_starts[line_index]) as usize + 1,
        })
    }

    /// Text of the line containing `loc`, without its terminator
    pub fn line_text(&self, loc: SourceLocation) -> Option<&str> {
        let (file, offset) = self.decomposed_loc(loc)?;
        let entry = self.entry(file)?;
        let line_index = entry.line_starts.partition_point(|start| *start <= offset) - 1;
        let start = entry.line_starts[line_index] as usize;
        let end = entry
            .line_starts
            .get(line_index + 1)
            .map(|next| *next as usize - 1)
            .unwrap_or(entry.buffer.len());

        entry
            .buffer
            .get(start..end)
            .map(|line| line.trim_end_matches('\r'))
    }

    fn entry(&self, file: FileId) -> Option<&SLocEntry> {
        self.entries.get(file.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presumed_loc_line_and_column() {
        let mut sm = SourceManager::new();
        let file = sm
            .create_file_id("main.cpp", "int a;\nint bc;\n")
            .unwrap();

        let loc = sm.location_for(file, 11);
        let presumed = sm.presumed_loc(loc).unwrap();
        assert_eq!(presumed.filename, "main.cpp");
        assert_eq!(presumed.line, 2);
        assert_eq!(presumed.column, 5);
        assert_eq!(sm.line_text(loc), Some("int bc;"));
    }

    #[test]
    fn test_location_space_exhaustion() {
        let mut sm = SourceManager::new();
        sm.next_offset = u32::MAX - 8;

        assert!(sm.create_file_id("a.h", "int a;").is_ok());
        assert!(matches!(
            sm.create_file_id("b.h", "int b;"),
            Err(FrontendError::Engine(_))
        ));
        assert_eq!(sm.next_offset, u32::MAX - 1);
    }

    #[test]
    fn test_locations_of_different_files_do_not_overlap() {
        let mut sm = SourceManager::new();
        let first = sm.create_file_id("a.h", "abc").unwrap();
        let second = sm.create_file_id("b.h", "xyz").unwrap();

        let end_of_first = sm.location_for(first, 3);
        let start_of_second = sm.start_of_file(second);
        assert_ne!(end_of_first, start_of_second);
        assert_eq!(sm.decomposed_loc(end_of_first), Some((first, 3)));
        assert_eq!(sm.decomposed_loc(start_of_second), Some((second, 0)));
    }

    #[test]
    fn test_invalid_location() {
        let mut sm = SourceManager::new();
        let file = sm.create_file_id("main.cpp", "x").unwrap();

        assert!(sm.presumed_loc(SourceLocation::invalid()).is_none());
        assert!(!sm.location_for(file, 10).is_valid());
        assert!(!SourceLocation::invalid().offset_by(4).is_valid());
    }

    #[test]
    fn test_main_file_tracking() {
        let mut sm = SourceManager::new();
        let header = sm.create_file_id("h.h", "int x;").unwrap();
        let main = sm.create_file_id("main.cpp", "int y;").unwrap();
        sm.set_main_file_id(main);

        assert!(sm.is_in_main_file(sm.start_of_file(main)));
        assert!(!sm.is_in_main_file(sm.start_of_file(header)));
        assert_eq!(sm.file_count(), 2);
    }

    #[test]
    fn test_line_text_strips_carriage_return() {
        let mut sm = SourceManager::new();
        let file = sm.create_file_id("main.cpp", "int a;\r\nint b;").unwrap();
        assert_eq!(sm.line_text(sm.start_of_file(file)), Some("int a;"));
        assert_eq!(sm.line_text(sm.location_for(file, 9)), Some("int b;"));
    }
}
