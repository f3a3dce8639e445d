//! Request handlers of the synthetic filesystem.
//!
//! Every handler takes `&self`; the inode table and content registry are
//! read-only, and the handle table locks internally, so a `SynthFs` can serve
//! requests from many tasks at once.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use super::content::{ContentRegistry, Moment};
use super::dirent::write_dirent;
use super::handles::{HandleId, HandleTable};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::meta::{Dirent, InodeAttributes, InodeId, InodeTable};

/// Reply to a successful lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub child: InodeId,
    pub attributes: InodeAttributes,
}

/// Reply to a successful file open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenedFile {
    pub handle: HandleId,
    /// Ask the transport to bypass the page cache; sizes are not known.
    pub direct_io: bool,
}

/// Filesystem-wide statistics. Nothing is tracked, so all zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub blocks_free: u64,
    pub inodes: u64,
    pub inodes_free: u64,
}

pub struct SynthFs {
    inodes: Arc<InodeTable>,
    contents: ContentRegistry,
    handles: HandleTable,
    clock: Arc<dyn Clock>,
    created: SystemTime,
}

impl SynthFs {
    pub fn new(
        inodes: Arc<InodeTable>,
        contents: ContentRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let created = clock.now();
        Self {
            inodes,
            contents,
            handles: HandleTable::new(),
            clock,
            created,
        }
    }

    /// Standard namespace on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(InodeTable::standard()),
            ContentRegistry::standard(),
            clock,
        )
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    fn stamped(&self, mut attributes: InodeAttributes) -> InodeAttributes {
        attributes.stamp(self.clock.now());
        attributes
    }

    pub fn stat_fs(&self) -> Result<FsStats> {
        Ok(FsStats::default())
    }

    pub fn look_up_inode(&self, parent: InodeId, name: &str) -> Result<Entry> {
        let child = self.inodes.resolve(parent, name)?;
        let attributes = self.stamped(self.inodes.attributes_of(child)?);
        debug!(parent, name, child, "lookup");
        Ok(Entry { child, attributes })
    }

    pub fn get_inode_attributes(&self, ino: InodeId) -> Result<InodeAttributes> {
        let attributes = self.inodes.attributes_of(ino)?;
        Ok(self.stamped(attributes))
    }

    /// Directories carry no per-open state; each listing reads the table.
    pub fn open_directory(&self, ino: InodeId) -> Result<()> {
        debug!(ino, "opendir");
        Ok(())
    }

    /// Entries of `ino` starting at list position `offset`.
    pub fn directory_entries(&self, ino: InodeId, offset: u64) -> Result<&[Dirent]> {
        let children = self.inodes.children(ino)?;
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start <= children.len())
            .ok_or(Error::OffsetOutOfRange {
                ino,
                offset,
                len: children.len(),
            })?;
        Ok(&children[start..])
    }

    /// Encodes entries from `offset` into `dst` until the next one does not
    /// fit whole. Returns the bytes written.
    pub fn read_directory(&self, ino: InodeId, offset: u64, dst: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        for e in self.directory_entries(ino, offset)? {
            let n = write_dirent(&mut dst[written..], e);
            if n == 0 {
                break;
            }
            written += n;
        }
        debug!(ino, offset, written, "readdir");
        Ok(written)
    }

    /// Generates the file's content and parks it under a new handle.
    pub fn open_file(&self, ino: InodeId) -> Result<OpenedFile> {
        let generator = self.contents.get(ino).ok_or(Error::NotOpenable(ino))?;
        let handle = self.handles.open_with(|| {
            generator.generate(&Moment {
                now: self.clock.now(),
                created: self.created,
            })
        });
        debug!(ino, handle, "open");
        Ok(OpenedFile {
            handle,
            direct_io: true,
        })
    }

    pub fn read_file(&self, handle: HandleId, offset: u64, dst: &mut [u8]) -> Result<usize> {
        let n = self.handles.read(handle, offset, dst)?;
        debug!(handle, offset, n, "read");
        Ok(n)
    }

    /// Drops the content held by `handle`. Unknown handles are ignored.
    pub fn release_file(&self, handle: HandleId) -> Result<()> {
        let was_open = self.handles.release(handle);
        debug!(handle, was_open, "release");
        Ok(())
    }
}

impl Default for SynthFs {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::error::ErrorKind;
    use crate::meta::{
        AGE_INODE, DIR_INODE, FileKind, HELLO_INODE, ROOT_INODE, WEEKDAY_INODE, WORLD_INODE,
    };
    use crate::vfs::content::Generator;
    use crate::vfs::dirent::{dirent_size, read_dirent};
    use bytes::Bytes;
    use std::time::{Duration, UNIX_EPOCH};

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_750_000_000)
    }

    fn fake_fs() -> (Arc<FakeClock>, SynthFs) {
        let clock = Arc::new(FakeClock::new(start()));
        let fs = SynthFs::with_clock(clock.clone());
        (clock, fs)
    }

    fn read_all(fs: &SynthFs, handle: HandleId) -> String {
        let mut buf = [0u8; 256];
        let n = fs.read_file(handle, 0, &mut buf).unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    fn decode_all(mut buf: &[u8]) -> Vec<Dirent> {
        let mut out = Vec::new();
        while let Some((e, n)) = read_dirent(buf) {
            out.push(e);
            buf = &buf[n..];
        }
        out
    }

    #[test]
    fn test_stat_fs_is_empty() {
        let (_, fs) = fake_fs();
        assert_eq!(fs.stat_fs().unwrap(), FsStats::default());
    }

    #[test]
    fn test_lookup_stamps_now() {
        let (clock, fs) = fake_fs();
        clock.advance(Duration::from_secs(30));
        let entry = fs.look_up_inode(ROOT_INODE, "dir").unwrap();
        assert_eq!(entry.child, DIR_INODE);
        assert!(entry.attributes.is_dir());
        let now = start() + Duration::from_secs(30);
        assert_eq!(entry.attributes.atime, now);
        assert_eq!(entry.attributes.mtime, now);
        assert_eq!(entry.attributes.crtime, now);

        // Stamping is not persisted in the table.
        assert_eq!(fs.inodes().attributes_of(DIR_INODE).unwrap().mtime, UNIX_EPOCH);
    }

    #[test]
    fn test_lookup_failures() {
        let (_, fs) = fake_fs();
        let err = fs.look_up_inode(ROOT_INODE, "missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = fs.look_up_inode(500, "hello").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_getattr() {
        let (clock, fs) = fake_fs();
        clock.advance(Duration::from_secs(1));
        let attr = fs.get_inode_attributes(WORLD_INODE).unwrap();
        assert_eq!(attr.kind, FileKind::File);
        assert_eq!(attr.size, 13);
        assert_eq!(attr.atime, start() + Duration::from_secs(1));
        assert_eq!(fs.get_inode_attributes(0), Err(Error::InodeNotFound(0)));
    }

    #[test]
    fn test_open_directory_always_succeeds() {
        let (_, fs) = fake_fs();
        for ino in [ROOT_INODE, HELLO_INODE, 12345] {
            assert!(fs.open_directory(ino).is_ok());
        }
    }

    #[test]
    fn test_read_directory_offsets() {
        let (_, fs) = fake_fs();
        let mut buf = [0u8; 4096];

        let n = fs.read_directory(ROOT_INODE, 0, &mut buf).unwrap();
        let names: Vec<_> = decode_all(&buf[..n]).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["hello", "dir", "age", "weekday"]);

        let n = fs.read_directory(ROOT_INODE, 2, &mut buf).unwrap();
        let entries = decode_all(&buf[..n]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "age");
        assert_eq!(entries[0].offset, 3);

        assert_eq!(fs.read_directory(ROOT_INODE, 4, &mut buf).unwrap(), 0);
        let err = fs.read_directory(ROOT_INODE, 5, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        let err = fs.read_directory(ROOT_INODE, u64::MAX, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_read_directory_wrong_inode() {
        let (_, fs) = fake_fs();
        let mut buf = [0u8; 128];
        let err = fs.read_directory(HELLO_INODE, 0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        let err = fs.read_directory(99, 0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_read_directory_stops_at_whole_entry() {
        let (_, fs) = fake_fs();
        // "hello" and "dir" take 32 bytes each; "age" would need 32 more.
        let mut buf = [0u8; 95];
        let n = fs.read_directory(ROOT_INODE, 0, &mut buf).unwrap();
        assert_eq!(n, dirent_size(5) + dirent_size(3));
        let entries = decode_all(&buf[..n]);
        assert_eq!(entries.len(), 2);

        // Resume from the offset of the last entry returned.
        let resume = entries[1].offset;
        let n = fs.read_directory(ROOT_INODE, resume, &mut buf).unwrap();
        let names: Vec<_> = decode_all(&buf[..n]).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["age", "weekday"]);

        let mut tiny = [0u8; 8];
        assert_eq!(fs.read_directory(ROOT_INODE, 0, &mut tiny).unwrap(), 0);
    }

    #[test]
    fn test_open_and_read_age() {
        let (clock, fs) = fake_fs();
        let opened = fs.open_file(AGE_INODE).unwrap();
        assert!(opened.direct_io);
        assert_eq!(read_all(&fs, opened.handle), "This filesystem is 0 seconds old.");

        // Content is fixed at open; a new open sees the new age.
        clock.advance(Duration::from_secs(42));
        assert_eq!(read_all(&fs, opened.handle), "This filesystem is 0 seconds old.");
        let again = fs.open_file(AGE_INODE).unwrap();
        assert_ne!(again.handle, opened.handle);
        assert_eq!(read_all(&fs, again.handle), "This filesystem is 42 seconds old.");
    }

    #[test]
    fn test_open_weekday() {
        let clock = Arc::new(FakeClock::new(start()));
        let mut contents = ContentRegistry::standard();
        let utc = chrono::FixedOffset::east_opt(0).unwrap();
        contents.register(WEEKDAY_INODE, Generator::WeekdayAt(utc));
        let fs = SynthFs::new(Arc::new(InodeTable::standard()), contents, clock.clone());

        let opened = fs.open_file(WEEKDAY_INODE).unwrap();
        assert_eq!(read_all(&fs, opened.handle), "Today is Sunday.");
        clock.advance(Duration::from_secs(86_400));
        let next = fs.open_file(WEEKDAY_INODE).unwrap();
        assert_eq!(read_all(&fs, next.handle), "Today is Monday.");
    }

    #[test]
    fn test_open_rejects_unregistered() {
        let (_, fs) = fake_fs();
        for ino in [ROOT_INODE, DIR_INODE, 0, 77] {
            let err = fs.open_file(ino).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "inode {ino}");
        }
        assert!(fs.handles().is_empty());
    }

    #[test]
    fn test_read_past_end_and_release() {
        let (_, fs) = fake_fs();
        let opened = fs.open_file(WORLD_INODE).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read_file(opened.handle, 13, &mut buf).unwrap(), 0);
        assert_eq!(fs.read_file(opened.handle, 20, &mut buf).unwrap(), 0);
        assert_eq!(fs.read_file(opened.handle, 7, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], b"world!");

        fs.release_file(opened.handle).unwrap();
        fs.release_file(opened.handle).unwrap();
        let err = fs.read_file(opened.handle, 0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_custom_registration() {
        let clock = Arc::new(FakeClock::new(start()));
        let table = crate::meta::InodeTableBuilder::new()
            .file(ROOT_INODE, 2, "motd", 0o444, 0)
            .build()
            .unwrap();
        let mut contents = ContentRegistry::new();
        contents.register(2, Generator::custom(|_| Bytes::from_static(b"be kind")));
        let fs = SynthFs::new(Arc::new(table), contents, clock);

        let entry = fs.look_up_inode(ROOT_INODE, "motd").unwrap();
        let opened = fs.open_file(entry.child).unwrap();
        assert_eq!(read_all(&fs, opened.handle), "be kind");
        assert!(fs.look_up_inode(ROOT_INODE, "hello").is_err());
    }

    #[test]
    fn test_clock_is_read_in_handle_order() {
        let clock = Arc::new(FakeClock::new(start()));
        let ticking = clock.clone();
        let mut contents = ContentRegistry::new();
        contents.register(
            AGE_INODE,
            Generator::custom(move |m: &Moment| {
                ticking.advance(Duration::from_secs(1));
                Bytes::from(m.age_secs().to_string())
            }),
        );
        let fs = Arc::new(SynthFs::new(
            Arc::new(InodeTable::standard()),
            contents,
            clock,
        ));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let fs = fs.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        fs.open_file(AGE_INODE).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        for fh in 0..200 {
            assert_eq!(read_all(&fs, fh), fh.to_string(), "handle {fh}");
        }
    }

    #[test]
    fn test_concurrent_opens() {
        let (_, fs) = fake_fs();
        let fs = Arc::new(fs);
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let fs = fs.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| fs.open_file(AGE_INODE).unwrap().handle)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<_> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 200);
    }
}
