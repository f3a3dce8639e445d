//! Which inodes can be opened, and how their bytes are produced.
//!
//! Content is generated once per open from a `Moment` (the clock reading at
//! open and the filesystem creation time) and then frozen in the handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};

use crate::meta::{AGE_INODE, HELLO_INODE, HELLO_WORLD, InodeId, WEEKDAY_INODE, WORLD_INODE};

/// Time inputs for a generator.
#[derive(Clone, Copy, Debug)]
pub struct Moment {
    pub now: SystemTime,
    pub created: SystemTime,
}

impl Moment {
    /// Whole seconds since creation, zero if the clock went backwards.
    pub fn age_secs(&self) -> u64 {
        self.now
            .duration_since(self.created)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

pub type GenerateFn = dyn Fn(&Moment) -> Bytes + Send + Sync;

#[derive(Clone)]
pub enum Generator {
    Literal(Bytes),
    /// "This filesystem is N seconds old."
    Age,
    /// "Today is Monday." in local time.
    Weekday,
    /// Same as `Weekday` at a fixed UTC offset.
    WeekdayAt(FixedOffset),
    Custom(Arc<GenerateFn>),
}

impl Generator {
    pub fn literal(text: impl Into<Bytes>) -> Self {
        Generator::Literal(text.into())
    }

    /// `f` runs while the handle table is locked and must not open files on
    /// the same filesystem.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Moment) -> Bytes + Send + Sync + 'static,
    {
        Generator::Custom(Arc::new(f))
    }

    pub fn generate(&self, at: &Moment) -> Bytes {
        match self {
            Generator::Literal(b) => b.clone(),
            Generator::Age => {
                format!("This filesystem is {} seconds old.", at.age_secs()).into()
            }
            Generator::Weekday => format!("Today is {}.", weekday_name(at.now)).into(),
            Generator::WeekdayAt(offset) => {
                format!("Today is {}.", weekday_name_in(at.now, offset)).into()
            }
            Generator::Custom(f) => f(at),
        }
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generator::Literal(b) => f.debug_tuple("Literal").field(b).finish(),
            Generator::Age => f.write_str("Age"),
            Generator::Weekday => f.write_str("Weekday"),
            Generator::WeekdayAt(offset) => f.debug_tuple("WeekdayAt").field(offset).finish(),
            Generator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Full English day name of `t` in local time.
pub fn weekday_name(t: SystemTime) -> String {
    weekday_name_in(t, &Local)
}

pub fn weekday_name_in<Tz>(t: SystemTime, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    DateTime::<Utc>::from(t)
        .with_timezone(tz)
        .format("%A")
        .to_string()
}

#[derive(Clone, Debug, Default)]
pub struct ContentRegistry {
    generators: HashMap<InodeId, Generator>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generators for the files of `InodeTable::standard`.
    pub fn standard() -> Self {
        let mut reg = Self::new();
        reg.register(HELLO_INODE, Generator::literal(HELLO_WORLD));
        reg.register(WORLD_INODE, Generator::literal(HELLO_WORLD));
        reg.register(AGE_INODE, Generator::Age);
        reg.register(WEEKDAY_INODE, Generator::Weekday);
        reg
    }

    /// Returns the generator previously registered for `ino`, if any.
    pub fn register(&mut self, ino: InodeId, generator: Generator) -> Option<Generator> {
        self.generators.insert(ino, generator)
    }

    pub fn get(&self, ino: InodeId) -> Option<&Generator> {
        self.generators.get(&ino)
    }

    pub fn contains(&self, ino: InodeId) -> bool {
        self.generators.contains_key(&ino)
    }

    pub fn inodes(&self) -> impl Iterator<Item = InodeId> + '_ {
        self.generators.keys().copied()
    }
}
