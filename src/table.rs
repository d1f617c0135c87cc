//! Binary sorted range tables
//!
//! One file per address family (conventionally `<base>.v4` / `<base>.v6`):
//! a flat array of fixed-size records, no header, no footer, in strictly
//! ascending and pairwise disjoint `lo` order, exactly the in-order
//! traversal of a [`RangeTree`]. The query side memory-maps the file and
//! bisects the record array directly; it never rebuilds a tree, which is
//! the entire point of serializing.
//!
//! Records are little-endian and packed (no padding), declared with
//! `zerocopy` so a mapped file reinterprets as `&[R]` without parsing:
//!
//! ```text
//! .v4 record (12 bytes):  lo u32 | hi u32 | code-word u32
//! .v6 record (36 bytes):  lo 2×u64 (hi limb first) | hi 2×u64 | code-word u32
//! ```

use crate::country::CodeWord;
use crate::error::{Error, Result};
use crate::range_tree::{RangeKey, RangeTree};
use crate::wide::U128;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::mem;
use std::path::Path;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A fixed-size on-disk range record for one address family.
pub trait Record:
    FromBytes + IntoBytes + Immutable + KnownLayout + Unaligned + Copy + Sized
{
    /// Address key type of this record's family.
    type Key: RangeKey;

    /// Conventional file suffix for this family.
    const SUFFIX: &'static str;

    /// Build a record from one range.
    fn new(lo: Self::Key, hi: Self::Key, code: CodeWord) -> Self;

    /// Inclusive lower bound.
    fn lo(&self) -> Self::Key;

    /// Inclusive upper bound.
    fn hi(&self) -> Self::Key;

    /// Country code-word.
    fn code(&self) -> CodeWord;
}

/// IPv4 range record: `lo`, `hi`, code-word. 12 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct V4Record {
    lo: U32,
    hi: U32,
    /// Code-word in the low 16 bits; high bits zero.
    code: U32,
}

impl Record for V4Record {
    type Key = u32;
    const SUFFIX: &'static str = ".v4";

    fn new(lo: u32, hi: u32, code: CodeWord) -> Self {
        V4Record {
            lo: U32::new(lo),
            hi: U32::new(hi),
            code: U32::new(code.as_raw() as u32),
        }
    }

    fn lo(&self) -> u32 {
        self.lo.get()
    }

    fn hi(&self) -> u32 {
        self.hi.get()
    }

    fn code(&self) -> CodeWord {
        CodeWord::from_raw(self.code.get() as u16)
    }
}

/// IPv6 range record: `lo`, `hi` as high/low u64 limbs, code-word. 36 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct V6Record {
    lo_hi: U64,
    lo_lo: U64,
    hi_hi: U64,
    hi_lo: U64,
    code: U32,
}

impl Record for V6Record {
    type Key = U128;
    const SUFFIX: &'static str = ".v6";

    fn new(lo: U128, hi: U128, code: CodeWord) -> Self {
        V6Record {
            lo_hi: U64::new(lo.hi()),
            lo_lo: U64::new(lo.lo()),
            hi_hi: U64::new(hi.hi()),
            hi_lo: U64::new(hi.lo()),
            code: U32::new(code.as_raw() as u32),
        }
    }

    fn lo(&self) -> U128 {
        U128::new(self.lo_hi.get(), self.lo_lo.get())
    }

    fn hi(&self) -> U128 {
        U128::new(self.hi_hi.get(), self.hi_lo.get())
    }

    fn code(&self) -> CodeWord {
        CodeWord::from_raw(self.code.get() as u16)
    }
}

/// Serialize a range tree in ascending order to `sink`.
///
/// The in-order traversal is what establishes the sortedness precondition
/// of [`SortedTable::lookup`]; the tree itself is not modified.
pub fn write_table<R: Record>(
    tree: &RangeTree<R::Key, CodeWord>,
    sink: &mut impl Write,
) -> io::Result<()> {
    for range in tree.iter() {
        sink.write_all(R::new(range.lo, range.hi, range.value).as_bytes())?;
    }
    Ok(())
}

/// A memory-mapped, sorted range table for one address family.
///
/// The mapping is validated once at open (size must be an exact multiple of
/// the record size) and dropped when the table is dropped.
pub struct SortedTable<R> {
    mmap: Mmap,
    count: usize,
    _record: PhantomData<R>,
}

impl<R: Record> SortedTable<R> {
    /// Open and memory-map a range table file.
    ///
    /// A missing or zero-length file is "no data for this address family"
    /// and returns `Ok(None)`. A file whose size is not a multiple of the
    /// record size is malformed and returns [`Error::Format`]; it is never
    /// interpreted as empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let size = file.metadata()?.len() as usize;
        if size == 0 {
            return Ok(None);
        }
        let record_size = mem::size_of::<R>();
        if size % record_size != 0 {
            return Err(Error::Format(format!(
                "{}: size {} is not a multiple of the {}-byte record size",
                path.display(),
                size,
                record_size
            )));
        }
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Some(SortedTable {
            mmap,
            count: size / record_size,
            _record: PhantomData,
        }))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The record array, reinterpreted in place from the mapping.
    pub fn records(&self) -> &[R] {
        // Divisibility was validated at open and R is Unaligned, so the
        // cast cannot fail.
        <[R]>::ref_from_bytes(&self.mmap[..]).expect("table size validated at open")
    }

    /// Bisection-search for the record whose range contains `addr`.
    pub fn lookup(&self, addr: R::Key) -> Option<&R> {
        bisect(self.records(), addr)
    }
}

/// Classic binary search over an ascending, disjoint record array,
/// comparing the target against each probed record's `[lo, hi]`.
pub fn bisect<R: Record>(records: &[R], addr: R::Key) -> Option<&R> {
    let mut lo = 0usize;
    let mut hi = records.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let record = &records[mid];
        if addr < record.lo() {
            hi = mid;
        } else if addr > record.hi() {
            lo = mid + 1;
        } else {
            return Some(record);
        }
    }
    None
}
