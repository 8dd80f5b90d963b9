//! # Memory Module
//!
//! This module defines the virtual address space shared by the compiler and the
//! virtual machine.
//!
//! ## Segments
//!
//! Every address belongs to exactly one *segment* (global, local, temporary,
//! or constant), and inside a segment to exactly one *bucket* per storable
//! type. The ranges are fixed and never overlap, so the owner of an address can
//! always be recovered from its numeric value alone with [`classify`].
//!
//! | Segment   | int         | float       | bool        | string      |
//! |-----------|-------------|-------------|-------------|-------------|
//! | global    | 1000-1499   | 1500-1999   | 2000-2499   | 2500-2999   |
//! | local     | 3000-3499   | 3500-3999   | 4000-4499   | 4500-4999   |
//! | temporary | 8000-8499   | 8500-8999   | 9000-9499   | 9500-9999   |
//! | constant  | 13000-13499 | 13500-13999 | 14000-14499 | 14500-14999 |
use crate::semantic::Type;
use core::fmt;
use serde_derive::{Deserialize, Serialize};

use log::*;

mod constants;
pub use constants::*;
mod value;
pub use value::*;

/// The number of cells in every bucket.
pub const BUCKET_SIZE: usize = 500;

/// A storage class of the virtual address space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    Global,
    Local,
    Temp,
    Const,
}

impl Segment {
    pub const ALL: [Segment; 4] = [Segment::Global, Segment::Local, Segment::Temp, Segment::Const];

    /// The first address of this segment.
    pub const fn base(&self) -> usize {
        match self {
            Self::Global => 1000,
            Self::Local => 3000,
            Self::Temp => 8000,
            Self::Const => 13000,
        }
    }

    /// One past the last address of this segment.
    pub const fn limit(&self) -> usize {
        self.base() + Type::STORABLE.len() * BUCKET_SIZE
    }

    fn index(&self) -> usize {
        match self {
            Self::Global => 0,
            Self::Local => 1,
            Self::Temp => 2,
            Self::Const => 3,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
            Self::Temp => write!(f, "temporary"),
            Self::Const => write!(f, "constant"),
        }
    }
}

/// A virtual address. Its value encodes both the segment and the type of the
/// cell it names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub usize);

impl Address {
    /// The segment and type this address belongs to.
    pub fn classify(&self) -> Option<(Segment, Type)> {
        classify(*self)
    }

    pub fn segment(&self) -> Option<Segment> {
        self.classify().map(|(segment, _)| segment)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recover the segment and value type of an address from its numeric range.
pub fn classify(address: Address) -> Option<(Segment, Type)> {
    let Address(n) = address;
    Segment::ALL
        .iter()
        .find(|segment| (segment.base()..segment.limit()).contains(&n))
        .map(|segment| {
            let bucket = (n - segment.base()) / BUCKET_SIZE;
            (*segment, Type::STORABLE[bucket])
        })
}

/// An error raised while handing out addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Every cell of a segment/type bucket has already been handed out.
    Capacity { segment: Segment, ty: Type },
    /// Storage was requested for a type that has no cells (`void`).
    VoidStorage(Segment),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Capacity { segment, ty } => write!(
                f,
                "the {segment} segment has no more room for values of type {ty} ({BUCKET_SIZE} cells)"
            ),
            Self::VoidStorage(segment) => {
                write!(f, "cannot reserve {segment} storage for a value of type void")
            }
        }
    }
}

/// Hands out monotonically increasing addresses, one counter per
/// segment/type bucket. Addresses are never reused.
#[derive(Clone, Debug, Default)]
pub struct Allocator {
    /// How many cells of each bucket have been handed out, indexed by
    /// `[segment][type bucket]`.
    used: [[usize; 4]; 4],
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next free cell of type `ty` in `segment`.
    pub fn allocate(&mut self, segment: Segment, ty: Type) -> Result<Address, Error> {
        let bucket = ty.bucket().ok_or(Error::VoidStorage(segment))?;
        let used = &mut self.used[segment.index()][bucket];
        if *used >= BUCKET_SIZE {
            error!("Exhausted the {segment} {ty} bucket");
            return Err(Error::Capacity { segment, ty });
        }

        let address = Address(segment.base() + bucket * BUCKET_SIZE + *used);
        *used += 1;
        trace!("Allocated {segment} {ty} cell at {address}");
        Ok(address)
    }

    /// How many cells of a given bucket have been handed out so far.
    pub fn used(&self, segment: Segment, ty: Type) -> usize {
        ty.bucket()
            .map(|bucket| self.used[segment.index()][bucket])
            .unwrap_or(0)
    }
}
