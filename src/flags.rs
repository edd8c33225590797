//! Container flags shared by [`crate::vector::Vector`] and [`crate::graph::Graph`].

use bitflags::bitflags;

bitflags! {
    /// Flags carried by a sparse container (`Vector`/`Graph`).
    ///
    /// `POSITIVE` implies `NONZERO`: enforced by [`ContainerFlags::is_nonzero`]
    /// at read time, not by the bit encoding itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContainerFlags: u32 {
        /// No stored weight may have magnitude `<= eps`.
        const NONZERO = 1 << 0;
        /// Every stored weight must be `> eps`. Implies `NONZERO`.
        const POSITIVE = 1 << 1;
        /// Graph edges are not mirrored; absence requires the mirror-edge invariant.
        const DIRECTED = 1 << 2;
        /// Mutations are rejected.
        const READONLY = 1 << 3;
        /// Reserved for streaming/incremental consumers; the core only stores the bit.
        const STREAMING = 1 << 4;
        /// Timeline hint: the predecessor snapshot needs reloading. Core only
        /// clears/propagates this on `unlink`.
        const LOAD_PREV = 1 << 5;
        /// Timeline hint: the successor snapshot needs reloading.
        const LOAD_NEXT = 1 << 6;
    }
}

impl ContainerFlags {
    /// Flags a caller may legally pass to a constructor. `LOAD_PREV`/`LOAD_NEXT`
    /// are timeline-derived and not settable at construction time.
    pub const CONSTRUCTIBLE: ContainerFlags = ContainerFlags::NONZERO
        .union(ContainerFlags::POSITIVE)
        .union(ContainerFlags::DIRECTED)
        .union(ContainerFlags::READONLY)
        .union(ContainerFlags::STREAMING);

    /// Flags that are stripped before a binary snapshot header is written:
    /// transient load hints and the read-only bit (load always yields a
    /// writable object).
    pub const TRANSIENT: ContainerFlags = ContainerFlags::READONLY
        .union(ContainerFlags::LOAD_PREV)
        .union(ContainerFlags::LOAD_NEXT);

    /// `true` if every stored weight must be strictly positive.
    pub fn is_positive(self) -> bool {
        self.contains(ContainerFlags::POSITIVE)
    }

    /// `true` if no stored weight may collapse within `(-eps, eps)`.
    ///
    /// `POSITIVE` implies `NONZERO` per the invariant in spec §3.
    pub fn is_nonzero(self) -> bool {
        self.contains(ContainerFlags::NONZERO) || self.is_positive()
    }

    /// `true` if the container rejects mutation.
    pub fn is_readonly(self) -> bool {
        self.contains(ContainerFlags::READONLY)
    }

    /// `true` if edges are directed (no mirror-edge invariant enforced).
    pub fn is_directed(self) -> bool {
        self.contains(ContainerFlags::DIRECTED)
    }
}
