// Filesystem families. The HFS family covers classic HFS, HFS+, and
// HFSX, which share the catalog/extents B-tree architecture.

pub mod hfs;
