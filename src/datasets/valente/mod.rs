// src/datasets/valente/mod.rs
//! OC-CCI in situ validation compilation (Valente et al. 2019, PANGAEA 898188).
//!
//! Both tables ship in one zip archive. Whichever module is loaded first downloads and
//! extracts it; the other then finds its member already on disk.

pub mod chl;
pub mod rrs;
