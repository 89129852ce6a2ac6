pub mod asof;
pub mod backfill;
pub mod delta;
pub mod scorer;
pub mod summary;
