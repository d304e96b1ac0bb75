pub mod api;
pub mod filter;
pub mod ora;
pub mod profile;
pub mod raw_nft;
pub mod report;
