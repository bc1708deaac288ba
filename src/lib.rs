//! scribefs - a distributed sentence-oriented network file service.
//!
//! Three roles cooperate over a single fixed-record wire protocol: the
//! naming server ([`naming`]) is the metadata directory and access-control
//! authority, storage servers ([`storage`]) own file bytes and perform the
//! structured sentence edits, and clients ([`client`]) talk to the naming
//! server first and are redirected to the responsible storage server for
//! payload-heavy operations.

pub mod client;
pub mod config;
pub mod naming;
pub mod proto;
pub mod storage;
