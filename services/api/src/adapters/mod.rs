pub mod db;
pub mod ordering;
pub mod registry;
pub mod write_tx;

pub use db::DbAdapter;
pub use registry::ConnectionRegistry;
pub use write_tx::WriteTx;
