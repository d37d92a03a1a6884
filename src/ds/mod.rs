pub mod history_ring;

pub use history_ring::HistoryRing;
