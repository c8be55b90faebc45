mod core;
mod csv;
mod memory;

pub use core::{Selector, SimulationStorage};
pub use csv::{CsvSimulationStorage, CsvStorageConfig};
pub use memory::SimulationArrayStorage;
