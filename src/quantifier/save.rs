//! Writing a finished run to disk.

use std::path::Path;

use log::info;

use crate::file_data::tables::{write_table_1d, write_table_2d};
use crate::file_data::tiff::write_float_tiff;
use crate::quantifier::{EngineState, MembraneQuant};
use crate::utils::QuantError;

impl MembraneQuant {
    /// Saves to the configured `save_path`. Does nothing if none is set.
    pub fn save(&mut self) -> Result<(), QuantError> {
        match self.config.save_path.clone() {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Writes the results into `dir`, creating it if needed:
    ///
    /// * `offsets.txt`, `cyts.txt`, `mems.txt` - one value per ROI point
    /// * `roi.txt` - the current ROI, `x` and `y` tab-separated
    /// * `img.tif`, `straight.tif`, `straight_fit.tif` - 32-bit float images
    ///
    /// Any failure to create or write a file is returned.
    pub fn save_to<P : AsRef<Path>>(&mut self, dir : P) -> Result<(), QuantError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let record = &self.record;
        write_table_1d(dir.join("offsets.txt"), &record.offsets_full.view())?;
        write_table_1d(dir.join("cyts.txt"), &record.cyts_full.view())?;
        write_table_1d(dir.join("mems.txt"), &record.mems_full.view())?;
        write_table_2d(dir.join("roi.txt"), &self.roi.view())?;

        write_float_tiff(dir.join("img.tif"), &self.img.view())?;
        write_float_tiff(dir.join("straight.tif"), &record.straight.view())?;
        write_float_tiff(dir.join("straight_fit.tif"), &self.simulated.straight_fit.view())?;

        info!("Saved results to {}", dir.display());
        self.state = EngineState::Saved;
        Ok(())
    }
}
