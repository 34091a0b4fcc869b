//! Text and CSV renderings of histogram bins for debugging tools.
#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::io::Write;

use csv::WriterBuilder;

use super::domain::OrderedDomain;
use super::histogram::Histogram;
use crate::types::Result;

impl<D: OrderedDomain> Histogram<D> {
    /// Multi-line summary with one line per bin.
    pub fn description(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.histogram_type());
        let _ = writeln!(out, "  distinct    {}", self.total_distinct_count());
        let _ = writeln!(out, "  min         {}", self.min());
        let _ = writeln!(out, "  max         {}", self.max());
        let _ = writeln!(out, "  bins        {}", self.bin_count());
        let _ = writeln!(out, "  boundaries / counts");
        for bin in 0..self.bin_count() {
            let _ = writeln!(
                out,
                "              [{}, {}]: {} ({} distinct)",
                self.bin_min(bin),
                self.bin_max(bin),
                self.bin_height(bin),
                self.bin_distinct_count(bin)
            );
        }
        out
    }

    /// Writes a header and one CSV record per bin.
    ///
    /// The `column_name` and `requested_num_bins` columns are present only
    /// when the corresponding argument is given.
    pub fn bins_to_csv<W: Write>(
        &self,
        writer: W,
        column_name: Option<&str>,
        requested_num_bins: Option<usize>,
    ) -> Result<()> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        let mut header = vec!["histogram_type"];
        if column_name.is_some() {
            header.push("column_name");
        }
        header.push("actual_num_bins");
        if requested_num_bins.is_some() {
            header.push("requested_num_bins");
        }
        header.extend([
            "bin_id",
            "bin_min",
            "bin_max",
            "bin_min_repr",
            "bin_max_repr",
            "bin_count",
            "bin_count_distinct",
        ]);
        writer.write_record(&header)?;

        let domain = self.domain();
        for bin in 0..self.bin_count() {
            let mut row = Vec::with_capacity(header.len());
            row.push(self.histogram_type().name().to_string());
            if let Some(name) = column_name {
                row.push(name.to_string());
            }
            row.push(self.bin_count().to_string());
            if let Some(requested) = requested_num_bins {
                row.push(requested.to_string());
            }
            row.push(bin.to_string());
            row.push(self.bin_min(bin).to_string());
            row.push(self.bin_max(bin).to_string());
            row.push(domain.repr(self.bin_min(bin)));
            row.push(domain.repr(self.bin_max(bin)));
            row.push(self.bin_height(bin).to_string());
            row.push(self.bin_distinct_count(bin).to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
