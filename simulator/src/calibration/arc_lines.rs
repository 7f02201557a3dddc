//! Arc-lamp emission lines from the `arc-lines` artifact.

use super::table::AsciiTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcLine {
    pub wavelength_um: f64,
    pub intensity: f64,
}

/// Unresolved emission lines sorted by wavelength.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArcLineList {
    lines: Vec<ArcLine>,
}

impl ArcLineList {
    pub fn parse(text: &str) -> Result<Self, String> {
        let table = AsciiTable::parse(text, 2)?;
        let mut lines: Vec<ArcLine> = table
            .rows
            .iter()
            .map(|r| ArcLine {
                wavelength_um: r[0],
                intensity: r[1],
            })
            .collect();
        if let Some(bad) = lines.iter().find(|l| !(l.intensity >= 0.0) || !l.wavelength_um.is_finite()) {
            return Err(format!("invalid arc line {bad:?}"));
        }
        lines.sort_by(|a, b| a.wavelength_um.total_cmp(&b.wavelength_um));
        Ok(Self { lines })
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines with `lo <= wavelength <= hi`
    pub fn within(&self, lo: f64, hi: f64) -> &[ArcLine] {
        let start = self.lines.partition_point(|l| l.wavelength_um < lo);
        let end = self.lines.partition_point(|l| l.wavelength_um <= hi);
        &self.lines[start..end.max(start)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sorts_and_selects() {
        let text = "# wavelength_unit = Angstrom\n22000 5\n19500 1\n21000 10\n";
        let arcs = ArcLineList::parse(text).unwrap();
        assert_eq!(arcs.len(), 3);
        let inside = arcs.within(2.0, 2.2);
        assert_eq!(inside.len(), 2);
        assert_eq!(inside[0].intensity, 10.0);
        assert_eq!(inside[1].intensity, 5.0);
        assert!(arcs.within(3.0, 4.0).is_empty());
    }

    #[test]
    fn test_parse_rejects_negative_intensity() {
        assert!(ArcLineList::parse("# wavelength_unit = um\n2.0 -1\n").is_err());
    }
}
