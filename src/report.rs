use crate::intensity::CrackSpec;
use crate::stations::StationTable;
use crate::telemetry::DamageReadout;
use std::fmt::Write;

/// Numbers shown on the twin's status display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSummary {
    /// Name of the response source driving the twin.
    pub source: &'static str,
    /// Applied load in newtons.
    pub load: f64,
    /// Load divided by the rated load.
    pub load_ratio: f64,
    /// Real midspan deflection in millimetres, before exaggeration.
    pub midspan_deflection_mm: f64,
    /// Manual crack, when enabled.
    pub crack: Option<CrackSpec>,
    /// Damage state from telemetry, when available.
    pub readout: Option<DamageReadout>,
}

/// Render a multi-line status for a text display.
///
/// Loads are printed in kilonewtons to match the figures engineers read off a test
/// rig; see <https://en.wikipedia.org/wiki/Deflection_(engineering)>.
#[must_use]
pub fn render_status(summary: &StatusSummary) -> String {
    let mut output = String::new();

    writeln!(
        &mut output,
        "Beam twin ({} source)",
        summary.source
    )
    .expect("writing to string cannot fail");

    writeln!(
        &mut output,
        "Load: {:.1} kN ({:.1}% of rated)",
        summary.load / 1000.0,
        summary.load_ratio * 100.0
    )
    .expect("writing to string cannot fail");

    writeln!(
        &mut output,
        "Midspan deflection: {:.3} mm",
        summary.midspan_deflection_mm
    )
    .expect("writing to string cannot fail");

    match summary.crack {
        Some(crack) => writeln!(
            &mut output,
            "Crack: u = {:.2}, v = {:.2}, radius = {:.3}, severity = {:.2}, sharpness = {:.1}",
            crack.center_u, crack.center_v, crack.radius, crack.severity, crack.sharpness
        )
        .expect("writing to string cannot fail"),
        None => output.push_str("Crack: none\n"),
    }

    if let Some(readout) = summary.readout {
        writeln!(
            &mut output,
            "Damage: {:.1}% at t = {:.1}",
            readout.damage * 100.0,
            readout.time
        )
        .expect("writing to string cannot fail");
        match readout.remaining_useful_life {
            Some(rul) => writeln!(&mut output, "Remaining useful life: {rul:.2} steps")
                .expect("writing to string cannot fail"),
            None => output.push_str("Remaining useful life: unknown\n"),
        }
    }

    output
}

/// Render the station table with one row per station.
#[must_use]
pub fn render_station_table(table: &StationTable) -> String {
    let mut output = String::new();

    writeln!(
        &mut output,
        "{:>3}  {:>8}  {:>12}  {:>11}  {:>12}",
        "#", "x [m]", "stress [Pa]", "strain", "disp [m]"
    )
    .expect("writing to string cannot fail");

    for (index, station) in table.iter().enumerate() {
        writeln!(
            &mut output,
            "{:>3}  {:>8.3}  {:>12.4e}  {:>11.3e}  {:>12.4e}",
            index, station.position, station.bending_stress, station.strain, station.displacement
        )
        .expect("writing to string cannot fail");
    }

    output
}
